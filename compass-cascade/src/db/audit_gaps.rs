//! Audit gap queries

use compass_common::model::{GapRef, GapStatus};
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use crate::db::parse_uuid;
use crate::{Error, Result};

/// Update a gap's status, returning its entity view and the previous status
pub async fn update_status(
    db: &Pool<Sqlite>,
    gap_id: Uuid,
    new_status: GapStatus,
) -> Result<(GapRef, GapStatus)> {
    let row = sqlx::query("SELECT guid, entity_id, status FROM audit_gaps WHERE guid = ?")
        .bind(gap_id.to_string())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("audit gap {}", gap_id)))?;

    let old_status_str: String = row.get("status");
    let old_status = GapStatus::from_str(&old_status_str)
        .ok_or_else(|| Error::Internal(format!("unknown gap status '{}'", old_status_str)))?;

    let gap = GapRef {
        gap_id: parse_uuid(&row.get::<String, _>("guid"))?,
        entity_id: parse_uuid(&row.get::<String, _>("entity_id"))?,
    };

    sqlx::query("UPDATE audit_gaps SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE guid = ?")
        .bind(new_status.as_str())
        .bind(gap_id.to_string())
        .execute(db)
        .await?;

    Ok((gap, old_status))
}
