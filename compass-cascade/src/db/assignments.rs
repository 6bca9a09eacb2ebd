//! Control assignment writes and reads
//!
//! The `UNIQUE(entity_id, control_id)` constraint plus `INSERT OR IGNORE`
//! makes assignment creation idempotent: a repeat insert affects zero rows
//! and is not an error.

use compass_common::model::{AssignmentStatus, Control, ControlAssignment, Priority};
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use crate::db::parse_uuid;
use crate::{Error, Result};

/// Materialize a control for an entity if no assignment exists yet
///
/// Status starts at `not_started`, completion rate at 0, priority copied
/// from the control template. Returns `true` when a row was created,
/// `false` when the (entity, control) pair already had one.
pub async fn insert_if_absent(
    db: &Pool<Sqlite>,
    entity_id: Uuid,
    control: &Control,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO control_assignments
            (guid, entity_id, control_id, status, priority, completion_rate)
        VALUES (?, ?, ?, 'not_started', ?, 0)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(entity_id.to_string())
    .bind(control.guid.to_string())
    .bind(&control.priority)
    .execute(db)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Find the assignment for an (entity, control) pair
pub async fn find_by_entity_and_control(
    db: &Pool<Sqlite>,
    entity_id: Uuid,
    control_id: Uuid,
) -> Result<Option<ControlAssignment>> {
    let row = sqlx::query(
        r#"
        SELECT guid, entity_id, control_id, status, priority, completion_rate
        FROM control_assignments
        WHERE entity_id = ? AND control_id = ?
        "#,
    )
    .bind(entity_id.to_string())
    .bind(control_id.to_string())
    .fetch_optional(db)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let status_str: String = row.get("status");
    let status = AssignmentStatus::from_str(&status_str)
        .ok_or_else(|| Error::Internal(format!("unknown assignment status '{}'", status_str)))?;
    let priority_str: String = row.get("priority");
    let priority = Priority::from_str(&priority_str)
        .ok_or_else(|| Error::Internal(format!("unknown assignment priority '{}'", priority_str)))?;

    Ok(Some(ControlAssignment {
        guid: parse_uuid(&row.get::<String, _>("guid"))?,
        entity_id: parse_uuid(&row.get::<String, _>("entity_id"))?,
        control_id: parse_uuid(&row.get::<String, _>("control_id"))?,
        status,
        priority,
        completion_rate: row.get("completion_rate"),
    }))
}

/// Number of assignments an entity currently carries
pub async fn count_for_entity(db: &Pool<Sqlite>, entity_id: Uuid) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM control_assignments WHERE entity_id = ?")
            .bind(entity_id.to_string())
            .fetch_one(db)
            .await?;
    Ok(count)
}
