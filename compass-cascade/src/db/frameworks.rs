//! Framework catalog queries (read-only)

use compass_common::model::{Framework, FrameworkCategory};
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use crate::db::parse_uuid;
use crate::{Error, Result};

/// Get a framework by id
pub async fn get_framework(db: &Pool<Sqlite>, framework_id: Uuid) -> Result<Framework> {
    let row = sqlx::query("SELECT guid, name, region, category FROM frameworks WHERE guid = ?")
        .bind(framework_id.to_string())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("framework {}", framework_id)))?;

    let category_str: String = row.get("category");
    let category = FrameworkCategory::from_str(&category_str)
        .ok_or_else(|| Error::Internal(format!("unknown framework category '{}'", category_str)))?;

    Ok(Framework {
        guid: parse_uuid(&row.get::<String, _>("guid"))?,
        name: row.get("name"),
        region: row.get("region"),
        category,
    })
}
