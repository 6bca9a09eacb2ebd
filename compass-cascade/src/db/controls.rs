//! Control template queries (read-only)

use compass_common::model::Control;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use crate::db::parse_uuid;
use crate::Result;

/// List all controls belonging to a framework, ordered by code
pub async fn list_by_framework(db: &Pool<Sqlite>, framework_id: Uuid) -> Result<Vec<Control>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, framework_id, code, title, description, priority,
               category, guidance, evidence_requirements
        FROM controls
        WHERE framework_id = ?
        ORDER BY code
        "#,
    )
    .bind(framework_id.to_string())
    .fetch_all(db)
    .await?;

    let mut controls = Vec::with_capacity(rows.len());
    for row in rows {
        let requirements_json: String = row.get("evidence_requirements");
        let evidence_requirements: Vec<String> =
            serde_json::from_str(&requirements_json).unwrap_or_default();

        controls.push(Control {
            guid: parse_uuid(&row.get::<String, _>("guid"))?,
            framework_id: parse_uuid(&row.get::<String, _>("framework_id"))?,
            code: row.get("code"),
            title: row.get("title"),
            description: row.get("description"),
            priority: row.get("priority"),
            category: row.get("category"),
            guidance: row.get("guidance"),
            evidence_requirements,
        });
    }

    Ok(controls)
}

/// Framework a control belongs to, if the control still exists
pub async fn framework_for_control(db: &Pool<Sqlite>, control_id: Uuid) -> Result<Option<Uuid>> {
    let framework_id: Option<String> =
        sqlx::query_scalar("SELECT framework_id FROM controls WHERE guid = ?")
            .bind(control_id.to_string())
            .fetch_optional(db)
            .await?;

    match framework_id {
        Some(id) => Ok(Some(parse_uuid(&id)?)),
        None => Ok(None),
    }
}
