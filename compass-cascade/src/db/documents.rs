//! Document writes and reads

use compass_common::model::{DocumentKind, DocumentRef};
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use crate::db::parse_uuid;
use crate::{Error, Result};

/// Insert a document row
#[allow(clippy::too_many_arguments)]
pub async fn insert(
    db: &Pool<Sqlite>,
    document_id: Uuid,
    entity_id: Uuid,
    task_id: Option<Uuid>,
    control_id: Option<Uuid>,
    framework_id: Option<Uuid>,
    kind: DocumentKind,
    name: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO documents (guid, entity_id, task_id, control_id, framework_id, kind, name)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(document_id.to_string())
    .bind(entity_id.to_string())
    .bind(task_id.map(|id| id.to_string()))
    .bind(control_id.map(|id| id.to_string()))
    .bind(framework_id.map(|id| id.to_string()))
    .bind(kind.as_str())
    .bind(name)
    .execute(db)
    .await?;
    Ok(())
}

/// Fetch the cascade-relevant view of a document
pub async fn get_ref(db: &Pool<Sqlite>, document_id: Uuid) -> Result<DocumentRef> {
    let row = sqlx::query("SELECT guid, entity_id, control_id FROM documents WHERE guid = ?")
        .bind(document_id.to_string())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("document {}", document_id)))?;

    let entity_id: Option<String> = row.get("entity_id");
    let entity_id = entity_id
        .ok_or_else(|| Error::Internal(format!("document {} has no entity", document_id)))?;
    let control_id = match row.get::<Option<String>, _>("control_id") {
        Some(id) => Some(parse_uuid(&id)?),
        None => None,
    };

    Ok(DocumentRef {
        document_id: parse_uuid(&row.get::<String, _>("guid"))?,
        entity_id: parse_uuid(&entity_id)?,
        control_id,
    })
}

/// Delete a document row
pub async fn delete(db: &Pool<Sqlite>, document_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM documents WHERE guid = ?")
        .bind(document_id.to_string())
        .execute(db)
        .await?;
    Ok(())
}

/// Number of evidence documents attached to a task
///
/// A task cannot move to `completed` while this is zero.
pub async fn evidence_count_for_task(db: &Pool<Sqlite>, task_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM documents WHERE task_id = ? AND kind = 'evidence'",
    )
    .bind(task_id.to_string())
    .fetch_one(db)
    .await?;
    Ok(count)
}
