//! Entity and framework-membership queries

use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::db::parse_uuid;
use crate::Result;

/// Whether an entity row exists
pub async fn exists(db: &Pool<Sqlite>, entity_id: Uuid) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM entities WHERE guid = ?)")
        .bind(entity_id.to_string())
        .fetch_one(db)
        .await?;
    Ok(exists)
}

/// Mark a framework membership active, creating the row if needed
pub async fn activate_membership(
    db: &Pool<Sqlite>,
    entity_id: Uuid,
    framework_id: Uuid,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO entity_frameworks (entity_id, framework_id, status)
        VALUES (?, ?, 'active')
        ON CONFLICT (entity_id, framework_id) DO UPDATE SET status = 'active'
        "#,
    )
    .bind(entity_id.to_string())
    .bind(framework_id.to_string())
    .execute(db)
    .await?;
    Ok(())
}

/// Active framework ids assigned to an entity
pub async fn find_active_framework_ids(
    db: &Pool<Sqlite>,
    entity_id: Uuid,
) -> Result<Vec<Uuid>> {
    let rows: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT framework_id FROM entity_frameworks
        WHERE entity_id = ? AND status = 'active'
        ORDER BY framework_id
        "#,
    )
    .bind(entity_id.to_string())
    .fetch_all(db)
    .await?;

    rows.iter().map(|id| parse_uuid(id)).collect()
}

/// Set or clear the pending-recompute flag on a membership row
pub async fn set_recompute_pending(
    db: &Pool<Sqlite>,
    entity_id: Uuid,
    framework_id: Uuid,
    pending: bool,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE entity_frameworks SET recompute_pending = ?
        WHERE entity_id = ? AND framework_id = ?
        "#,
    )
    .bind(pending as i64)
    .bind(entity_id.to_string())
    .bind(framework_id.to_string())
    .execute(db)
    .await?;
    Ok(())
}

/// Memberships whose last recompute failed and awaits retry
pub async fn list_pending_recomputes(db: &Pool<Sqlite>) -> Result<Vec<(Uuid, Uuid)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT entity_id, framework_id FROM entity_frameworks
        WHERE recompute_pending = 1 AND status = 'active'
        "#,
    )
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|(e, f)| Ok((parse_uuid(e)?, parse_uuid(f)?)))
        .collect()
}
