//! Task writes and reads
//!
//! Instantiation goes through the `entity_control_tasks` junction: the task
//! row and the junction row are written in one transaction, and the
//! junction's composite primary key is what makes a repeat instantiation a
//! no-op instead of a duplicate task.

use chrono::{DateTime, Utc};
use compass_common::model::{Control, TaskRef, TaskStatus};
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use crate::config::TaskBlueprint;
use crate::db::parse_uuid;
use crate::Result;

/// Create the entity-scoped task for a control, unless one already exists
///
/// Returns the new task id, or `None` when this (entity, control) pair was
/// already instantiated. Rolls back the task row if the junction insert is
/// ignored, so no orphan tasks survive a repeat call.
pub async fn instantiate_for_control(
    db: &Pool<Sqlite>,
    entity_id: Uuid,
    control: &Control,
    blueprint: &TaskBlueprint,
    due_at: DateTime<Utc>,
) -> Result<Option<Uuid>> {
    let task_id = Uuid::new_v4();
    let title = format!("{}{}", blueprint.title_prefix, control.title);

    let mut tx = db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO tasks
            (guid, control_id, title, description, status, priority, category, estimated_hours, due_at)
        VALUES (?, ?, ?, ?, 'pending', ?, ?, ?, ?)
        "#,
    )
    .bind(task_id.to_string())
    .bind(control.guid.to_string())
    .bind(&title)
    .bind(control.description.as_deref())
    .bind(&control.priority)
    .bind(&blueprint.category)
    .bind(blueprint.estimated_hours)
    .bind(due_at)
    .execute(&mut *tx)
    .await?;

    let junction = sqlx::query(
        r#"
        INSERT OR IGNORE INTO entity_control_tasks (entity_id, control_id, task_id)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(entity_id.to_string())
    .bind(control.guid.to_string())
    .bind(task_id.to_string())
    .execute(&mut *tx)
    .await?;

    if junction.rows_affected() == 0 {
        // Already instantiated for this (entity, control) pair
        tx.rollback().await?;
        return Ok(None);
    }

    tx.commit().await?;
    Ok(Some(task_id))
}

/// Current status and control linkage of a task
pub async fn get_status_and_control(
    db: &Pool<Sqlite>,
    task_id: Uuid,
) -> Result<Option<(TaskStatus, Option<Uuid>)>> {
    let row = sqlx::query("SELECT status, control_id FROM tasks WHERE guid = ?")
        .bind(task_id.to_string())
        .fetch_optional(db)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let status_str: String = row.get("status");
    let status = TaskStatus::from_str(&status_str).unwrap_or(TaskStatus::Pending);
    let control_id = match row.get::<Option<String>, _>("control_id") {
        Some(id) => Some(parse_uuid(&id)?),
        None => None,
    };

    Ok(Some((status, control_id)))
}

/// Update a task's status
pub async fn update_status(db: &Pool<Sqlite>, task_id: Uuid, status: TaskStatus) -> Result<()> {
    sqlx::query("UPDATE tasks SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE guid = ?")
        .bind(status.as_str())
        .bind(task_id.to_string())
        .execute(db)
        .await?;
    Ok(())
}

/// Entity-scoped view of a task, resolved through the instantiation junction
///
/// Returns `None` for template tasks that were never instantiated for an
/// entity; their status changes have no entity to recompute for.
pub async fn get_task_ref(db: &Pool<Sqlite>, task_id: Uuid) -> Result<Option<TaskRef>> {
    let row = sqlx::query(
        r#"
        SELECT t.guid, t.control_id, j.entity_id
        FROM tasks t
        JOIN entity_control_tasks j ON j.task_id = t.guid
        WHERE t.guid = ?
        "#,
    )
    .bind(task_id.to_string())
    .fetch_optional(db)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let control_id = match row.get::<Option<String>, _>("control_id") {
        Some(id) => Some(parse_uuid(&id)?),
        None => None,
    };

    Ok(Some(TaskRef {
        task_id: parse_uuid(&row.get::<String, _>("guid"))?,
        entity_id: parse_uuid(&row.get::<String, _>("entity_id"))?,
        control_id,
    }))
}

/// Number of instantiated tasks for an entity
pub async fn count_for_entity(db: &Pool<Sqlite>, entity_id: Uuid) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM entity_control_tasks WHERE entity_id = ?")
            .bind(entity_id.to_string())
            .fetch_one(db)
            .await?;
    Ok(count)
}
