//! Database initialization
//!
//! Creates the Compass schema on first run and is safe to call on every
//! start (all DDL is `IF NOT EXISTS`). Correctness-critical uniqueness lives
//! in the schema itself:
//!
//! - `control_assignments` carries `UNIQUE(entity_id, control_id)`, so at
//!   most one assignment per (entity, control) pair exists no matter how
//!   often or how concurrently the sync cascade runs.
//! - `entity_control_tasks` is keyed on `(entity_id, control_id)`, making
//!   task instantiation a constraint-backed insert rather than a
//!   check-then-insert.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers while cascades write
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_tables(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Open an in-memory database with the full schema (test support)
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    create_tables(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent)
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_frameworks_table(pool).await?;
    create_controls_table(pool).await?;
    create_entities_table(pool).await?;
    create_entity_frameworks_table(pool).await?;
    create_control_assignments_table(pool).await?;
    create_tasks_table(pool).await?;
    create_entity_control_tasks_table(pool).await?;
    create_documents_table(pool).await?;
    create_audit_gaps_table(pool).await?;
    Ok(())
}

/// Create the settings table
///
/// Stores service configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_frameworks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS frameworks (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            region TEXT,
            category TEXT NOT NULL DEFAULT 'general'
                CHECK (category IN ('data_privacy', 'info_sec', 'healthcare', 'service_trust', 'financial', 'general')),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_frameworks_category ON frameworks(category)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_controls_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS controls (
            guid TEXT PRIMARY KEY,
            framework_id TEXT NOT NULL REFERENCES frameworks(guid) ON DELETE CASCADE,
            code TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            priority TEXT NOT NULL DEFAULT 'medium',
            category TEXT,
            guidance TEXT,
            evidence_requirements TEXT NOT NULL DEFAULT '[]',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (framework_id, code)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_controls_framework ON controls(framework_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_entities_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entities (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'suspended', 'archived')),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the entity_frameworks membership table
///
/// `recompute_pending` marks memberships whose last score recompute failed;
/// the retry sweep picks these up and clears the flag on success.
pub async fn create_entity_frameworks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entity_frameworks (
            entity_id TEXT NOT NULL REFERENCES entities(guid) ON DELETE CASCADE,
            framework_id TEXT NOT NULL REFERENCES frameworks(guid) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'removed')),
            recompute_pending INTEGER NOT NULL DEFAULT 0,
            assigned_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (entity_id, framework_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_entity_frameworks_pending ON entity_frameworks(recompute_pending)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the control_assignments table
///
/// The `UNIQUE(entity_id, control_id)` constraint is the at-most-one
/// invariant; writers rely on `INSERT OR IGNORE` for idempotency.
pub async fn create_control_assignments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS control_assignments (
            guid TEXT PRIMARY KEY,
            entity_id TEXT NOT NULL REFERENCES entities(guid) ON DELETE CASCADE,
            control_id TEXT NOT NULL REFERENCES controls(guid) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'not_started'
                CHECK (status IN ('not_started', 'in_progress', 'completed', 'needs_review')),
            priority TEXT NOT NULL
                CHECK (priority IN ('low', 'medium', 'high', 'critical')),
            completion_rate INTEGER NOT NULL DEFAULT 0
                CHECK (completion_rate >= 0 AND completion_rate <= 100),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (entity_id, control_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_control_assignments_entity ON control_assignments(entity_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_tasks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            guid TEXT PRIMARY KEY,
            control_id TEXT REFERENCES controls(guid) ON DELETE SET NULL,
            title TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'in_progress', 'completed', 'overdue', 'cancelled')),
            priority TEXT NOT NULL DEFAULT 'medium'
                CHECK (priority IN ('low', 'medium', 'high', 'critical')),
            category TEXT,
            estimated_hours REAL CHECK (estimated_hours IS NULL OR estimated_hours > 0),
            due_at TIMESTAMP,
            assignee TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_control ON tasks(control_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the entity_control_tasks junction table
///
/// Links an instantiated task to the (entity, control) pair it was derived
/// from. The composite primary key makes instantiation idempotent.
pub async fn create_entity_control_tasks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entity_control_tasks (
            entity_id TEXT NOT NULL REFERENCES entities(guid) ON DELETE CASCADE,
            control_id TEXT NOT NULL REFERENCES controls(guid) ON DELETE CASCADE,
            task_id TEXT NOT NULL REFERENCES tasks(guid) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (entity_id, control_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_entity_control_tasks_task ON entity_control_tasks(task_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_entity_control_tasks_entity ON entity_control_tasks(entity_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_documents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            guid TEXT PRIMARY KEY,
            task_id TEXT REFERENCES tasks(guid) ON DELETE SET NULL,
            control_id TEXT REFERENCES controls(guid) ON DELETE SET NULL,
            framework_id TEXT REFERENCES frameworks(guid) ON DELETE SET NULL,
            entity_id TEXT REFERENCES entities(guid) ON DELETE CASCADE,
            kind TEXT NOT NULL DEFAULT 'evidence'
                CHECK (kind IN ('evidence', 'policy', 'report')),
            name TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_task ON documents(task_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_entity ON documents(entity_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_audit_gaps_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_gaps (
            guid TEXT PRIMARY KEY,
            entity_id TEXT NOT NULL REFERENCES entities(guid) ON DELETE CASCADE,
            framework_id TEXT REFERENCES frameworks(guid) ON DELETE SET NULL,
            severity TEXT NOT NULL DEFAULT 'medium'
                CHECK (severity IN ('low', 'medium', 'high', 'critical')),
            status TEXT NOT NULL DEFAULT 'open'
                CHECK (status IN ('open', 'in_progress', 'closed', 'accepted')),
            title TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_gaps_entity ON audit_gaps(entity_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// Ensures all cascade configuration settings exist with default values.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, "engine_timeout_ms", "5000").await?;
    ensure_setting(pool, "recompute_debounce_ms", "2000").await?;
    ensure_setting(pool, "sweep_interval_secs", "60").await?;
    ensure_setting(pool, "sweep_enabled", "true").await?;
    ensure_setting(pool, "event_bus_capacity", "1000").await?;

    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it is created with the default. An existing
/// NULL value is reset to the default.
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    // INSERT OR IGNORE handles concurrent initialization races
    sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?;

    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if value.is_none() {
        sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_database_schema() {
        let pool = init_memory_database().await.expect("schema should initialize");

        // Re-running DDL must be harmless
        create_tables(&pool).await.expect("DDL is idempotent");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(count >= 5, "default settings should be seeded");
    }

    #[tokio::test]
    async fn test_assignment_uniqueness_constraint() {
        let pool = init_memory_database().await.unwrap();

        sqlx::query("INSERT INTO entities (guid, name) VALUES ('e1', 'Acme')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO frameworks (guid, name, category) VALUES ('f1', 'Privacy Act', 'data_privacy')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO controls (guid, framework_id, code, title) VALUES ('c1', 'f1', 'A.1', 'Access reviews')",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO control_assignments (guid, entity_id, control_id, priority) VALUES ('a1', 'e1', 'c1', 'high')",
        )
        .execute(&pool)
        .await
        .unwrap();

        // Second insert for the same (entity, control) pair must violate
        let dup = sqlx::query(
            "INSERT INTO control_assignments (guid, entity_id, control_id, priority) VALUES ('a2', 'e1', 'c1', 'high')",
        )
        .execute(&pool)
        .await;
        assert!(dup.is_err());

        // INSERT OR IGNORE swallows the conflict and reports zero rows
        let ignored = sqlx::query(
            "INSERT OR IGNORE INTO control_assignments (guid, entity_id, control_id, priority) VALUES ('a3', 'e1', 'c1', 'high')",
        )
        .execute(&pool)
        .await
        .unwrap();
        assert_eq!(ignored.rows_affected(), 0);
    }

    #[tokio::test]
    async fn test_ensure_setting_preserves_existing_value() {
        let pool = init_memory_database().await.unwrap();

        sqlx::query("UPDATE settings SET value = '123' WHERE key = 'engine_timeout_ms'")
            .execute(&pool)
            .await
            .unwrap();

        ensure_setting(&pool, "engine_timeout_ms", "5000").await.unwrap();

        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = 'engine_timeout_ms'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(value.as_deref(), Some("123"));
    }
}
