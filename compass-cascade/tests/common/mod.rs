//! Shared test support: engine doubles and database seeding helpers

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use compass_cascade::engine::{ComplianceEngine, EngineError};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Engine double that records every call and succeeds
pub struct RecordingEngine {
    calls: Mutex<Vec<(Uuid, Uuid)>>,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(Uuid, Uuid)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ComplianceEngine for RecordingEngine {
    async fn check_entity_compliance(
        &self,
        entity_id: Uuid,
        framework_id: Uuid,
    ) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push((entity_id, framework_id));
        Ok(())
    }
}

/// Engine double that always fails with a retryable transport error
pub struct FailingEngine;

#[async_trait]
impl ComplianceEngine for FailingEngine {
    async fn check_entity_compliance(
        &self,
        _entity_id: Uuid,
        _framework_id: Uuid,
    ) -> Result<(), EngineError> {
        Err(EngineError::Http("connection refused".into()))
    }
}

/// Engine double that never answers within a short deadline
pub struct SlowEngine {
    pub delay: Duration,
}

#[async_trait]
impl ComplianceEngine for SlowEngine {
    async fn check_entity_compliance(
        &self,
        _entity_id: Uuid,
        _framework_id: Uuid,
    ) -> Result<(), EngineError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Insert an entity row, returning its id
pub async fn seed_entity(pool: &SqlitePool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO entities (guid, name) VALUES (?, 'Test Entity')")
        .bind(id.to_string())
        .execute(pool)
        .await
        .unwrap();
    id
}

/// Insert a framework with `control_count` controls, returning its id
pub async fn seed_framework(pool: &SqlitePool, category: &str, control_count: usize) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO frameworks (guid, name, category) VALUES (?, 'Framework', ?)")
        .bind(id.to_string())
        .bind(category)
        .execute(pool)
        .await
        .unwrap();
    for i in 0..control_count {
        sqlx::query(
            "INSERT INTO controls (guid, framework_id, code, title, priority) VALUES (?, ?, ?, ?, 'high')",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(id.to_string())
        .bind(format!("C.{}", i + 1))
        .bind(format!("Control {}", i + 1))
        .execute(pool)
        .await
        .unwrap();
    }
    id
}

/// Insert an open audit gap for the entity, returning its id
pub async fn seed_gap(pool: &SqlitePool, entity_id: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO audit_gaps (guid, entity_id, severity, status, title) VALUES (?, ?, 'high', 'open', 'Missing access reviews')",
    )
    .bind(id.to_string())
    .bind(entity_id.to_string())
    .execute(pool)
    .await
    .unwrap();
    id
}

/// Controls of a framework, ordered by code
pub async fn control_ids(pool: &SqlitePool, framework_id: Uuid) -> Vec<Uuid> {
    let rows: Vec<String> =
        sqlx::query_scalar("SELECT guid FROM controls WHERE framework_id = ? ORDER BY code")
            .bind(framework_id.to_string())
            .fetch_all(pool)
            .await
            .unwrap();
    rows.iter().map(|s| Uuid::parse_str(s).unwrap()).collect()
}

/// Instantiated task ids for an entity, via the junction table
pub async fn task_ids_for_entity(pool: &SqlitePool, entity_id: Uuid) -> Vec<Uuid> {
    let rows: Vec<String> =
        sqlx::query_scalar("SELECT task_id FROM entity_control_tasks WHERE entity_id = ?")
            .bind(entity_id.to_string())
            .fetch_all(pool)
            .await
            .unwrap();
    rows.iter().map(|s| Uuid::parse_str(s).unwrap()).collect()
}

/// Pending (entity, framework) recompute pairs
pub async fn pending_pairs(pool: &SqlitePool) -> Vec<(String, String)> {
    sqlx::query_as("SELECT entity_id, framework_id FROM entity_frameworks WHERE recompute_pending = 1")
        .fetch_all(pool)
        .await
        .unwrap()
}
