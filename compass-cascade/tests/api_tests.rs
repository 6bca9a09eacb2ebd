//! Integration tests for the cascade REST API
//!
//! Drives the producers through the axum router with an in-memory database
//! and a recording engine double, covering:
//! - Health endpoint
//! - Framework assignment (synchronous cascade, error surfacing)
//! - Task status transitions and the evidence precondition
//! - Document upload/delete
//! - Audit gap status updates

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use compass_cascade::api::{create_router, AppState};
use compass_cascade::cascade::CascadeOrchestrator;
use compass_cascade::config::CascadeConfig;
use compass_cascade::engine::ComplianceEngine;
use compass_common::events::EventBus;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::util::ServiceExt; // for `oneshot` method
use uuid::Uuid;

use common::*;

/// Test helper: build the app over an in-memory database
async fn setup_app(engine: Arc<dyn ComplianceEngine>) -> (Router, SqlitePool) {
    let pool = compass_common::db::init_memory_database().await.unwrap();
    let config = CascadeConfig {
        recompute_debounce_ms: 0,
        ..CascadeConfig::default()
    };
    let orchestrator = Arc::new(CascadeOrchestrator::new(
        pool.clone(),
        engine,
        config,
    ));
    let state = AppState {
        db: pool.clone(),
        bus: Arc::new(EventBus::new(64)),
        orchestrator,
        port: 0,
    };
    (create_router(state), pool)
}

/// Test helper: request without a body
fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: request with a JSON body
fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// Health Endpoint
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _pool) = setup_app(RecordingEngine::new()).await;

    let response = app.oneshot(request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "compass-cascade");
    assert!(body["version"].is_string());
}

// =============================================================================
// Framework Assignment
// =============================================================================

#[tokio::test]
async fn test_assign_framework_reports_cascade_counts() {
    let engine = RecordingEngine::new();
    let (app, pool) = setup_app(engine.clone()).await;
    let entity = seed_entity(&pool).await;
    let framework = seed_framework(&pool, "info_sec", 2).await;

    let uri = format!("/api/v1/entities/{}/frameworks/{}", entity, framework);
    let response = app
        .clone()
        .oneshot(request("POST", &uri))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "assigned");
    assert_eq!(body["assignments_examined"], 2);
    assert_eq!(body["assignments_created"], 2);
    assert_eq!(body["tasks_created"], 2);
    assert_eq!(engine.call_count(), 1);

    // A repeat request is safe and creates nothing new
    let response = app.oneshot(request("POST", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["assignments_created"], 0);
    assert_eq!(body["tasks_created"], 0);
}

#[tokio::test]
async fn test_assign_framework_unknown_ids_return_404() {
    let (app, pool) = setup_app(RecordingEngine::new()).await;
    let entity = seed_entity(&pool).await;
    let framework = seed_framework(&pool, "general", 1).await;

    let uri = format!("/api/v1/entities/{}/frameworks/{}", Uuid::new_v4(), framework);
    let response = app.clone().oneshot(request("POST", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let uri = format!("/api/v1/entities/{}/frameworks/{}", entity, Uuid::new_v4());
    let response = app.oneshot(request("POST", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_assign_framework_engine_failure_returns_500() {
    let (app, pool) = setup_app(Arc::new(FailingEngine)).await;
    let entity = seed_entity(&pool).await;
    let framework = seed_framework(&pool, "general", 1).await;

    let uri = format!("/api/v1/entities/{}/frameworks/{}", entity, framework);
    let response = app.oneshot(request("POST", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // The earlier steps committed and the pair is flagged for the sweep
    assert_eq!(pending_pairs(&pool).await.len(), 1);
}

// =============================================================================
// Task Status Transitions
// =============================================================================

#[tokio::test]
async fn test_complete_task_requires_evidence() {
    let engine = RecordingEngine::new();
    let (app, pool) = setup_app(engine.clone()).await;
    let entity = seed_entity(&pool).await;
    let framework = seed_framework(&pool, "general", 1).await;

    let uri = format!("/api/v1/entities/{}/frameworks/{}", entity, framework);
    app.clone().oneshot(request("POST", &uri)).await.unwrap();
    let task_id = task_ids_for_entity(&pool, entity).await[0];

    // No evidence yet: completion is refused
    let uri = format!("/api/v1/tasks/{}/status", task_id);
    let response = app
        .clone()
        .oneshot(json_request("PATCH", &uri, json!({"status": "completed"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Upload evidence against the task
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/documents",
            json!({
                "entity_id": entity,
                "task_id": task_id,
                "kind": "evidence",
                "name": "access-review.pdf",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Now completion succeeds
    let response = app
        .oneshot(json_request("PATCH", &uri, json!({"status": "completed"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["old_status"], "pending");
    assert_eq!(body["new_status"], "completed");

    let status: String = sqlx::query_scalar("SELECT status FROM tasks WHERE guid = ?")
        .bind(task_id.to_string())
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "completed");
}

#[tokio::test]
async fn test_task_status_validation() {
    let (app, pool) = setup_app(RecordingEngine::new()).await;
    let entity = seed_entity(&pool).await;
    let framework = seed_framework(&pool, "general", 1).await;

    let uri = format!("/api/v1/entities/{}/frameworks/{}", entity, framework);
    app.clone().oneshot(request("POST", &uri)).await.unwrap();
    let task_id = task_ids_for_entity(&pool, entity).await[0];

    // Unknown status value
    let uri = format!("/api/v1/tasks/{}/status", task_id);
    let response = app
        .clone()
        .oneshot(json_request("PATCH", &uri, json!({"status": "done"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown task
    let uri = format!("/api/v1/tasks/{}/status", Uuid::new_v4());
    let response = app
        .oneshot(json_request("PATCH", &uri, json!({"status": "in_progress"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Documents
// =============================================================================

#[tokio::test]
async fn test_document_upload_and_delete() {
    let (app, pool) = setup_app(RecordingEngine::new()).await;
    let entity = seed_entity(&pool).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/documents",
            json!({
                "entity_id": entity,
                "kind": "policy",
                "name": "information-security-policy.pdf",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = extract_json(response.into_body()).await;
    let document_id = body["document_id"].as_str().unwrap().to_string();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let uri = format!("/api/v1/documents/{}", document_id);
    let response = app.clone().oneshot(request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);

    // Deleting again: the row is gone
    let response = app.oneshot(request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_document_upload_rejects_unknown_kind() {
    let (app, pool) = setup_app(RecordingEngine::new()).await;
    let entity = seed_entity(&pool).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/documents",
            json!({
                "entity_id": entity,
                "kind": "spreadsheet",
                "name": "controls.xlsx",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Audit Gaps
// =============================================================================

#[tokio::test]
async fn test_gap_status_update() {
    let (app, pool) = setup_app(RecordingEngine::new()).await;
    let entity = seed_entity(&pool).await;
    let gap = seed_gap(&pool, entity).await;

    let uri = format!("/api/v1/audit-gaps/{}/status", gap);
    let response = app
        .clone()
        .oneshot(json_request("PATCH", &uri, json!({"status": "closed"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status: String = sqlx::query_scalar("SELECT status FROM audit_gaps WHERE guid = ?")
        .bind(gap.to_string())
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "closed");

    // Unknown status value
    let response = app
        .clone()
        .oneshot(json_request("PATCH", &uri, json!({"status": "resolved"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown gap
    let uri = format!("/api/v1/audit-gaps/{}/status", Uuid::new_v4());
    let response = app
        .oneshot(json_request("PATCH", &uri, json!({"status": "closed"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
