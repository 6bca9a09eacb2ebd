//! REST API for the cascade service
//!
//! Thin producers: each endpoint performs its primary write, then fires the
//! canonical trigger for the cascade — the direct synchronous call for
//! framework assignment, a bus publish for everything else.

pub mod handlers;

use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, patch, post},
    Router,
};
use compass_common::events::EventBus;
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::cascade::CascadeOrchestrator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub bus: Arc<EventBus>,
    pub orchestrator: Arc<CascadeOrchestrator>,
    pub port: u16,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(health_check))
        // API v1 routes
        .nest(
            "/api/v1",
            Router::new()
                // Framework assignment: the synchronous cascade trigger
                .route(
                    "/entities/:entity_id/frameworks/:framework_id",
                    post(handlers::assign_framework),
                )
                // Task status transitions
                .route("/tasks/:task_id/status", patch(handlers::update_task_status))
                // Documents
                .route("/documents", post(handlers::upload_document))
                .route("/documents/:document_id", delete(handlers::delete_document))
                // Audit gaps
                .route("/audit-gaps/:gap_id/status", patch(handlers::update_gap_status)),
        )
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "compass-cascade",
        "version": env!("CARGO_PKG_VERSION"),
        "port": state.port,
    }))
}
