//! HTTP request handlers
//!
//! Producers for the cascade: primary CRUD write first, then exactly one
//! trigger. Cascade errors from the synchronous path surface here as HTTP
//! errors; bus publishes never fail the request.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use compass_common::events::ComplianceEvent;
use compass_common::model::{DocumentKind, DocumentRef, GapStatus, TaskStatus};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::AppState;
use crate::{db, Error};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct AssignFrameworkResponse {
    status: String,
    assignments_examined: usize,
    assignments_created: usize,
    tasks_created: usize,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    status: String,
    old_status: String,
    new_status: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadDocumentRequest {
    entity_id: Uuid,
    task_id: Option<Uuid>,
    control_id: Option<Uuid>,
    framework_id: Option<Uuid>,
    kind: String,
    name: String,
}

#[derive(Debug, Serialize)]
pub struct UploadDocumentResponse {
    status: String,
    document_id: Uuid,
}

type HandlerError = (StatusCode, Json<StatusResponse>);

fn error_response(e: Error) -> HandlerError {
    let status = match &e {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        Error::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", e),
        }),
    )
}

// ============================================================================
// Framework assignment (synchronous cascade trigger)
// ============================================================================

/// POST /entities/:entity_id/frameworks/:framework_id
///
/// Assigns a framework to an entity and runs the full cascade inline. A
/// failed step fails the request so the caller can retry; the cascade's
/// idempotency makes the retry safe.
pub async fn assign_framework(
    State(state): State<AppState>,
    Path((entity_id, framework_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AssignFrameworkResponse>, HandlerError> {
    match state
        .orchestrator
        .on_framework_assigned(entity_id, framework_id)
        .await
    {
        Ok(outcome) => {
            // Observer notification only; the dispatcher ignores this topic
            state.bus.emit_lossy(ComplianceEvent::FrameworkAssigned {
                entity_id,
                framework_id,
                timestamp: Utc::now(),
            });
            Ok(Json(AssignFrameworkResponse {
                status: "assigned".to_string(),
                assignments_examined: outcome.assignments.examined,
                assignments_created: outcome.assignments.created,
                tasks_created: outcome.tasks.created,
            }))
        }
        Err(e) => {
            warn!(%entity_id, %framework_id, "framework assignment failed: {}", e);
            Err(error_response(e))
        }
    }
}

// ============================================================================
// Tasks
// ============================================================================

/// PATCH /tasks/:task_id/status
///
/// A task cannot move to completed while no evidence document references
/// it; that violation is a 409, not a cascade concern.
pub async fn update_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<TaskStatusResponse>, HandlerError> {
    let new_status = TaskStatus::from_str(&request.status).ok_or_else(|| {
        error_response(Error::BadRequest(format!(
            "unknown task status '{}'",
            request.status
        )))
    })?;

    let (old_status, _control_id) = db::tasks::get_status_and_control(&state.db, task_id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| error_response(Error::NotFound(format!("task {}", task_id))))?;

    if new_status == TaskStatus::Completed {
        let evidence = db::documents::evidence_count_for_task(&state.db, task_id)
            .await
            .map_err(error_response)?;
        if evidence == 0 {
            return Err(error_response(Error::Conflict(format!(
                "task {} has no evidence documents",
                task_id
            ))));
        }
    }

    db::tasks::update_status(&state.db, task_id, new_status)
        .await
        .map_err(error_response)?;

    // Template tasks have no entity linkage and trigger nothing
    if let Some(task) = db::tasks::get_task_ref(&state.db, task_id)
        .await
        .map_err(error_response)?
    {
        state.bus.emit_lossy(ComplianceEvent::TaskStatusChanged {
            task,
            old_status,
            new_status,
            timestamp: Utc::now(),
        });
    }

    info!(%task_id, %old_status, %new_status, "task status updated");
    Ok(Json(TaskStatusResponse {
        status: "updated".to_string(),
        old_status: old_status.to_string(),
        new_status: new_status.to_string(),
    }))
}

// ============================================================================
// Documents
// ============================================================================

/// POST /documents
pub async fn upload_document(
    State(state): State<AppState>,
    Json(request): Json<UploadDocumentRequest>,
) -> Result<(StatusCode, Json<UploadDocumentResponse>), HandlerError> {
    let kind = DocumentKind::from_str(&request.kind).ok_or_else(|| {
        error_response(Error::BadRequest(format!(
            "unknown document kind '{}'",
            request.kind
        )))
    })?;

    let document_id = Uuid::new_v4();
    db::documents::insert(
        &state.db,
        document_id,
        request.entity_id,
        request.task_id,
        request.control_id,
        request.framework_id,
        kind,
        &request.name,
    )
    .await
    .map_err(error_response)?;

    state.bus.emit_lossy(ComplianceEvent::DocumentUploaded {
        document: DocumentRef {
            document_id,
            entity_id: request.entity_id,
            control_id: request.control_id,
        },
        timestamp: Utc::now(),
    });

    info!(%document_id, entity_id = %request.entity_id, "document uploaded");
    Ok((
        StatusCode::CREATED,
        Json(UploadDocumentResponse {
            status: "created".to_string(),
            document_id,
        }),
    ))
}

/// DELETE /documents/:document_id
pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<StatusResponse>, HandlerError> {
    let document = db::documents::get_ref(&state.db, document_id)
        .await
        .map_err(error_response)?;

    db::documents::delete(&state.db, document_id)
        .await
        .map_err(error_response)?;

    state.bus.emit_lossy(ComplianceEvent::DocumentDeleted {
        document,
        timestamp: Utc::now(),
    });

    info!(%document_id, "document deleted");
    Ok(Json(StatusResponse {
        status: "deleted".to_string(),
    }))
}

// ============================================================================
// Audit gaps
// ============================================================================

/// PATCH /audit-gaps/:gap_id/status
pub async fn update_gap_status(
    State(state): State<AppState>,
    Path(gap_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<StatusResponse>, HandlerError> {
    let new_status = GapStatus::from_str(&request.status).ok_or_else(|| {
        error_response(Error::BadRequest(format!(
            "unknown gap status '{}'",
            request.status
        )))
    })?;

    let (gap, old_status) = db::audit_gaps::update_status(&state.db, gap_id, new_status)
        .await
        .map_err(error_response)?;

    state.bus.emit_lossy(ComplianceEvent::AuditGapStatusChanged {
        gap,
        old_status,
        new_status,
        timestamp: Utc::now(),
    });

    info!(%gap_id, %old_status, %new_status, "audit gap status updated");
    Ok(Json(StatusResponse {
        status: "updated".to_string(),
    }))
}
