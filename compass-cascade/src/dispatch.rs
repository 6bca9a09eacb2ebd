//! Event dispatcher
//!
//! The asynchronous trigger path: subscribes to the EventBus at service
//! startup and drives the orchestrator from task, document and audit gap
//! events. Handler failures are caught and logged here — publish is
//! fire-and-forget, so there is nobody to return them to.
//!
//! Framework assignment is deliberately NOT handled: that cascade runs
//! synchronously inside the producer so its errors reach the HTTP caller.
//! The bus copy of `FrameworkAssigned` exists for observers only.

use std::sync::Arc;

use compass_common::events::{ComplianceEvent, EventBus};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cascade::CascadeOrchestrator;

/// Drives the orchestrator from bus events
pub struct EventDispatcher {
    orchestrator: Arc<CascadeOrchestrator>,
}

impl EventDispatcher {
    pub fn new(orchestrator: Arc<CascadeOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Subscribe to the bus and consume events until it closes
    ///
    /// Lagging (the dispatcher falling behind a full channel) drops the
    /// oldest events; a warning records how many. Dropped recompute triggers
    /// are eventually healed by the pending-recompute sweep.
    pub fn run(self: Arc<Self>, bus: &EventBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        info!("event dispatcher subscribed");

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => self.handle_event(event).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "event dispatcher lagged; dropped events");
                    }
                    Err(RecvError::Closed) => {
                        info!("event bus closed; dispatcher stopping");
                        break;
                    }
                }
            }
        })
    }

    /// Dispatch one event to the matching orchestrator operation
    ///
    /// Errors are logged and swallowed: this is the best-effort path.
    pub async fn handle_event(&self, event: ComplianceEvent) {
        let topic = event.topic();
        let result = match &event {
            ComplianceEvent::TaskStatusChanged {
                task,
                old_status,
                new_status,
                ..
            } => {
                self.orchestrator
                    .on_task_status_changed(task, *old_status, *new_status)
                    .await
            }
            ComplianceEvent::TaskCompleted { task, .. } => {
                self.orchestrator.on_task_completed(task).await
            }
            ComplianceEvent::DocumentUploaded { document, .. }
            | ComplianceEvent::DocumentUpdated { document, .. } => {
                self.orchestrator.on_document_uploaded(document).await
            }
            ComplianceEvent::DocumentDeleted { document, .. } => {
                self.orchestrator.on_document_deleted(document).await
            }
            ComplianceEvent::AuditGapStatusChanged {
                gap,
                old_status,
                new_status,
                ..
            } => {
                self.orchestrator
                    .on_audit_gap_status_changed(gap, *old_status, *new_status)
                    .await
            }
            ComplianceEvent::FrameworkAssigned { .. } => {
                // Handled synchronously by the producer
                debug!(topic, "observer-only event ignored");
                Ok(())
            }
            _ => {
                debug!(topic, "no cascade reaction for event");
                Ok(())
            }
        };

        if let Err(e) = result {
            error!(topic, "event handler failed: {}", e);
        }
    }
}
