//! Event types and EventBus for the Compass compliance platform
//!
//! Producers publish `ComplianceEvent`s on the `EventBus` after their
//! primary write; the cascade service's dispatcher consumes them. Publish is
//! fire-and-forget: the publisher never learns whether a handler succeeded.
//!
//! The bus is a constructed component passed to whoever needs it; there is
//! no process-global instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::model::{DocumentRef, GapRef, GapStatus, TaskRef, TaskStatus};

/// Compass domain events
///
/// Events are broadcast via EventBus and can be serialized for audit
/// logging or SSE transmission. One variant per topic; `topic()` yields the
/// dotted topic string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ComplianceEvent {
    /// Framework assigned to an entity
    ///
    /// Published for observers only: the assignment cascade runs through the
    /// direct synchronous call path, never through the bus.
    FrameworkAssigned {
        entity_id: Uuid,
        framework_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Framework removed from an entity
    FrameworkRemoved {
        entity_id: Uuid,
        framework_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Entity created
    EntityCreated {
        entity_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Entity updated
    EntityUpdated {
        entity_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Control assignment materialized for an entity
    ControlAssigned {
        entity_id: Uuid,
        control_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Control assignment status changed
    ControlStatusChanged {
        entity_id: Uuid,
        control_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Control assignment completed
    ControlCompleted {
        entity_id: Uuid,
        control_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Task created
    TaskCreated {
        task: TaskRef,
        timestamp: DateTime<Utc>,
    },

    /// Task assigned to a person
    TaskAssigned {
        task: TaskRef,
        assignee: String,
        timestamp: DateTime<Utc>,
    },

    /// Task status changed
    TaskStatusChanged {
        task: TaskRef,
        old_status: TaskStatus,
        new_status: TaskStatus,
        timestamp: DateTime<Utc>,
    },

    /// Task reached completed status
    TaskCompleted {
        task: TaskRef,
        timestamp: DateTime<Utc>,
    },

    /// Evidence/policy document uploaded
    DocumentUploaded {
        document: DocumentRef,
        timestamp: DateTime<Utc>,
    },

    /// Document metadata updated
    DocumentUpdated {
        document: DocumentRef,
        timestamp: DateTime<Utc>,
    },

    /// Document deleted
    DocumentDeleted {
        document: DocumentRef,
        timestamp: DateTime<Utc>,
    },

    /// Audit gap status changed
    AuditGapStatusChanged {
        gap: GapRef,
        old_status: GapStatus,
        new_status: GapStatus,
        timestamp: DateTime<Utc>,
    },
}

impl ComplianceEvent {
    /// Dotted topic string for this event
    pub fn topic(&self) -> &'static str {
        match self {
            ComplianceEvent::FrameworkAssigned { .. } => "framework.assigned",
            ComplianceEvent::FrameworkRemoved { .. } => "framework.removed",
            ComplianceEvent::EntityCreated { .. } => "entity.created",
            ComplianceEvent::EntityUpdated { .. } => "entity.updated",
            ComplianceEvent::ControlAssigned { .. } => "control.assigned",
            ComplianceEvent::ControlStatusChanged { .. } => "control.status.changed",
            ComplianceEvent::ControlCompleted { .. } => "control.completed",
            ComplianceEvent::TaskCreated { .. } => "task.created",
            ComplianceEvent::TaskAssigned { .. } => "task.assigned",
            ComplianceEvent::TaskStatusChanged { .. } => "task.status.changed",
            ComplianceEvent::TaskCompleted { .. } => "task.completed",
            ComplianceEvent::DocumentUploaded { .. } => "document.uploaded",
            ComplianceEvent::DocumentUpdated { .. } => "document.updated",
            ComplianceEvent::DocumentDeleted { .. } => "document.deleted",
            ComplianceEvent::AuditGapStatusChanged { .. } => "audit_gap.status.changed",
        }
    }

    /// Entity the event concerns
    pub fn entity_id(&self) -> Uuid {
        match self {
            ComplianceEvent::FrameworkAssigned { entity_id, .. }
            | ComplianceEvent::FrameworkRemoved { entity_id, .. }
            | ComplianceEvent::EntityCreated { entity_id, .. }
            | ComplianceEvent::EntityUpdated { entity_id, .. }
            | ComplianceEvent::ControlAssigned { entity_id, .. }
            | ComplianceEvent::ControlStatusChanged { entity_id, .. }
            | ComplianceEvent::ControlCompleted { entity_id, .. } => *entity_id,
            ComplianceEvent::TaskCreated { task, .. }
            | ComplianceEvent::TaskAssigned { task, .. }
            | ComplianceEvent::TaskStatusChanged { task, .. }
            | ComplianceEvent::TaskCompleted { task, .. } => task.entity_id,
            ComplianceEvent::DocumentUploaded { document, .. }
            | ComplianceEvent::DocumentUpdated { document, .. }
            | ComplianceEvent::DocumentDeleted { document, .. } => document.entity_id,
            ComplianceEvent::AuditGapStatusChanged { gap, .. } => gap.entity_id,
        }
    }
}

/// Broadcast-based event bus
///
/// One-to-many, fire-and-forget. Subscribers receive events emitted after
/// they subscribed; slow subscribers lag and drop the oldest events once the
/// channel capacity is exceeded.
pub struct EventBus {
    tx: broadcast::Sender<ComplianceEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ComplianceEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` otherwise. Handler outcomes are never reported back.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ComplianceEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<ComplianceEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, silently dropping it when nobody is listening
    ///
    /// Used by producers for whom a missing subscriber is not an error
    /// (e.g. during startup before the dispatcher is running).
    pub fn emit_lossy(&self, event: ComplianceEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Channel capacity this bus was created with
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
