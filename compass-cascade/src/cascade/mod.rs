//! Cascade orchestrator
//!
//! Turns one domain event into the ordered derived writes it implies:
//!
//! 1. assignment sync — materialize each framework control for the entity
//! 2. task instantiation — derive an actionable task per control
//! 3. score recompute — ask the compliance engine to refresh the score
//!
//! Step order is load-bearing: instantiated tasks hang off the
//! (entity, control) junction, so they must not exist before the
//! assignments do. A step failure aborts the remaining steps and is
//! returned to the caller; an item failure inside a step is logged,
//! counted, and the loop continues.

mod gate;

pub use gate::RecomputeGate;

use std::sync::Arc;
use std::time::Duration;

use compass_common::model::{
    DocumentRef, GapRef, GapStatus, SyncReport, TaskRef, TaskStatus,
};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CascadeConfig;
use crate::db;
use crate::engine::{ComplianceEngine, EngineError};
use crate::{Error, Result};

/// Result of a framework assignment cascade
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AssignmentOutcome {
    pub assignments: SyncReport,
    pub tasks: SyncReport,
}

/// The compliance propagation orchestrator
pub struct CascadeOrchestrator {
    db: SqlitePool,
    engine: Arc<dyn ComplianceEngine>,
    gate: RecomputeGate,
    config: CascadeConfig,
}

impl CascadeOrchestrator {
    pub fn new(db: SqlitePool, engine: Arc<dyn ComplianceEngine>, config: CascadeConfig) -> Self {
        let gate = RecomputeGate::new(Duration::from_millis(config.recompute_debounce_ms));
        Self {
            db,
            engine,
            gate,
            config,
        }
    }

    // ========================================================================
    // Event entry points
    // ========================================================================

    /// Framework assigned to an entity (synchronous trigger path)
    ///
    /// Runs assignment sync, task instantiation and the recompute in strict
    /// order. Any step failure aborts the rest and propagates, so the HTTP
    /// producer can report it; each step is idempotent, so a retry resumes
    /// where the previous attempt stopped.
    pub async fn on_framework_assigned(
        &self,
        entity_id: Uuid,
        framework_id: Uuid,
    ) -> Result<AssignmentOutcome> {
        if !db::entities::exists(&self.db, entity_id).await? {
            return Err(Error::NotFound(format!("entity {}", entity_id)));
        }
        // Validates the framework exists before any write
        db::frameworks::get_framework(&self.db, framework_id).await?;

        db::entities::activate_membership(&self.db, entity_id, framework_id).await?;

        let assignments = self.sync_control_assignments(entity_id, framework_id).await?;
        let tasks = self.instantiate_framework_tasks(entity_id, framework_id).await?;
        self.recompute_now(entity_id, framework_id, "framework.assigned").await?;

        info!(
            %entity_id, %framework_id,
            assignments_created = assignments.created,
            tasks_created = tasks.created,
            "framework assignment cascade complete"
        );
        Ok(AssignmentOutcome { assignments, tasks })
    }

    /// Task status changed
    ///
    /// Only transitions into a terminal status (completed, cancelled,
    /// overdue) trigger a recompute; progress updates are filtered out.
    pub async fn on_task_status_changed(
        &self,
        task: &TaskRef,
        old_status: TaskStatus,
        new_status: TaskStatus,
    ) -> Result<()> {
        if new_status.is_terminal() && new_status != old_status {
            self.on_task_completed(task).await
        } else {
            debug!(
                task_id = %task.task_id,
                %old_status, %new_status,
                "task status change does not affect compliance score"
            );
            Ok(())
        }
    }

    /// Task reached a terminal status
    ///
    /// A control-linked task narrows the recompute to that control's
    /// framework; a free-floating task fans out over every active framework
    /// the entity carries.
    pub async fn on_task_completed(&self, task: &TaskRef) -> Result<()> {
        if let Some(control_id) = task.control_id {
            if let Some(framework_id) =
                db::controls::framework_for_control(&self.db, control_id).await?
            {
                self.recompute_gated(task.entity_id, framework_id, "task.completed")
                    .await;
                return Ok(());
            }
            // Control was deleted since the task was created; fall through
        }
        self.fan_out_recompute(task.entity_id, "task.completed").await
    }

    /// Evidence/policy document uploaded
    pub async fn on_document_uploaded(&self, document: &DocumentRef) -> Result<()> {
        self.document_recompute(document, "document.uploaded").await
    }

    /// Document deleted
    pub async fn on_document_deleted(&self, document: &DocumentRef) -> Result<()> {
        self.document_recompute(document, "document.deleted").await
    }

    /// Audit gap status changed
    ///
    /// Only closing a gap refreshes the score. Reopening does not: the
    /// finding workflow treats a reopened gap as under investigation, and
    /// the score keeps its last computed value until the gap closes again.
    pub async fn on_audit_gap_status_changed(
        &self,
        gap: &GapRef,
        old_status: GapStatus,
        new_status: GapStatus,
    ) -> Result<()> {
        if new_status == GapStatus::Closed && old_status != GapStatus::Closed {
            self.fan_out_recompute(gap.entity_id, "audit_gap.closed").await
        } else {
            debug!(gap_id = %gap.gap_id, %old_status, %new_status, "gap change ignored");
            Ok(())
        }
    }

    // ========================================================================
    // Cascade steps
    // ========================================================================

    /// Materialize an assignment for every control of the framework
    ///
    /// Safe to call twice: existing (entity, control) pairs are skipped by
    /// the uniqueness constraint. One control's insert failure is counted
    /// and the loop continues; only a failure to enumerate the controls
    /// aborts the step.
    pub async fn sync_control_assignments(
        &self,
        entity_id: Uuid,
        framework_id: Uuid,
    ) -> Result<SyncReport> {
        let controls = db::controls::list_by_framework(&self.db, framework_id).await?;

        let mut report = SyncReport {
            examined: controls.len(),
            ..Default::default()
        };

        for control in &controls {
            match db::assignments::insert_if_absent(&self.db, entity_id, control).await {
                Ok(true) => report.created += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        %entity_id, control_id = %control.guid, code = %control.code,
                        "assignment insert failed: {}", e
                    );
                }
            }
        }

        info!(
            %entity_id, %framework_id,
            examined = report.examined, created = report.created, failed = report.failed,
            "control assignments synced"
        );
        Ok(report)
    }

    /// Derive one entity-scoped task per control of the framework
    ///
    /// Task content comes from the blueprint for the framework's category;
    /// due date is now + configured days. The (entity, control) junction key
    /// makes a second pass create nothing. Item failures are counted and
    /// the loop continues.
    pub async fn instantiate_framework_tasks(
        &self,
        entity_id: Uuid,
        framework_id: Uuid,
    ) -> Result<SyncReport> {
        let framework = db::frameworks::get_framework(&self.db, framework_id).await?;
        let controls = db::controls::list_by_framework(&self.db, framework_id).await?;
        let blueprint = self.config.blueprint_for(framework.category);
        let due_at = chrono::Utc::now() + chrono::Duration::days(self.config.task_due_days);

        let mut report = SyncReport {
            examined: controls.len(),
            ..Default::default()
        };

        for control in &controls {
            match db::tasks::instantiate_for_control(&self.db, entity_id, control, blueprint, due_at)
                .await
            {
                Ok(Some(task_id)) => {
                    report.created += 1;
                    debug!(%entity_id, control_id = %control.guid, %task_id, "task instantiated");
                }
                Ok(None) => {}
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        %entity_id, control_id = %control.guid, code = %control.code,
                        "task instantiation failed: {}", e
                    );
                }
            }
        }

        info!(
            %entity_id, %framework_id, category = %framework.category,
            examined = report.examined, created = report.created, failed = report.failed,
            "framework tasks instantiated"
        );
        Ok(report)
    }

    /// Recompute the score for one (entity, framework) pair, unconditionally
    ///
    /// Bounded by the configured engine deadline. On success the pending
    /// flag is cleared; a retryable failure sets it so the sweep picks the
    /// pair up later. The error is returned either way and the caller
    /// decides whether it matters.
    pub async fn recompute_now(
        &self,
        entity_id: Uuid,
        framework_id: Uuid,
        trigger: &str,
    ) -> Result<()> {
        self.gate.touch(entity_id, framework_id);

        let deadline = Duration::from_millis(self.config.engine_timeout_ms);
        let call = self.engine.check_entity_compliance(entity_id, framework_id);
        let outcome = match tokio::time::timeout(deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout {
                elapsed_ms: self.config.engine_timeout_ms,
            }),
        };

        match outcome {
            Ok(()) => {
                db::entities::set_recompute_pending(&self.db, entity_id, framework_id, false)
                    .await?;
                debug!(%entity_id, %framework_id, trigger, "compliance score recomputed");
                Ok(())
            }
            Err(e) => {
                warn!(%entity_id, %framework_id, trigger, "recompute failed: {}", e);
                if e.is_retryable() {
                    if let Err(flag_err) =
                        db::entities::set_recompute_pending(&self.db, entity_id, framework_id, true)
                            .await
                    {
                        warn!(%entity_id, %framework_id, "could not flag pending recompute: {}", flag_err);
                    }
                }
                Err(Error::Engine(e))
            }
        }
    }

    /// Recompute through the coalescing gate (bus-triggered path)
    ///
    /// A skipped duplicate is success. Failures are already logged and
    /// flagged by `recompute_now`; this path swallows them because the bus
    /// publisher has no error channel.
    async fn recompute_gated(&self, entity_id: Uuid, framework_id: Uuid, trigger: &str) {
        if !self.gate.should_run(entity_id, framework_id) {
            debug!(%entity_id, %framework_id, trigger, "recompute coalesced");
            return;
        }
        let _ = self.recompute_now(entity_id, framework_id, trigger).await;
    }

    /// Recompute every active framework of an entity
    ///
    /// Each framework's recompute is independent; one failure never blocks
    /// the rest. Only the membership lookup itself can fail the operation.
    async fn fan_out_recompute(&self, entity_id: Uuid, trigger: &str) -> Result<()> {
        let frameworks = db::entities::find_active_framework_ids(&self.db, entity_id).await?;
        debug!(%entity_id, count = frameworks.len(), trigger, "fanning out recompute");

        for framework_id in frameworks {
            self.recompute_gated(entity_id, framework_id, trigger).await;
        }
        Ok(())
    }

    /// Scoped or fan-out recompute for a document event
    async fn document_recompute(&self, document: &DocumentRef, trigger: &str) -> Result<()> {
        if let Some(control_id) = document.control_id {
            if let Some(framework_id) =
                db::controls::framework_for_control(&self.db, control_id).await?
            {
                self.recompute_gated(document.entity_id, framework_id, trigger).await;
                return Ok(());
            }
        }
        self.fan_out_recompute(document.entity_id, trigger).await
    }
}
