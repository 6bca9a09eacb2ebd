//! Pending-recompute retry sweep
//!
//! Recompute failures are flagged on the membership row rather than lost.
//! This periodic task re-runs the flagged pairs and lets `recompute_now`
//! clear the flag on success. Runs until the service shuts down.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::cascade::CascadeOrchestrator;
use crate::config::CascadeConfig;
use crate::db;

/// Periodic retry of flagged recomputes
pub struct RecomputeSweep {
    db: SqlitePool,
    orchestrator: Arc<CascadeOrchestrator>,
    config: CascadeConfig,
}

impl RecomputeSweep {
    pub fn new(db: SqlitePool, orchestrator: Arc<CascadeOrchestrator>, config: CascadeConfig) -> Self {
        Self {
            db,
            orchestrator,
            config,
        }
    }

    /// Run the sweep (spawns a background task)
    pub fn run(self: Arc<Self>) {
        if !self.config.sweep_enabled {
            info!("recompute sweep disabled by configuration");
            return;
        }

        info!(interval_secs = self.config.sweep_interval_secs, "starting recompute sweep");

        tokio::spawn(async move {
            let mut timer = interval(Duration::from_secs(self.config.sweep_interval_secs));
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                timer.tick().await;
                if let Err(e) = self.sweep_once().await {
                    warn!("recompute sweep pass failed: {}", e);
                }
            }
        });
    }

    /// One sweep pass: retry every flagged (entity, framework) pair
    ///
    /// Bypasses the coalescing gate — a retry is never a duplicate of
    /// itself — and tolerates individual failures; still-failing pairs keep
    /// their flag and are retried next pass.
    pub async fn sweep_once(&self) -> crate::Result<usize> {
        let pending = db::entities::list_pending_recomputes(&self.db).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        debug!(count = pending.len(), "retrying pending recomputes");
        let mut recovered = 0;
        for (entity_id, framework_id) in pending {
            match self
                .orchestrator
                .recompute_now(entity_id, framework_id, "sweep.retry")
                .await
            {
                Ok(()) => recovered += 1,
                Err(e) => {
                    debug!(%entity_id, %framework_id, "sweep retry still failing: {}", e);
                }
            }
        }

        if recovered > 0 {
            info!(recovered, "recompute sweep recovered flagged pairs");
        }
        Ok(recovered)
    }
}
