//! Recompute coalescing gate
//!
//! One business event can surface as more than one bus event (a task status
//! change and its completion, a document batch upload). The gate keys on
//! `(entity_id, framework_id)` and skips recompute requests that arrive
//! inside a short window after the previous one for the same pair.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;

/// Coalesces redundant recompute requests per (entity, framework)
pub struct RecomputeGate {
    window: Duration,
    recent: Mutex<HashMap<(Uuid, Uuid), Instant>>,
}

impl RecomputeGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            recent: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a recompute for this pair should run now
    ///
    /// Records the request when it passes, so the next request inside the
    /// window is coalesced. A zero window disables coalescing entirely.
    pub fn should_run(&self, entity_id: Uuid, framework_id: Uuid) -> bool {
        let mut recent = self.recent.lock().expect("gate mutex poisoned");
        let now = Instant::now();
        recent.retain(|_, at| now.duration_since(*at) < self.window);

        if recent.contains_key(&(entity_id, framework_id)) {
            return false;
        }
        recent.insert((entity_id, framework_id), now);
        true
    }

    /// Record a recompute that ran outside the gated path
    ///
    /// The synchronous assignment cascade always recomputes; registering it
    /// here lets the gate absorb the bus echoes that may follow.
    pub fn touch(&self, entity_id: Uuid, framework_id: Uuid) {
        let mut recent = self.recent.lock().expect("gate mutex poisoned");
        recent.insert((entity_id, framework_id), Instant::now());
    }
}
