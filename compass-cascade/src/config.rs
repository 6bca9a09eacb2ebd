//! Cascade service configuration
//!
//! Tunables live in the settings table and are loaded at startup; an
//! optional TOML file supplies the values `main` needs before the database
//! is open (port, database path, engine URL).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use compass_common::model::FrameworkCategory;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{Error, Result};

/// Derived-task content for one framework category
///
/// Looked up by the framework's explicit `category` column; display names
/// never influence task content.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskBlueprint {
    pub title_prefix: String,
    pub category: String,
    pub estimated_hours: f64,
}

/// Cascade configuration
#[derive(Debug, Clone)]
pub struct CascadeConfig {
    /// Deadline for one compliance engine call (default: 5000 ms)
    pub engine_timeout_ms: u64,

    /// Coalescing window for redundant recompute requests (default: 2000 ms)
    pub recompute_debounce_ms: u64,

    /// Interval of the pending-recompute retry sweep (default: 60 s)
    pub sweep_interval_secs: u64,

    /// Enable the retry sweep (default: true)
    pub sweep_enabled: bool,

    /// Instantiated tasks fall due this many days after assignment
    pub task_due_days: i64,

    /// Task content per framework category
    pub blueprints: HashMap<FrameworkCategory, TaskBlueprint>,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            engine_timeout_ms: 5000,
            recompute_debounce_ms: 2000,
            sweep_interval_secs: 60,
            sweep_enabled: true,
            task_due_days: 7,
            blueprints: default_blueprints(),
        }
    }
}

impl CascadeConfig {
    /// Load cascade configuration from database settings
    ///
    /// Missing or unparseable settings fall back to defaults.
    pub async fn from_database(pool: &SqlitePool) -> Self {
        let mut config = Self::default();

        if let Some(v) = read_setting(pool, "engine_timeout_ms").await {
            if let Ok(ms) = v.parse::<u64>() {
                config.engine_timeout_ms = ms;
            }
        }

        if let Some(v) = read_setting(pool, "recompute_debounce_ms").await {
            if let Ok(ms) = v.parse::<u64>() {
                config.recompute_debounce_ms = ms;
            }
        }

        if let Some(v) = read_setting(pool, "sweep_interval_secs").await {
            if let Ok(secs) = v.parse::<u64>() {
                config.sweep_interval_secs = secs;
            }
        }

        if let Some(v) = read_setting(pool, "sweep_enabled").await {
            config.sweep_enabled = v.to_lowercase() == "true";
        }

        config
    }

    /// Blueprint for a framework category, falling back to the general one
    pub fn blueprint_for(&self, category: FrameworkCategory) -> &TaskBlueprint {
        self.blueprints
            .get(&category)
            .or_else(|| self.blueprints.get(&FrameworkCategory::General))
            .expect("general blueprint always present")
    }
}

async fn read_setting(pool: &SqlitePool, key: &str) -> Option<String> {
    sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .ok()
        .flatten()
}

fn default_blueprints() -> HashMap<FrameworkCategory, TaskBlueprint> {
    let mut map = HashMap::new();
    map.insert(
        FrameworkCategory::DataPrivacy,
        TaskBlueprint {
            title_prefix: "Data Privacy: ".into(),
            category: "data_privacy".into(),
            estimated_hours: 8.0,
        },
    );
    map.insert(
        FrameworkCategory::InfoSec,
        TaskBlueprint {
            title_prefix: "Security Review: ".into(),
            category: "information_security".into(),
            estimated_hours: 12.0,
        },
    );
    map.insert(
        FrameworkCategory::Healthcare,
        TaskBlueprint {
            title_prefix: "Safeguard: ".into(),
            category: "healthcare_privacy".into(),
            estimated_hours: 10.0,
        },
    );
    map.insert(
        FrameworkCategory::ServiceTrust,
        TaskBlueprint {
            title_prefix: "Trust Criteria: ".into(),
            category: "service_trust".into(),
            estimated_hours: 10.0,
        },
    );
    map.insert(
        FrameworkCategory::Financial,
        TaskBlueprint {
            title_prefix: "Audit Prep: ".into(),
            category: "financial_controls".into(),
            estimated_hours: 16.0,
        },
    );
    map.insert(
        FrameworkCategory::General,
        TaskBlueprint {
            title_prefix: "Compliance: ".into(),
            category: "general".into(),
            estimated_hours: 6.0,
        },
    );
    map
}

/// Startup configuration read from an optional TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub db_path: Option<PathBuf>,
    pub engine_url: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid config {}: {}", path.display(), e)))
    }
}
