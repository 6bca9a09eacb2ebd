//! Compliance engine collaborator
//!
//! The scoring algorithm lives in a separate service. The cascade only needs
//! a side-effect-only call: "recompute and persist the score for this
//! (entity, framework) pair". The trait seam keeps the orchestrator testable
//! with recording/failing doubles.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Errors from a compliance engine call
#[derive(Error, Debug)]
pub enum EngineError {
    /// Call exceeded the configured deadline
    #[error("engine call timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },

    /// Transport-level failure (connection refused, DNS, TLS, ...)
    #[error("engine transport error: {0}")]
    Http(String),

    /// Engine answered but refused the request
    #[error("engine rejected request with status {status}")]
    Rejected { status: u16 },
}

impl EngineError {
    /// Whether a retry sweep should attempt this call again
    ///
    /// Timeouts and transport failures are transient; an explicit rejection
    /// means the request itself is wrong and retrying would loop forever.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Timeout { .. } | EngineError::Http(_) => true,
            EngineError::Rejected { .. } => false,
        }
    }
}

/// External compliance scoring collaborator
#[async_trait]
pub trait ComplianceEngine: Send + Sync {
    /// Recompute and persist the compliance score for (entity, framework)
    async fn check_entity_compliance(
        &self,
        entity_id: Uuid,
        framework_id: Uuid,
    ) -> std::result::Result<(), EngineError>;
}

/// HTTP client for the scoring service
pub struct HttpComplianceEngine {
    client: reqwest::Client,
    base_url: String,
}

impl HttpComplianceEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ComplianceEngine for HttpComplianceEngine {
    async fn check_entity_compliance(
        &self,
        entity_id: Uuid,
        framework_id: Uuid,
    ) -> std::result::Result<(), EngineError> {
        let url = format!("{}/api/v1/compliance/check", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "entity_id": entity_id,
                "framework_id": framework_id,
            }))
            .send()
            .await
            .map_err(|e| EngineError::Http(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(EngineError::Rejected {
                status: response.status().as_u16(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(EngineError::Timeout { elapsed_ms: 5000 }.is_retryable());
        assert!(EngineError::Http("connection refused".into()).is_retryable());
        assert!(!EngineError::Rejected { status: 422 }.is_retryable());
    }
}
