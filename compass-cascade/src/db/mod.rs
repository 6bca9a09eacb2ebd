//! Database accessors for the cascade service
//!
//! Row-level reads and writes the orchestrator depends on. Identifiers are
//! stored as hyphenated TEXT uuids; accessors parse them back into `Uuid`.

pub mod assignments;
pub mod audit_gaps;
pub mod controls;
pub mod documents;
pub mod entities;
pub mod frameworks;
pub mod tasks;

use crate::{Error, Result};
use uuid::Uuid;

/// Parse a TEXT uuid column
pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("malformed uuid '{}': {}", s, e)))
}
