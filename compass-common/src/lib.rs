//! # Compass Common Library
//!
//! Shared code for the Compass compliance platform services including:
//! - Database schema and initialization
//! - Domain model types (statuses, priorities, framework categories)
//! - Event types (ComplianceEvent enum) and the EventBus
//! - Common error type

pub mod db;
pub mod error;
pub mod events;
pub mod model;

pub use error::{Error, Result};
