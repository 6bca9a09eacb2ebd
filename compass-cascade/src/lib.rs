//! # Compass Cascade Service (compass-cascade)
//!
//! Compliance propagation orchestrator for the Compass platform.
//!
//! **Purpose:** React to domain events (framework assigned, task completed,
//! document uploaded/deleted, audit gap closed) by cascading the derived
//! writes — control assignment sync, task instantiation, compliance score
//! recompute — without duplicating work when the same business event fires
//! more than once.
//!
//! **Architecture:** One canonical trigger path per event type. Framework
//! assignment runs synchronously from the producer and returns its errors;
//! every other event travels over the broadcast EventBus and is handled
//! best-effort by the dispatcher. A recompute gate coalesces redundant
//! recompute requests per (entity, framework), and a periodic sweep retries
//! recomputes that failed.

pub mod api;
pub mod cascade;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod sweep;

pub use cascade::CascadeOrchestrator;
pub use error::{Error, Result};
