//! Observability for custodia
//!
//! Structured, synchronous JSON logging. Every subsystem in the lifecycle
//! manager (snapshot, restore, health, scheduler) emits one-line events
//! through the [`Logger`] so an external alerting collaborator can consume
//! them without parsing free-form text.

mod logger;

pub use logger::{Logger, Severity};
