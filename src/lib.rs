//! custodia - lifecycle manager for a relational store
//!
//! Snapshots, integrity verification, validated restore, health scoring,
//! and calendar-driven backup jobs over an abstract store handle.

pub mod cli;
pub mod config;
pub mod context;
pub mod health;
pub mod observability;
pub mod restore;
pub mod scheduler;
pub mod snapshot;
pub mod store;
pub mod verify;
