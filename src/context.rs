//! Lifecycle context
//!
//! One explicitly constructed value holding the store handle and the typed
//! configuration. Every component constructor receives this context (shared
//! via `Arc`); there is no ambient singleton anywhere in the crate, so the
//! dependency graph is visible at the call sites.

use std::path::Path;

use crate::config::LifecycleConfig;
use crate::store::StoreHandle;

/// Shared state for all lifecycle components.
#[derive(Debug)]
pub struct LifecycleContext<S: StoreHandle> {
    pub store: S,
    pub config: LifecycleConfig,
}

impl<S: StoreHandle> LifecycleContext<S> {
    /// Build a context from an opened store handle and loaded config.
    pub fn new(store: S, config: LifecycleConfig) -> Self {
        Self { store, config }
    }

    /// Path of the live store file.
    pub fn live_path(&self) -> &Path {
        &self.config.db_path
    }
}
