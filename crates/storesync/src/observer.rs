//! Hooks for observing what the dispatcher drops or fails on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::dispatcher::DropReason;
use crate::error::StoreError;

/// Receives dispatch events that are otherwise invisible to callers.
///
/// Both methods default to no-ops. They run on the dispatching thread.
pub trait DispatchObserver: Send + Sync {
    fn on_dropped(&self, _reason: &DropReason) {}

    fn on_store_failure(&self, _stream: &str, _error: &StoreError) {}
}

/// Counts store failures per stream and dropped messages overall.
#[derive(Debug, Default)]
pub struct FailureCounter {
    failures: RwLock<HashMap<String, u64>>,
    dropped: AtomicU64,
}

impl FailureCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store failures recorded for `stream`.
    pub fn count(&self, stream: &str) -> u64 {
        self.failures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(stream)
            .copied()
            .unwrap_or(0)
    }

    /// Store failures across all streams.
    pub fn total(&self) -> u64 {
        self.failures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl DispatchObserver for FailureCounter {
    fn on_dropped(&self, _reason: &DropReason) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn on_store_failure(&self, stream: &str, _error: &StoreError) {
        let mut failures = self.failures.write().unwrap_or_else(PoisonError::into_inner);
        *failures.entry(stream.to_string()).or_insert(0) += 1;
    }
}
