//! Concurrency gate bounding in-flight fetches
//!
//! The gate is a counting semaphore. A permit is held only for the duration
//! of one network call and released when the returned [`GatePermit`] drops,
//! so every acquire is matched by exactly one release on all paths.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A slot in the gate, released on drop
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

/// Counting semaphore sized from configuration
///
/// Waiters are woken in FIFO order, so no task starves.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    name: &'static str,
    limit: usize,
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyGate {
    /// Creates a gate admitting `limit` concurrent holders (at least one)
    pub fn new(name: &'static str, limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            name,
            limit,
            semaphore: Arc::new(Semaphore::new(limit)),
        }
    }

    /// Waits for a free slot without blocking the thread
    ///
    /// Returns `None` only if the underlying semaphore was closed.
    pub async fn acquire(&self) -> Option<GatePermit> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;
        tracing::trace!(
            "{} gate: acquired slot ({} of {} free)",
            self.name,
            self.semaphore.available_permits(),
            self.limit
        );
        Some(GatePermit { _permit: permit })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of slots currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
