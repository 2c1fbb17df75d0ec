//! Batch scheduler
//!
//! Work items are split into fixed-size batches. Batches run strictly one
//! after another; the items of one batch run concurrently and are multiplexed
//! on the current task. Results keep submission order regardless of the order
//! in which items complete.

use futures::future::join_all;
use std::future::Future;

/// Split of `len` items into batches of at most `batch_size`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    len: usize,
    batch_size: usize,
}

impl BatchPlan {
    /// Creates a plan; a zero batch size is treated as one
    pub fn new(len: usize, batch_size: usize) -> Self {
        Self {
            len,
            batch_size: batch_size.max(1),
        }
    }

    /// Number of batches, `ceil(len / batch_size)`
    pub fn count(&self) -> usize {
        self.len.div_ceil(self.batch_size)
    }

    /// Size of every batch, in scheduling order
    pub fn sizes(&self) -> Vec<usize> {
        (0..self.count())
            .map(|index| {
                let start = index * self.batch_size;
                (self.len - start).min(self.batch_size)
            })
            .collect()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Results of a batched run
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome<T> {
    /// Present results in submission order
    pub results: Vec<T>,

    /// Batches that were run
    pub batches: usize,

    /// Items whose task yielded nothing
    pub dropped: usize,
}

/// Runs `task` over `items` batch by batch
///
/// Tasks yielding `None` are dropped from the results; they are never
/// re-submitted. `label` only appears in progress lines.
///
/// # Arguments
///
/// * `items` - Work items, in submission order
/// * `batch_size` - Maximum number of concurrently driven tasks
/// * `label` - Stage name for progress logging
/// * `task` - Builds the future for one item
pub async fn run_batched<I, T, F, Fut>(
    items: Vec<I>,
    batch_size: usize,
    label: &str,
    mut task: F,
) -> BatchOutcome<T>
where
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let plan = BatchPlan::new(items.len(), batch_size);
    let total_batches = plan.count();
    let mut results = Vec::with_capacity(items.len());
    let mut dropped = 0;

    tracing::debug!(
        "Scheduling {} {} items in {} batches of up to {}",
        items.len(),
        label,
        total_batches,
        plan.batch_size()
    );

    let mut remaining = items.into_iter();
    for (index, size) in plan.sizes().into_iter().enumerate() {
        let batch: Vec<Fut> = remaining.by_ref().take(size).map(&mut task).collect();

        for result in join_all(batch).await {
            match result {
                Some(value) => results.push(value),
                None => dropped += 1,
            }
        }

        tracing::info!(
            "Processed {} batch {}/{}",
            label,
            index + 1,
            total_batches
        );
    }

    BatchOutcome {
        results,
        batches: total_batches,
        dropped,
    }
}
