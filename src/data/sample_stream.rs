//! Live sample buffer shared by the producer and both background workers.
//!
//! The stream itself is unbounded; the cleanup worker keeps it near the
//! configured window size. Samples are kept in insertion order, oldest first.

use crate::core::Sample;
use parking_lot::RwLock;
use std::collections::VecDeque;

/// Thread-safe FIFO of live samples.
///
/// Readers taking a snapshot only hold the read lock, so snapshots from the
/// spectrum worker do not serialize against each other. A snapshot is a copy
/// of the buffer at one instant; samples pushed afterwards are not reflected.
#[derive(Debug, Default)]
pub struct SampleStream {
    samples: RwLock<VecDeque<Sample>>,
}

impl SampleStream {
    /// Creates an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a stream with room for `capacity` samples before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Appends a sample. Never blocks on capacity.
    pub fn push(&self, sample: Sample) {
        self.samples.write().push_back(sample);
    }

    /// Removes and returns the oldest sample.
    pub fn pop_front(&self) -> Option<Sample> {
        self.samples.write().pop_front()
    }

    /// Number of live samples.
    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }

    /// Returns up to `n` of the newest samples, most recent first, without
    /// removing them.
    pub fn snapshot_recent(&self, n: usize) -> Vec<Sample> {
        let samples = self.samples.read();
        samples.iter().rev().take(n).copied().collect()
    }

    /// The newest sample, if any.
    pub fn latest(&self) -> Option<Sample> {
        self.samples.read().back().copied()
    }

    /// Drops every live sample.
    pub fn clear(&self) {
        self.samples.write().clear();
    }
}
