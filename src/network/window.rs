//! Sliding window of delta snapshots, pruned by sample age.

use std::collections::VecDeque;

use crate::network::stats::{DeltaSnapshot, TimestampMs};

/// Time-bounded window of delta snapshots (oldest first)
#[derive(Debug, Default)]
pub struct SlidingWindowBuffer {
    snapshots: VecDeque<DeltaSnapshot>,
}

impl SlidingWindowBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, snapshot: DeltaSnapshot) {
        self.snapshots.push_back(snapshot);
    }

    /// Drop every snapshot stamped before `now_ms - window_size_ms`
    pub fn prune(&mut self, now_ms: TimestampMs, window_size_ms: u64) {
        let cutoff = now_ms.saturating_sub(window_size_ms);
        // Samples may arrive out of order, so this can't stop at the first keeper
        self.snapshots.retain(|s| s.timestamp >= cutoff);
    }

    /// Seconds between the oldest and newest retained sample.
    /// Zero means there is not enough data to compute rates yet.
    pub fn effective_window_seconds(&self) -> f64 {
        if self.snapshots.len() < 2 {
            return 0.0;
        }
        let min = self.snapshots.iter().map(|s| s.timestamp).min().unwrap_or(0);
        let max = self.snapshots.iter().map(|s| s.timestamp).max().unwrap_or(0);
        (max - min) as f64 / 1000.0
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &DeltaSnapshot> {
        self.snapshots.iter()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
