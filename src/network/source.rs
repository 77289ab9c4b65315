//! Subscriber boundary
//!
//! The probe only needs two things from a media subscription: its stream
//! metadata and an async poll for cumulative counters. Two subscribers ship
//! with the crate: a trace replayer and a synthetic generator.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use tokio::time::Instant;

use crate::network::classifier::StreamMetadata;
use crate::network::stats::{CounterSet, CumulativeStats};

/// An active media subscription the probe can poll
#[async_trait]
pub trait Subscriber: Send {
    /// Stream description used by the classifier
    fn stream(&self) -> StreamMetadata;

    /// Fetch cumulative counters.
    /// `Ok(None)` and `Err(_)` both mean no more data is coming.
    async fn get_stats(&mut self) -> Result<Option<CumulativeStats>>;
}

/// Serves pre-recorded samples in order, then reports exhaustion
pub struct ReplaySubscriber {
    stream: StreamMetadata,
    samples: VecDeque<CumulativeStats>,
}

impl ReplaySubscriber {
    pub fn new(stream: StreamMetadata, samples: impl IntoIterator<Item = CumulativeStats>) -> Self {
        Self {
            stream,
            samples: samples.into_iter().collect(),
        }
    }

    /// Parse a JSON-lines trace, one `CumulativeStats` object per line.
    /// Blank lines and lines starting with `#` are skipped.
    pub fn parse_trace(content: &str) -> Result<Vec<CumulativeStats>> {
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with('#')
            })
            .map(|(idx, line)| {
                serde_json::from_str(line).with_context(|| format!("Invalid sample on line {}", idx + 1))
            })
            .collect()
    }

    pub fn from_trace_file(stream: StreamMetadata, path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read trace {}", path.display()))?;
        let samples = Self::parse_trace(&content)?;
        info!("Loaded {} samples from {}", samples.len(), path.display());
        Ok(Self::new(stream, samples))
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

#[async_trait]
impl Subscriber for ReplaySubscriber {
    fn stream(&self) -> StreamMetadata {
        self.stream
    }

    async fn get_stats(&mut self) -> Result<Option<CumulativeStats>> {
        Ok(self.samples.pop_front())
    }
}

/// Steady traffic profile for one track
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackProfile {
    pub kbps: f64,
    pub packets_per_second: f64,
    /// Fraction of packets reported lost (0.0-1.0)
    pub loss_ratio: f64,
}

/// Generates monotonically increasing counters from fixed rates
pub struct SyntheticSubscriber {
    stream: StreamMetadata,
    audio: TrackProfile,
    video: TrackProfile,
    base_ms: u64,
    started: Instant,
    max_samples: Option<usize>,
    emitted: usize,
}

impl SyntheticSubscriber {
    pub fn new(stream: StreamMetadata, audio: TrackProfile, video: TrackProfile) -> Self {
        Self {
            stream,
            audio,
            video,
            base_ms: chrono::Utc::now().timestamp_millis().max(0) as u64,
            started: Instant::now(),
            max_samples: None,
            emitted: 0,
        }
    }

    /// Stop answering after `n` samples
    pub fn with_max_samples(mut self, n: usize) -> Self {
        self.max_samples = Some(n);
        self
    }

    fn counters(profile: &TrackProfile, secs: f64) -> CounterSet {
        let packets = profile.packets_per_second * secs;
        CounterSet {
            bytes_received: (profile.kbps * 1000.0 / 8.0 * secs) as u64,
            packets_lost: (packets * profile.loss_ratio) as u64,
            packets_received: packets as u64,
        }
    }
}

#[async_trait]
impl Subscriber for SyntheticSubscriber {
    fn stream(&self) -> StreamMetadata {
        self.stream
    }

    async fn get_stats(&mut self) -> Result<Option<CumulativeStats>> {
        if self.max_samples.is_some_and(|max| self.emitted >= max) {
            debug!("Synthetic subscriber exhausted after {} samples", self.emitted);
            return Ok(None);
        }
        self.emitted += 1;

        let elapsed = self.started.elapsed();
        let secs = elapsed.as_secs_f64();

        Ok(Some(CumulativeStats {
            audio: Self::counters(&self.audio, secs),
            video: Self::counters(&self.video, secs),
            timestamp: self.base_ms + elapsed.as_millis() as u64,
        }))
    }
}
