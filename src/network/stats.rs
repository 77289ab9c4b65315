//! Media Subscription Statistics
//!
//! Cumulative byte/packet counters as reported by a subscriber, and the
//! tracker that turns them into per-poll deltas.

use log::debug;
use serde::{Deserialize, Serialize};

/// Timestamp in milliseconds
pub type TimestampMs = u64;

/// Byte and packet counters for a single track
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CounterSet {
    pub bytes_received: u64,
    pub packets_lost: u64,
    pub packets_received: u64,
}

impl CounterSet {
    pub fn new(bytes_received: u64, packets_lost: u64, packets_received: u64) -> Self {
        Self {
            bytes_received,
            packets_lost,
            packets_received,
        }
    }

    /// Field-wise `self - last`, floored at zero.
    /// Returns the delta and whether any field regressed.
    fn delta_since(&self, last: &CounterSet) -> (CounterSet, bool) {
        let regressed = self.bytes_received < last.bytes_received
            || self.packets_lost < last.packets_lost
            || self.packets_received < last.packets_received;

        let delta = CounterSet {
            bytes_received: self.bytes_received.saturating_sub(last.bytes_received),
            packets_lost: self.packets_lost.saturating_sub(last.packets_lost),
            packets_received: self.packets_received.saturating_sub(last.packets_received),
        };
        (delta, regressed)
    }
}

/// One raw poll result: counters since subscription start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeStats {
    #[serde(default)]
    pub audio: CounterSet,
    #[serde(default)]
    pub video: CounterSet,
    pub timestamp: TimestampMs,
}

/// Activity since the previous poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaSnapshot {
    pub audio: CounterSet,
    pub video: CounterSet,
    pub timestamp: TimestampMs,
}

/// Remembers the last cumulative counters per track.
/// Starts from zero, so the first delta equals the first cumulative sample.
#[derive(Debug, Default)]
pub struct CounterDeltaTracker {
    last_audio: CounterSet,
    last_video: CounterSet,
}

impl CounterDeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the delta against the last sample and remember `current`
    pub fn compute_delta(&mut self, current: &CumulativeStats) -> DeltaSnapshot {
        let (audio, audio_regressed) = current.audio.delta_since(&self.last_audio);
        let (video, video_regressed) = current.video.delta_since(&self.last_video);

        if audio_regressed || video_regressed {
            debug!(
                "Counter regression at {} (audio: {}, video: {}), clamping to 0",
                current.timestamp, audio_regressed, video_regressed
            );
        }

        self.last_audio = current.audio;
        self.last_video = current.video;

        DeltaSnapshot {
            audio,
            video,
            timestamp: current.timestamp,
        }
    }
}
