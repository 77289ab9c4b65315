//! Per-second rate aggregation over a window of delta snapshots.

use serde::Serialize;

use crate::network::stats::{CounterSet, DeltaSnapshot};

/// Per-second rates for one track
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateProps {
    pub packets_per_second: f64,
    pub bits_per_second: f64,
    pub packets_lost_per_second: f64,
    /// Lost / received. NaN or infinite when nothing was received.
    pub packet_loss_ratio_per_second: f64,
}

impl RateProps {
    fn from_totals(totals: &CounterSet, window_seconds: f64) -> Self {
        let packets_per_second = totals.packets_received as f64 / window_seconds;
        let packets_lost_per_second = totals.packets_lost as f64 / window_seconds;

        Self {
            packets_per_second,
            bits_per_second: (totals.bytes_received as f64 * 8.0) / window_seconds,
            packets_lost_per_second,
            packet_loss_ratio_per_second: packets_lost_per_second / packets_per_second,
        }
    }

    /// Bandwidth in kbit/s
    pub fn kbps(&self) -> f64 {
        self.bits_per_second / 1000.0
    }
}

/// Audio and video rates for the current window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerSecondStats {
    pub audio: RateProps,
    pub video: RateProps,
    /// Divisor used for the rates, in seconds
    pub window_size: f64,
    /// Set once when a quality test finalizes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_time_ms: Option<u64>,
}

fn accumulate(total: &mut CounterSet, delta: &CounterSet) {
    total.bytes_received = total.bytes_received.saturating_add(delta.bytes_received);
    total.packets_lost = total.packets_lost.saturating_add(delta.packets_lost);
    total.packets_received = total.packets_received.saturating_add(delta.packets_received);
}

/// Sum every snapshot and divide by `window_seconds`.
///
/// Callers must check `window_seconds > 0` first; the window buffer reports
/// zero when it cannot produce a meaningful divisor.
pub fn aggregate<'a, I>(snapshots: I, window_seconds: f64) -> PerSecondStats
where
    I: IntoIterator<Item = &'a DeltaSnapshot>,
{
    let mut audio = CounterSet::default();
    let mut video = CounterSet::default();

    for snapshot in snapshots {
        accumulate(&mut audio, &snapshot.audio);
        accumulate(&mut video, &snapshot.video);
    }

    PerSecondStats {
        audio: RateProps::from_totals(&audio, window_seconds),
        video: RateProps::from_totals(&video, window_seconds),
        window_size: window_seconds,
        elapsed_time_ms: None,
    }
}
