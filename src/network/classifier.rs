//! Connection quality classifier
//!
//! Maps window rates plus stream metadata to a five-level rating. Video
//! streams use a bandwidth breakpoint table keyed by resolution and frame
//! rate; audio-only streams use a fixed pair of thresholds.

use serde::Serialize;
use std::fmt;

use crate::network::rates::PerSecondStats;

/// Discrete connection quality, ordered worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum QualityRating {
    Bad = 1,
    Poor = 2,
    Fair = 3,
    Good = 4,
    Excellent = 5,
}

impl QualityRating {
    /// Numeric score (1-5)
    pub fn score(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for QualityRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QualityRating::Bad => "Bad",
            QualityRating::Poor => "Poor",
            QualityRating::Fair => "Fair",
            QualityRating::Good => "Good",
            QualityRating::Excellent => "Excellent",
        };
        write!(f, "{} ({}/5)", name, self.score())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VideoDimensions {
    pub width: u32,
    pub height: u32,
}

/// Subscriber stream description, read-only
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMetadata {
    pub has_audio: bool,
    pub has_video: bool,
    pub frame_rate: Option<f64>,
    pub video_dimensions: Option<VideoDimensions>,
}

/// Supported test resolutions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// 1280x720
    High,
    /// 640x480
    Medium,
    /// 320x240
    Low,
}

impl Resolution {
    pub fn from_dimensions(dimensions: VideoDimensions) -> Option<Self> {
        match (dimensions.width, dimensions.height) {
            (1280, 720) => Some(Resolution::High),
            (640, 480) => Some(Resolution::Medium),
            (320, 240) => Some(Resolution::Low),
            _ => None,
        }
    }
}

/// Nominal frame rates with their own breakpoint tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRateTier {
    Fps30,
    Fps15,
    Fps7,
}

impl FrameRateTier {
    /// Exact match only. An absent (or zero) frame rate counts as 30.
    pub fn from_fps(fps: Option<f64>) -> Option<Self> {
        match fps {
            None => Some(FrameRateTier::Fps30),
            Some(f) if f == 0.0 || f == 30.0 => Some(FrameRateTier::Fps30),
            Some(f) if f == 15.0 => Some(FrameRateTier::Fps15),
            Some(f) if f == 7.0 => Some(FrameRateTier::Fps7),
            Some(_) => None,
        }
    }
}

/// Increasing bandwidth breakpoints in kbps: `[b0, b1, b2, b3]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoints(pub [f64; 4]);

impl Breakpoints {
    /// Table lookup. High resolution falls back to the 30fps table for
    /// unknown frame rates; Medium and Low have no fallback.
    pub fn lookup(resolution: Resolution, frame_rate: Option<f64>) -> Option<Self> {
        use FrameRateTier::*;
        use Resolution::*;

        let tier = match (resolution, FrameRateTier::from_fps(frame_rate)) {
            (_, Some(tier)) => tier,
            (High, None) => Fps30,
            (Medium | Low, None) => return None,
        };

        let table = match (resolution, tier) {
            (High, Fps30) => [250.0, 350.0, 600.0, 1000.0],
            (High, Fps15) => [150.0, 250.0, 350.0, 800.0],
            (High, Fps7) => [120.0, 150.0, 250.0, 400.0],
            (Medium, Fps30) => [120.0, 150.0, 250.0, 600.0],
            (Medium, Fps15) => [75.0, 120.0, 150.0, 400.0],
            (Medium, Fps7) => [50.0, 75.0, 120.0, 200.0],
            (Low, Fps30) => [100.0, 120.0, 200.0, 300.0],
            (Low, Fps15) => [100.0, 120.0, 150.0, 200.0],
            (Low, Fps7) => [50.0, 75.0, 100.0, 150.0],
        };
        Some(Breakpoints(table))
    }
}

const LOSS_LOW: f64 = 0.02;
const LOSS_HIGH: f64 = 0.1;

/// One step of the ladder: predicate over (breakpoints, kbps, loss ratio)
struct Rung {
    matches: fn(&[f64; 4], f64, f64) -> bool,
    rating: QualityRating,
}

/// Evaluated top to bottom, first match wins. Several rungs overlap, so
/// the order is significant.
const VIDEO_LADDER: [Rung; 6] = [
    Rung {
        matches: |b, bw, loss| bw > b[3] && loss < LOSS_HIGH,
        rating: QualityRating::Excellent,
    },
    Rung {
        matches: |b, bw, loss| bw > b[2] && bw <= b[3] && loss < LOSS_LOW,
        rating: QualityRating::Good,
    },
    Rung {
        matches: |b, bw, loss| bw > b[2] && bw <= b[3] && loss >= LOSS_LOW && loss < LOSS_HIGH,
        rating: QualityRating::Fair,
    },
    Rung {
        matches: |b, bw, loss| bw > b[1] && bw <= b[2] && loss < LOSS_HIGH,
        rating: QualityRating::Fair,
    },
    Rung {
        matches: |b, bw, loss| bw > b[0] && loss >= LOSS_HIGH,
        rating: QualityRating::Poor,
    },
    Rung {
        matches: |b, bw, loss| bw > b[0] && bw <= b[1] && loss < LOSS_HIGH,
        rating: QualityRating::Poor,
    },
];

// Audio thresholds are compared on a different scale than video (0.5 and 5
// against a fractional ratio). Kept as-is until confirmed with product.
const AUDIO_EXCELLENT_KBPS: f64 = 30.0;
const AUDIO_EXCELLENT_LOSS: f64 = 0.5;
const AUDIO_GOOD_KBPS: f64 = 25.0;
const AUDIO_GOOD_LOSS: f64 = 5.0;

/// No throughput means no evidence of a healthy link: treat NaN as total loss
fn normalize_loss(ratio: f64) -> f64 {
    if ratio.is_nan() {
        f64::INFINITY
    } else {
        ratio
    }
}

/// Rate a video stream against its breakpoint table
pub fn classify_video(kbps: f64, loss_ratio: f64, breakpoints: &Breakpoints) -> QualityRating {
    let loss = normalize_loss(loss_ratio);
    VIDEO_LADDER
        .iter()
        .find(|rung| (rung.matches)(&breakpoints.0, kbps, loss))
        .map(|rung| rung.rating)
        .unwrap_or(QualityRating::Bad)
}

/// Rate an audio-only stream
pub fn classify_audio(kbps: f64, loss_ratio: f64) -> QualityRating {
    let loss = normalize_loss(loss_ratio);
    if kbps > AUDIO_EXCELLENT_KBPS && loss < AUDIO_EXCELLENT_LOSS {
        QualityRating::Excellent
    } else if kbps > AUDIO_GOOD_KBPS && loss < AUDIO_GOOD_LOSS {
        QualityRating::Good
    } else {
        QualityRating::Bad
    }
}

/// Classify the current window. Total: anything unsupported rates as Bad.
pub fn classify(rates: &PerSecondStats, metadata: &StreamMetadata) -> QualityRating {
    if !metadata.has_video {
        return classify_audio(rates.audio.kbps(), rates.audio.packet_loss_ratio_per_second);
    }

    let breakpoints = metadata
        .video_dimensions
        .and_then(Resolution::from_dimensions)
        .and_then(|res| Breakpoints::lookup(res, metadata.frame_rate));

    match breakpoints {
        Some(bp) => classify_video(rates.video.kbps(), rates.video.packet_loss_ratio_per_second, &bp),
        None => QualityRating::Bad,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::rates::RateProps;

    fn video_meta(width: u32, height: u32, frame_rate: Option<f64>) -> StreamMetadata {
        StreamMetadata {
            has_audio: true,
            has_video: true,
            frame_rate,
            video_dimensions: Some(VideoDimensions { width, height }),
        }
    }

    fn audio_meta() -> StreamMetadata {
        StreamMetadata {
            has_audio: true,
            has_video: false,
            frame_rate: None,
            video_dimensions: None,
        }
    }

    fn rates(audio_bps: f64, audio_loss: f64, video_bps: f64, video_loss: f64) -> PerSecondStats {
        PerSecondStats {
            audio: RateProps {
                bits_per_second: audio_bps,
                packet_loss_ratio_per_second: audio_loss,
                ..Default::default()
            },
            video: RateProps {
                bits_per_second: video_bps,
                packet_loss_ratio_per_second: video_loss,
                ..Default::default()
            },
            window_size: 2.0,
            elapsed_time_ms: None,
        }
    }

    #[test]
    fn test_high_resolution_excellent() {
        let meta = video_meta(1280, 720, Some(30.0));
        assert_eq!(classify(&rates(0.0, 0.0, 1_200_000.0, 0.01), &meta), QualityRating::Excellent);
    }

    #[test]
    fn test_heavy_loss_ranks_poor_above_b0_and_bad_below() {
        let meta = video_meta(1280, 720, Some(30.0));
        // 500 kbps clears b0 (250), so the loss rung yields Poor rather than Bad
        assert_eq!(classify(&rates(0.0, 0.0, 500_000.0, 0.15), &meta), QualityRating::Poor);
        assert_eq!(classify(&rates(0.0, 0.0, 2_000_000.0, 0.15), &meta), QualityRating::Poor);
        assert_eq!(classify(&rates(0.0, 0.0, 200_000.0, 0.15), &meta), QualityRating::Bad);
    }

    #[test]
    fn test_ladder_walk_high_30() {
        let bp = Breakpoints::lookup(Resolution::High, Some(30.0)).unwrap();
        assert_eq!(classify_video(1000.1, 0.05, &bp), QualityRating::Excellent);
        assert_eq!(classify_video(1000.0, 0.01, &bp), QualityRating::Good);
        assert_eq!(classify_video(800.0, 0.02, &bp), QualityRating::Fair);
        assert_eq!(classify_video(800.0, 0.09, &bp), QualityRating::Fair);
        assert_eq!(classify_video(600.0, 0.0, &bp), QualityRating::Fair);
        assert_eq!(classify_video(351.0, 0.05, &bp), QualityRating::Fair);
        assert_eq!(classify_video(350.0, 0.05, &bp), QualityRating::Poor);
        assert_eq!(classify_video(251.0, 0.0, &bp), QualityRating::Poor);
        assert_eq!(classify_video(250.0, 0.0, &bp), QualityRating::Bad);
        assert_eq!(classify_video(10.0, 0.0, &bp), QualityRating::Bad);
    }

    #[test]
    fn test_loss_gate_is_inclusive_at_ten_percent() {
        let bp = Breakpoints::lookup(Resolution::High, Some(30.0)).unwrap();
        // Exactly 0.1 already counts as heavy loss in every bandwidth tier
        assert_eq!(classify_video(1200.0, 0.1, &bp), QualityRating::Poor);
        assert_eq!(classify_video(800.0, 0.1, &bp), QualityRating::Poor);
        assert_eq!(classify_video(500.0, 0.1, &bp), QualityRating::Poor);
        assert_eq!(classify_video(300.0, 0.1, &bp), QualityRating::Poor);
        assert_eq!(classify_video(250.0, 0.1, &bp), QualityRating::Bad);
        assert_eq!(classify_video(200.0, 0.1, &bp), QualityRating::Bad);

        // Just under the gate stays in the bandwidth tiers
        assert_eq!(classify_video(1200.0, 0.099, &bp), QualityRating::Excellent);
        assert_eq!(classify_video(800.0, 0.099, &bp), QualityRating::Fair);
        assert_eq!(classify_video(300.0, 0.099, &bp), QualityRating::Poor);
        assert_eq!(classify_video(200.0, 0.099, &bp), QualityRating::Bad);
    }

    #[test]
    fn test_breakpoint_table() {
        use FrameRateTier::*;
        let expect = [
            (Resolution::High, Some(15.0), [150.0, 250.0, 350.0, 800.0]),
            (Resolution::High, Some(7.0), [120.0, 150.0, 250.0, 400.0]),
            (Resolution::Medium, Some(30.0), [120.0, 150.0, 250.0, 600.0]),
            (Resolution::Medium, Some(15.0), [75.0, 120.0, 150.0, 400.0]),
            (Resolution::Medium, Some(7.0), [50.0, 75.0, 120.0, 200.0]),
            (Resolution::Low, Some(30.0), [100.0, 120.0, 200.0, 300.0]),
            (Resolution::Low, Some(15.0), [100.0, 120.0, 150.0, 200.0]),
            (Resolution::Low, Some(7.0), [50.0, 75.0, 100.0, 150.0]),
        ];
        for (res, fps, table) in expect {
            assert_eq!(Breakpoints::lookup(res, fps), Some(Breakpoints(table)), "{:?} @ {:?}", res, fps);
        }
        assert_eq!(FrameRateTier::from_fps(Some(15.0)), Some(Fps15));
        assert_eq!(FrameRateTier::from_fps(Some(24.0)), None);
    }

    #[test]
    fn test_unknown_frame_rate_asymmetry() {
        // High falls back to 30fps, Medium/Low do not
        let high = video_meta(1280, 720, Some(24.0));
        assert_eq!(classify(&rates(0.0, 0.0, 1_200_000.0, 0.0), &high), QualityRating::Excellent);

        let medium = video_meta(640, 480, Some(24.0));
        assert_eq!(classify(&rates(0.0, 0.0, 5_000_000.0, 0.0), &medium), QualityRating::Bad);

        let low = video_meta(320, 240, Some(60.0));
        assert_eq!(classify(&rates(0.0, 0.0, 5_000_000.0, 0.0), &low), QualityRating::Bad);
    }

    #[test]
    fn test_missing_frame_rate_uses_30fps_table() {
        let medium = video_meta(640, 480, None);
        assert_eq!(classify(&rates(0.0, 0.0, 700_000.0, 0.0), &medium), QualityRating::Excellent);
        assert_eq!(classify(&rates(0.0, 0.0, 500_000.0, 0.0), &medium), QualityRating::Good);
    }

    #[test]
    fn test_unsupported_resolution_is_bad() {
        let meta = video_meta(1920, 1080, Some(30.0));
        assert_eq!(classify(&rates(0.0, 0.0, 9_000_000.0, 0.0), &meta), QualityRating::Bad);

        let no_dims = StreamMetadata {
            video_dimensions: None,
            ..video_meta(1280, 720, Some(30.0))
        };
        assert_eq!(classify(&rates(0.0, 0.0, 9_000_000.0, 0.0), &no_dims), QualityRating::Bad);
    }

    #[test]
    fn test_non_numeric_loss_is_worst_case() {
        let meta = video_meta(1280, 720, Some(30.0));
        assert_eq!(classify(&rates(0.0, 0.0, 2_000_000.0, f64::NAN), &meta), QualityRating::Poor);
        assert_eq!(classify(&rates(0.0, 0.0, 0.0, f64::NAN), &meta), QualityRating::Bad);
        assert_eq!(classify(&rates(0.0, 0.0, 2_000_000.0, f64::INFINITY), &meta), QualityRating::Poor);
        assert_eq!(classify(&rates(40_000.0, f64::NAN, 0.0, 0.0), &audio_meta()), QualityRating::Bad);
    }

    #[test]
    fn test_audio_only() {
        let meta = audio_meta();
        assert_eq!(classify(&rates(35_000.0, 0.1, 0.0, 0.0), &meta), QualityRating::Excellent);
        assert_eq!(classify(&rates(35_000.0, 0.6, 0.0, 0.0), &meta), QualityRating::Good);
        assert_eq!(classify(&rates(28_000.0, 4.9, 0.0, 0.0), &meta), QualityRating::Good);
        assert_eq!(classify(&rates(28_000.0, 5.0, 0.0, 0.0), &meta), QualityRating::Bad);
        assert_eq!(classify(&rates(25_000.0, 0.0, 0.0, 0.0), &meta), QualityRating::Bad);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let meta = video_meta(640, 480, Some(15.0));
        let window = rates(30_000.0, 0.0, 180_000.0, 0.03);
        let first = classify(&window, &meta);
        assert_eq!(first, classify(&window, &meta));
        assert_eq!(first, QualityRating::Fair);
    }

    #[test]
    fn test_rating_order_and_display() {
        assert!(QualityRating::Excellent > QualityRating::Good);
        assert!(QualityRating::Poor > QualityRating::Bad);
        assert_eq!(QualityRating::Fair.score(), 3);
        assert_eq!(QualityRating::Good.to_string(), "Good (4/5)");
    }
}
