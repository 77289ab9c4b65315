//! quality-probe
//!
//! Samples cumulative counters from a media subscription, turns them into
//! per-second rates over a sliding window, and rates the connection from
//! Bad to Excellent.

pub mod config;
pub mod error;
pub mod network;
pub mod utils;

pub use config::structs::ProbeConfig;
pub use error::ProbeError;
pub use network::classifier::{classify, QualityRating, StreamMetadata, VideoDimensions};
pub use network::probe::{perform_quality_test, LiveReport, ProbeHandle, QualityProbe, QualityReport};
pub use network::source::Subscriber;
pub use network::stats::{CounterSet, CumulativeStats};
