use thiserror::Error;

/// Failures surfaced by a quality test
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The test ended without a single usable window of rates
    #[error("failed to calculate network statistics")]
    NoStatistics,
    #[error("invalid probe configuration: {0}")]
    InvalidConfig(String),
}
