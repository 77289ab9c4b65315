use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log filter, overridden by RUST_LOG
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Quality test timing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Delay between stats polls (ms)
    pub polling_interval_ms: u64,
    /// Span of the sliding rate window (ms)
    pub window_size_ms: u64,
    /// Hard cap on test duration (ms)
    pub test_timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            polling_interval_ms: 500,
            window_size_ms: 2000,
            test_timeout_ms: 15000,
        }
    }
}

impl ProbeConfig {
    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.polling_interval_ms == 0 {
            return Err(ProbeError::InvalidConfig("polling_interval_ms must be > 0".into()));
        }
        if self.window_size_ms == 0 {
            return Err(ProbeError::InvalidConfig("window_size_ms must be > 0".into()));
        }
        if self.test_timeout_ms == 0 {
            return Err(ProbeError::InvalidConfig("test_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}
