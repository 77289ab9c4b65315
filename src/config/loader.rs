use super::structs::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use log::{info, warn};

pub const CONFIG_PATH: &str = "/etc/quality-probe/config.toml";

/// Read and parse a config file without logging.
/// `Ok(None)` means the file does not exist.
pub fn read_config(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(Some(config))
}

/// Log the outcome of `read_config` and fall back to defaults
pub fn resolve_config(path: &Path, loaded: Result<Option<Config>>) -> Config {
    match loaded {
        Ok(Some(config)) => {
            info!("Loaded configuration from {}", path.display());
            config
        }
        Ok(None) => {
            info!("No config file found at {}. Using defaults.", path.display());
            Config::default()
        }
        Err(e) => {
            warn!("{:#}. Using defaults.", e);
            Config::default()
        }
    }
}

/// Load the system-wide config, falling back to defaults
pub fn load_config() -> Config {
    load_config_from(Path::new(CONFIG_PATH))
}

pub fn load_config_from(path: &Path) -> Config {
    resolve_config(path, read_config(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::structs::ProbeConfig;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(read_config(&path).unwrap().is_none());

        let config = load_config_from(&path);
        assert_eq!(config.probe, ProbeConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[probe]\nwindow_size_ms = 3000\n\n[logging]\nlevel = \"debug\"").unwrap();

        let config = load_config_from(file.path());
        assert_eq!(config.probe.window_size_ms, 3000);
        assert_eq!(config.probe.polling_interval_ms, 500);
        assert_eq!(config.probe.test_timeout_ms, 15000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_garbage_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "probe = [[[").unwrap();

        let err = read_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"), "got: {}", err);

        let config = resolve_config(file.path(), Err(err));
        assert_eq!(config.probe, ProbeConfig::default());
    }

    #[test]
    fn test_unreadable_path_reports_read_error() {
        // A directory exists but cannot be read as a file
        let dir = tempfile::tempdir().unwrap();
        let err = read_config(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"), "got: {}", err);
    }
}
