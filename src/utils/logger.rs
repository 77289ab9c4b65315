use env_logger::Env;

/// Install env_logger. `RUST_LOG` wins over the configured default level.
pub fn init(default_level: &str) {
    // Only fails when a logger is already installed (e.g. by a test harness); the first one stays
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .try_init()
        .ok();
}
