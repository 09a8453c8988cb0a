use crate::models::config::LoggingConfig;
use std::str::FromStr;
use tracing::Level;

/// Configured level, `INFO` when it does not parse
fn parse_level(level: &str) -> Level {
    Level::from_str(level.trim()).unwrap_or(Level::INFO)
}

/// Install the global tracing subscriber
///
/// Later calls are ignored, so tests and re-entry are harmless.
pub fn init_logging(config: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_max_level(parse_level(&config.level))
        .with_target(false);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if result.is_ok() {
        tracing::debug!(level = %config.level, json = config.json, "logging initialized");
    }
}
