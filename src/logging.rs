//! Logging setup
//!
//! Structured logging through `tracing`, written to stderr so that stdout
//! carries only command output. `RUST_LOG` takes precedence over the
//! configured level.

use crate::config::LoggingConfig;
use anyhow::Result;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Resolve the default log level; `--verbose` forces debug
pub fn default_level(config: &LoggingConfig, verbose: bool) -> Level {
    if verbose {
        return Level::DEBUG;
    }
    config.level.to_lowercase().parse().unwrap_or(Level::INFO)
}

/// Build the filter from `RUST_LOG`, falling back to `level`
pub fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Install the global subscriber
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = env_filter(default_level(config, verbose));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.format.to_lowercase().as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.compact().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}
