use anyhow::{bail, Result};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::LogConfig;

/// Environment variable holding a filter directive that replaces the configured level.
pub const LOG_ENV: &str = "PR_IMPACT_LOG";

/// Installs the global subscriber, writing to stderr.
///
/// ## Parameters:
/// * `config` (`&LogConfig`): Level and output format,
/// * `debug` (`bool`): Forces the `debug` level, ignoring both config and environment.
pub fn init_logging(config: &LogConfig, debug: bool) -> Result<()> {
    let level = if debug {
        Level::DEBUG
    } else {
        parse_log_level(&config.level)?
    };
    let filter = if debug {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level.as_str()))
    };

    let registry = Registry::default().with(filter);
    if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr).with_target(true))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()?;
    }
    Ok(())
}

pub fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => bail!("invalid log level `{level}`, expected trace, debug, info, warn or error"),
    }
}
