//! Structured logging setup.
//!
//! The crate itself only emits `tracing` events. Binaries, demos and tests
//! that want to see them call [`init_logging`] once at startup.

use crate::config::LoggingConfig;
use crate::error::{ModelError, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Install a global fmt subscriber configured from `config`.
///
/// `RUST_LOG` takes precedence over the configured level. Returns an error
/// if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string().to_lowercase()));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| ModelError::ConfigError(format!("Failed to install logger: {e}")))?;
    tracing::info!(app = %config.app_name, level = %config.log_level, "Logging initialized");
    Ok(())
}
