//! Checks run on a loaded configuration before the runtime starts.

use switchyard_core::Settings;
use switchyard_framework::middleware;

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, ServerConfig, SwitchyardConfig};

/// Checks the server, logging and app sections in that order.
pub fn validate_config(config: &SwitchyardConfig) -> ConfigResult<()> {
    validate_server_config(&config.server)?;
    validate_logging_config(&config.logging)?;
    validate_app_settings(&config.app)?;
    Ok(())
}

fn validate_server_config(server: &ServerConfig) -> ConfigResult<()> {
    if server.host.trim().is_empty() {
        return Err(ConfigError::missing("server.host"));
    }

    if server.max_body_bytes == 0 {
        return Err(ConfigError::invalid(
            "server.max_body_bytes",
            "must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing("logging.file_path"));
    }

    if let Some(target) = logging.filters.keys().find(|t| t.trim().is_empty()) {
        return Err(ConfigError::invalid(
            "logging.filters",
            format!("empty target {target:?}"),
        ));
    }

    Ok(())
}

/// Every named middleware must resolve to a bundled one.
fn validate_app_settings(app: &Settings) -> ConfigResult<()> {
    for name in &app.middleware {
        middleware::resolve(name).map_err(|source| ConfigError::Middleware {
            name: name.clone(),
            source,
        })?;
    }
    Ok(())
}
