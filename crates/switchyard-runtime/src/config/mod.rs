//! Configuration module for the Switchyard runtime.
//!
//! Layered loading (defaults, files, environment) of the server, logging and
//! application settings, plus validation.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, ServerConfig, SpanEventConfig,
    SwitchyardConfig,
};
pub use validation::validate_config;
