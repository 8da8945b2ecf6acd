//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while starting or running the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The application could not be built from its settings.
    #[error("Application error: {0}")]
    Framework(#[from] switchyard_framework::FrameworkError),

    /// The server could not be started.
    #[error("Transport error: {0}")]
    Transport(#[from] switchyard_transport::TransportError),

    /// Signal handler registration failed.
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
