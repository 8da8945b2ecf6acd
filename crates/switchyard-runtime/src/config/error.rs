//! Errors raised while loading or checking a [`SwitchyardConfig`].
//!
//! [`SwitchyardConfig`]: super::SwitchyardConfig

use std::path::PathBuf;

use switchyard_framework::FrameworkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("config file {} does not exist", .0.display())]
    NotFound(PathBuf),

    /// The extension names a format this build cannot read.
    #[error("cannot read .{0} config files (format unknown or feature disabled)")]
    UnknownFormat(String),

    #[error(transparent)]
    Extract(#[from] figment::Error),

    /// A key holds a value the server cannot run with.
    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: String, reason: String },

    /// A key that must be set is empty.
    #[error("`{key}` must be set")]
    Missing { key: String },

    /// An entry of `app.middleware` does not name a built-in middleware.
    #[error("app.middleware entry {name:?} rejected")]
    Middleware {
        name: String,
        #[source]
        source: FrameworkError,
    },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn missing(key: impl Into<String>) -> Self {
        Self::Missing { key: key.into() }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
