//! Error types for the Switchyard framework.

use switchyard_core::SettingsError;
use thiserror::Error;

use crate::path::ParamDecodeError;

/// Errors raised while building an application: invalid patterns,
/// unresolvable middleware names and bad settings.
#[derive(Debug, Error)]
pub enum FrameworkError {
    /// The path pattern is malformed.
    #[error("invalid path pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern as registered.
        pattern: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The pattern compiled to a regular expression the engine rejected,
    /// usually because of a bad `:name(...)` constraint.
    #[error("invalid path pattern '{pattern}': {source}")]
    Regex {
        /// The pattern as registered.
        pattern: String,
        /// The regex compilation error.
        #[source]
        source: regex::Error,
    },

    /// A captured parameter is not valid percent-encoded UTF-8.
    #[error(transparent)]
    ParamDecode(#[from] ParamDecodeError),

    /// The middleware used to ship with the framework but no longer does.
    #[error(
        "Most middleware (like {name}) is no longer bundled with Switchyard and must be installed separately"
    )]
    RemovedMiddleware {
        /// Requested middleware name.
        name: String,
    },

    /// No built-in middleware has this name.
    #[error("unknown middleware '{name}'")]
    UnknownMiddleware {
        /// Requested middleware name.
        name: String,
    },

    /// A setting was assigned an invalid value.
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl FrameworkError {
    /// Creates an invalid pattern error.
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for framework operations.
pub type FrameworkResult<T> = Result<T, FrameworkError>;
