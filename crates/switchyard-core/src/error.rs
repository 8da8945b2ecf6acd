//! Error types shared by every layer of the engine.
//!
//! [`HandlerError`] is what application code hands to a continuation when it
//! fails a request. It wraps any `std::error::Error` (so `?`-style conversion
//! works through the blanket `From`) and may carry the HTTP status the
//! terminal handler should use. [`DispatchError`] describes how a dispatch
//! ended when no handler produced a response.

use std::any::Any;
use std::fmt;

use http::{Method, StatusCode};
use thiserror::Error;

/// A boxed, thread-safe error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An error raised by a handler, either returned through `Next::fail` or
/// produced by a panic inside the handler.
///
/// Does not implement `std::error::Error`; the blanket `From<E: Error>`
/// conversion depends on that.
pub struct HandlerError {
    status: Option<StatusCode>,
    inner: BoxError,
}

impl HandlerError {
    /// Wraps an arbitrary error.
    pub fn new<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self {
            status: None,
            inner: error.into(),
        }
    }

    /// Creates an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(message.into())
    }

    /// Creates an error carrying an HTTP status.
    pub fn with_code(status: StatusCode, message: impl Into<String>) -> Self {
        Self::msg(message).with_status(status)
    }

    /// Converts a panic payload caught around a handler.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::msg(format!("handler panicked: {detail}"))
    }

    /// Attaches the HTTP status the terminal handler should answer with.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns the status attached to this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Returns the attached status when it is a valid error status
    /// (4xx or 5xx), otherwise `500 Internal Server Error`.
    pub fn response_status(&self) -> StatusCode {
        match self.status {
            Some(status) if status.is_client_error() || status.is_server_error() => status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Borrows the wrapped error.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.inner
    }

    /// Unwraps into the boxed error.
    pub fn into_inner(self) -> BoxError {
        self.inner
    }

    /// Attempts to downcast the wrapped error.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    /// Iterates the wrapped error followed by its `source()` chain.
    pub fn chain(&self) -> impl Iterator<Item = &(dyn std::error::Error + 'static)> {
        let first: &(dyn std::error::Error + 'static) = &*self.inner;
        std::iter::successors(Some(first), |e| e.source())
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("status", &self.status)
            .field("inner", &self.inner)
            .finish()
    }
}

/// How a dispatch ended without a handler producing a response.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The stack was exhausted with no error in flight.
    #[error("Cannot {method} {path}")]
    NoMatchingRoute {
        /// Request method.
        method: Method,
        /// Request path.
        path: String,
    },

    /// A route matched the path but none of its handlers accept the method.
    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        /// Request method.
        method: Method,
        /// Request path.
        path: String,
        /// Methods the matching routes do accept.
        allow: Vec<Method>,
    },

    /// A handler error reached the end of the stack unhandled.
    #[error("{0}")]
    Handler(HandlerError),
}

impl DispatchError {
    /// The status the terminal handler answers with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoMatchingRoute { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Handler(err) => err.response_status(),
        }
    }
}

impl From<HandlerError> for DispatchError {
    fn from(error: HandlerError) -> Self {
        Self::Handler(error)
    }
}
