//! Errors from the network front ends.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Nothing could listen on `addr`.
    #[error("cannot listen on {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The socket failed after it was bound.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;
