//! Built-in middleware, addressable by name.
//!
//! Only `query` ships with the framework. Names of middleware that used to be
//! bundled resolve to a descriptive error instead of "unknown".

mod query;
mod removed;

pub use query::{Query, QueryParser, query};
pub use removed::{REMOVED_MIDDLEWARE, is_removed};

use crate::error::{FrameworkError, FrameworkResult};
use crate::handler::BoxedHandler;

/// Resolves a built-in middleware by name.
pub fn resolve(name: &str) -> FrameworkResult<BoxedHandler> {
    match name {
        "query" => Ok(query()),
        removed if is_removed(removed) => Err(FrameworkError::RemovedMiddleware {
            name: removed.to_string(),
        }),
        unknown => Err(FrameworkError::UnknownMiddleware {
            name: unknown.to_string(),
        }),
    }
}
