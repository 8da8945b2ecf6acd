//! Names of middleware that used to be bundled and must now be installed
//! separately.

/// Middleware names that resolve to [`FrameworkError::RemovedMiddleware`].
///
/// [`FrameworkError::RemovedMiddleware`]: crate::FrameworkError::RemovedMiddleware
pub const REMOVED_MIDDLEWARE: &[&str] = &[
    "bodyParser",
    "compress",
    "cookieSession",
    "session",
    "logger",
    "cookieParser",
    "favicon",
    "responseTime",
    "errorHandler",
    "timeout",
    "methodOverride",
    "vhost",
    "csrf",
    "directory",
    "limit",
    "multipart",
    "staticCache",
];

/// Returns `true` if `name` is a formerly bundled middleware.
pub fn is_removed(name: &str) -> bool {
    REMOVED_MIDDLEWARE.contains(&name)
}
