//! # Switchyard Framework
//!
//! The request-dispatch engine: path matching, routers, routes, the
//! continuation protocol between handlers, and the [`Application`] that ties
//! them to a settings table and a final handler.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         Application                           │
//! │   settings · context extensions · final handler · faults      │
//! ├───────────────────────────────────────────────────────────────┤
//! │                         root Router                           │
//! │   Layer(PathMatcher, Handler | ErrorHandler | Route | Router) │
//! ├───────────────────────────────────────────────────────────────┤
//! │           Route (per-method handlers)  ·  mounted Router      │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Handlers
//!
//! Handlers are async closures taking the shared [`RequestContext`] and a
//! [`Next`] token; the token is consumed to produce the [`Flow`] the handler
//! returns:
//!
//! ```ignore
//! app.use_handler("/", |ctx: Arc<RequestContext>, next: Next| async move {
//!     tracing::info!(path = %ctx.path(), "request");
//!     next.pass()
//! })?;
//! ```

pub mod application;
pub mod context;
pub mod error;
pub mod extension;
pub mod handler;
pub mod layer;
pub mod middleware;
pub mod path;
pub mod route;
pub mod router;
pub mod service;

pub use application::{Application, FaultReporter};
pub use context::RequestContext;
pub use error::{FrameworkError, FrameworkResult};
pub use extension::{ContextExtension, PoweredBy};
pub use handler::{
    BoxFuture, BoxedErrorHandler, BoxedHandler, ErrorHandler, Flow, Handler, HandlerKind, Next,
};
pub use layer::{Layer, LayerTarget};
pub use middleware::{Query, QueryParser};
pub use path::{MatchOptions, MatchStrategy, ParamDecodeError, PathMatch, PathMatcher, match_path};
pub use route::Route;
pub use router::{DispatchOutcome, Router, RouterOptions};
pub use service::AppService;
