//! # Switchyard
//!
//! An ordered-stack HTTP request-dispatch engine: applications are stacks of
//! path-matched layers, each holding a handler, an error handler, a
//! per-method route or a whole mounted router.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐     ┌─────────────┐     ┌─────────────────────────────────────┐
//! │ Transport │────▶│ Application │────▶│ Router: Layer → Layer → Layer → ... │
//! │  (axum)   │     │  settings   │     │   handler · route · mounted router  │
//! └───────────┘     └─────────────┘     └─────────────────────────────────────┘
//!                          │ nobody answered
//!                          ▼
//!                    final handler (404 / 405 / 500)
//! ```
//!
//! - **Layers** run in registration order; a prefix layer strips its matched
//!   prefix for everything below it.
//! - **Handlers** receive the shared [`RequestContext`](prelude::RequestContext)
//!   and a [`Next`](prelude::Next) token and either answer or pass on.
//! - **Errors** switch dispatch into error mode, where only error handlers run
//!   until one of them recovers.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use switchyard::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = SwitchyardRuntime::new();
//!     let mut app = runtime.application()?;
//!
//!     app.get("/hello/:name", |ctx: Arc<RequestContext>, next: Next| async move {
//!         let name = ctx.param("name").unwrap_or_default();
//!         ctx.send_text(StatusCode::OK, format!("hello {name}"));
//!         next.end()
//!     })?;
//!
//!     runtime.run(app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use switchyard_core as core;
pub use switchyard_framework as framework;
pub use switchyard_runtime as runtime;
pub use switchyard_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use switchyard::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use switchyard_runtime::{SwitchyardConfig, SwitchyardRuntime};

    // Building applications
    pub use switchyard_framework::{Application, Route, Router, RouterOptions};

    // Writing handlers
    pub use switchyard_core::{HandlerError, Params, Settings};
    pub use switchyard_framework::{Flow, Next, Query, RequestContext};

    // HTTP vocabulary
    pub use switchyard_core::http::header;
    pub use switchyard_core::{Bytes, HeaderValue, Method, StatusCode};

    // Serving without the runtime
    pub use switchyard_transport::{HttpServer, HttpServerConfig};

    pub use std::sync::Arc;
}
