//! Context extensions.
//!
//! Extensions run once per request, after the context is created and before
//! the root router sees it. They attach request helpers (parsed query, typed
//! state) and stage response defaults (headers). A failing extension does not
//! abort the request: its error becomes the pending error the router starts
//! with, so the application's error handlers decide what to answer.

use async_trait::async_trait;
use http::header::HeaderName;
use switchyard_core::{HandlerError, HeaderValue};

use crate::context::RequestContext;

/// Hook that prepares a context before dispatch.
#[async_trait]
pub trait ContextExtension: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Prepares `ctx`.
    async fn extend(&self, ctx: &RequestContext) -> Result<(), HandlerError>;
}

/// Stages `X-Powered-By: Switchyard` unless the `x-powered-by` setting is
/// off.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoweredBy;

const X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

#[async_trait]
impl ContextExtension for PoweredBy {
    fn name(&self) -> &str {
        "powered_by"
    }

    async fn extend(&self, ctx: &RequestContext) -> Result<(), HandlerError> {
        if ctx.settings().x_powered_by {
            ctx.set_header(X_POWERED_BY, HeaderValue::from_static("Switchyard"));
        }
        Ok(())
    }
}
