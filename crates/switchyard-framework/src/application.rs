//! The application: settings, a lazily created root router, context
//! extensions and the final handler.
//!
//! ```ignore
//! let mut app = Application::new();
//! app.disable("x-powered-by")?;
//! app.get("/hello/:name", |ctx: Arc<RequestContext>, next: Next| async move {
//!     let name = ctx.param("name").unwrap_or_default();
//!     ctx.send_text(StatusCode::OK, format!("Hello, {name}!"));
//!     next.end()
//! })?;
//!
//! let response = app.handle(request).await;
//! ```

use std::sync::Arc;

use http::header::{ALLOW, CONTENT_SECURITY_POLICY, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use serde_json::Value;
use switchyard_core::{
    DispatchError, Environment, HandlerError, HeaderValue, HttpRequest, HttpResponse, Method,
    Settings, StatusCode, allow_header,
};
use tracing::{Instrument, debug, debug_span, error, warn};

use crate::context::RequestContext;
use crate::error::FrameworkResult;
use crate::extension::{ContextExtension, PoweredBy};
use crate::handler::{BoxedHandler, ErrorHandler, Handler};
use crate::middleware::{self, QueryParser};
use crate::route::Route;
use crate::router::{DispatchOutcome, Router, RouterOptions};
use crate::service::AppService;

/// Receives errors raised after the response was already sent.
pub trait FaultReporter: Send + Sync + 'static {
    /// Reports one fault.
    fn report(&self, ctx: &RequestContext, error: &HandlerError);
}

impl<F> FaultReporter for F
where
    F: Fn(&RequestContext, &HandlerError) + Send + Sync + 'static,
{
    fn report(&self, ctx: &RequestContext, error: &HandlerError) {
        (self)(ctx, error)
    }
}

fn log_fault(ctx: &RequestContext, error: &HandlerError) {
    error!(
        method = %ctx.method(),
        url = %ctx.original_url(),
        error = %error,
        "Handler failed after the response was sent"
    );
}

fn router_options(settings: &Settings) -> RouterOptions {
    RouterOptions {
        case_sensitive: settings.case_sensitive_routing,
        strict: settings.strict_routing,
        merge_params: settings.merge_params,
    }
}

/// A request-dispatch application.
pub struct Application {
    settings: Arc<Settings>,
    router: Option<Router>,
    extensions: Vec<Arc<dyn ContextExtension>>,
    fault_reporter: Arc<dyn FaultReporter>,
}

macro_rules! method_shortcuts {
    ($($name:ident),* $(,)?) => {
        $(
            #[doc = concat!("Adds a `", stringify!($name), "` route to the root router.")]
            pub fn $name<H: Handler>(&mut self, path: &str, handler: H) -> FrameworkResult<&mut Self> {
                self.router_mut().$name(path, handler)?;
                Ok(self)
            }
        )*
    };
}

impl Application {
    /// Creates an application with default settings.
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    /// Creates an application with `settings`.
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
            router: None,
            extensions: vec![
                Arc::new(QueryParser) as Arc<dyn ContextExtension>,
                Arc::new(PoweredBy),
            ],
            fault_reporter: Arc::new(log_fault),
        }
    }

    /// Creates an application with `settings` and registers the built-in
    /// middleware listed in `settings.middleware`, in order.
    pub fn from_settings(settings: Settings) -> FrameworkResult<Self> {
        let names = settings.middleware.clone();
        let mut app = Self::with_settings(settings);
        for name in &names {
            let handler = middleware::resolve(name)?;
            app.use_boxed("/", handler)?;
        }
        Ok(app)
    }

    // ─── Settings ────────────────────────────────────────────────────────────

    /// Current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Assigns a setting.
    ///
    /// Routing settings are read when the root router is created, at the
    /// first registration; changing them afterwards has no effect on it.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> FrameworkResult<&mut Self> {
        Arc::make_mut(&mut self.settings).set(key, value)?;
        if let Some(router) = &self.router
            && router.router_options() != router_options(&self.settings)
        {
            warn!(key, "Routing setting changed after the router was created; ignored");
        }
        Ok(self)
    }

    /// Reads a setting. (`get` is the GET route shortcut.)
    pub fn setting(&self, key: &str) -> Option<Value> {
        self.settings.get(key)
    }

    /// Sets a setting to `true`.
    pub fn enable(&mut self, key: &str) -> FrameworkResult<&mut Self> {
        self.set(key, true)
    }

    /// Sets a setting to `false`.
    pub fn disable(&mut self, key: &str) -> FrameworkResult<&mut Self> {
        self.set(key, false)
    }

    /// Returns `true` if the setting is truthy.
    pub fn enabled(&self, key: &str) -> bool {
        self.settings.enabled(key)
    }

    /// Returns `true` if the setting is falsy or missing.
    pub fn disabled(&self, key: &str) -> bool {
        self.settings.disabled(key)
    }

    // ─── Collaborators ───────────────────────────────────────────────────────

    /// Adds a context extension. Extensions run in registration order,
    /// after the built-in ones.
    pub fn extend<E: ContextExtension>(&mut self, extension: E) -> &mut Self {
        self.extensions.push(Arc::new(extension));
        self
    }

    /// Replaces the fault reporter.
    pub fn on_fault<R: FaultReporter>(&mut self, reporter: R) -> &mut Self {
        self.fault_reporter = Arc::new(reporter);
        self
    }

    // ─── Registration ────────────────────────────────────────────────────────

    /// The root router, if anything was registered.
    pub fn router(&self) -> Option<&Router> {
        self.router.as_ref()
    }

    /// The root router, created from the current routing settings on first
    /// access.
    pub fn router_mut(&mut self) -> &mut Router {
        let settings = &self.settings;
        self.router.get_or_insert_with(|| {
            debug!(options = ?router_options(settings), "Creating root router");
            Router::with_options(router_options(settings))
        })
    }

    /// Adds middleware to the root router.
    pub fn use_handler<H: Handler>(&mut self, path: &str, handler: H) -> FrameworkResult<&mut Self> {
        self.router_mut().use_handler(path, handler)?;
        Ok(self)
    }

    /// Adds type-erased middleware to the root router.
    pub fn use_boxed(&mut self, path: &str, handler: BoxedHandler) -> FrameworkResult<&mut Self> {
        self.router_mut().use_boxed(path, handler)?;
        Ok(self)
    }

    /// Adds error middleware to the root router.
    pub fn use_error<H: ErrorHandler>(
        &mut self,
        path: &str,
        handler: H,
    ) -> FrameworkResult<&mut Self> {
        self.router_mut().use_error(path, handler)?;
        Ok(self)
    }

    /// Mounts a router under `path`.
    pub fn mount(&mut self, path: &str, router: Router) -> FrameworkResult<&mut Self> {
        self.router_mut().mount(path, router)?;
        Ok(self)
    }

    /// Adds a route to the root router.
    pub fn route(&mut self, path: &str) -> FrameworkResult<&mut Route> {
        self.router_mut().route(path)
    }

    /// Adds a route with a single handler for `method`.
    pub fn method<H: Handler>(
        &mut self,
        method: Method,
        path: &str,
        handler: H,
    ) -> FrameworkResult<&mut Self> {
        self.router_mut().method(method, path, handler)?;
        Ok(self)
    }

    method_shortcuts!(all, get, post, put, delete, patch, head, options);

    // ─── Dispatch ────────────────────────────────────────────────────────────

    /// Creates the context for `request`.
    pub fn context(&self, request: HttpRequest) -> RequestContext {
        RequestContext::new(request, Arc::clone(&self.settings))
    }

    /// Runs the extensions and the root router for `ctx`.
    ///
    /// Returns `Ok` when a response was sent, otherwise how the dispatch
    /// ended. Faults (errors after the response was sent) go to the fault
    /// reporter.
    pub async fn dispatch(&self, ctx: &Arc<RequestContext>) -> Result<(), DispatchError> {
        let mut initial = None;
        for extension in &self.extensions {
            if let Err(err) = extension.extend(ctx).await {
                debug!(extension = extension.name(), error = %err, "Context extension failed");
                initial = Some(err);
                break;
            }
        }

        let outcome = match (&self.router, initial) {
            (Some(router), initial) => router.handle(ctx, initial).await,
            (None, Some(err)) => DispatchOutcome::Failed(err),
            (None, None) => DispatchOutcome::Unhandled,
        };

        if let Some(fault) = ctx.take_fault() {
            self.fault_reporter.report(ctx, &fault);
        }

        match outcome {
            DispatchOutcome::Responded if !ctx.is_sent() => {
                warn!(
                    method = %ctx.method(),
                    url = %ctx.original_url(),
                    "Handler ended the request without sending a response"
                );
                Err(DispatchError::Handler(HandlerError::msg(
                    "request ended without a response",
                )))
            }
            DispatchOutcome::Responded => Ok(()),
            DispatchOutcome::Failed(err) => Err(DispatchError::Handler(err)),
            DispatchOutcome::Unhandled => {
                let allow = ctx.allowed_methods();
                let method = ctx.method().clone();
                let path = ctx.uri().path().to_string();
                if allow.is_empty() {
                    Err(DispatchError::NoMatchingRoute { method, path })
                } else {
                    Err(DispatchError::MethodNotAllowed {
                        method,
                        path,
                        allow,
                    })
                }
            }
        }
    }

    /// Dispatches `request` and returns the response, answering with the
    /// default response when no handler did.
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        let ctx = Arc::new(self.context(request));
        let span = debug_span!("request", method = %ctx.method(), url = %ctx.original_url());

        let result = self.dispatch(&ctx).instrument(span).await;
        if let Err(err) = result {
            self.respond_default(&ctx, err);
        }
        ctx.take_response()
    }

    /// Wraps the application in a `tower::Service`.
    pub fn into_service(self) -> AppService {
        AppService::new(self)
    }

    /// The final handler.
    fn respond_default(&self, ctx: &RequestContext, err: DispatchError) {
        if ctx.is_sent() {
            return;
        }

        let mut status = err.status();
        let body = match &err {
            DispatchError::MethodNotAllowed { allow, .. } => {
                let value = allow_header(allow);
                if let Ok(header) = HeaderValue::from_str(&value) {
                    ctx.set_header(ALLOW, header);
                }
                if *ctx.method() == Method::OPTIONS {
                    status = StatusCode::OK;
                    value
                } else {
                    reason(status)
                }
            }
            DispatchError::NoMatchingRoute { .. } => err.to_string(),
            DispatchError::Handler(handler_err) => {
                if status.is_server_error() && self.settings.env != Environment::Test {
                    error!(status = status.as_u16(), error = %handler_err, "Unhandled error");
                } else {
                    debug!(status = status.as_u16(), error = %handler_err, "Unhandled error");
                }
                if self.settings.exposes_errors() {
                    render_chain(handler_err)
                } else {
                    reason(status)
                }
            }
        };

        ctx.with_response(|response| {
            let headers = response.headers_mut();
            headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
            headers.insert(
                CONTENT_SECURITY_POLICY,
                HeaderValue::from_static("default-src 'none'"),
            );
        });
        if *ctx.method() == Method::HEAD {
            ctx.send(status, "");
        } else {
            ctx.send(status, body);
        }
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("settings", &self.settings)
            .field("router", &self.router)
            .field(
                "extensions",
                &self.extensions.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

fn reason(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("Error").to_string()
}

fn render_chain(err: &HandlerError) -> String {
    let mut lines = err.chain().map(|e| e.to_string());
    let mut out = lines.next().unwrap_or_default();
    for cause in lines {
        out.push_str("\nCaused by: ");
        out.push_str(&cause);
    }
    out
}
