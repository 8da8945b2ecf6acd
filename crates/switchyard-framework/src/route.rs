//! Routes: one path, an ordered list of per-method handlers.

use std::sync::Arc;

use switchyard_core::method::push_unique;
use switchyard_core::{HandlerError, Method, MethodFilter};
use tracing::trace;

use crate::context::RequestContext;
use crate::handler::{ErrorHandler, Handler, HandlerKind, Signal, run_error_handler, run_handler};

/// How a route dispatch ended.
pub(crate) enum RouteExit {
    /// A handler ended the request.
    Responded,
    /// The route ran out of handlers (or a handler skipped the route).
    Declined,
    /// The route ran out of handlers with an error pending.
    Failed(HandlerError),
    /// A handler asked to leave the enclosing router.
    ExitRouter,
}

#[derive(Clone)]
struct RouteEntry {
    method: MethodFilter,
    handler: HandlerKind,
}

/// A path with handlers for individual methods.
///
/// Entries run in registration order; for a given request only the entries
/// whose method filter accepts the request method run. `HEAD` requests use
/// the `GET` entries when the route has no explicit `HEAD` entry.
#[derive(Clone)]
pub struct Route {
    path: String,
    stack: Vec<RouteEntry>,
}

macro_rules! method_shortcuts {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
            #[doc = concat!("Adds a `", stringify!($method), "` handler.")]
            pub fn $name<H: Handler>(&mut self, handler: H) -> &mut Self {
                self.method(Method::$method, handler)
            }
        )*
    };
}

impl Route {
    /// Creates an empty route for `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            stack: Vec::new(),
        }
    }

    /// The path pattern.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Returns `true` if no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Adds a handler for `method`.
    pub fn method<H: Handler>(&mut self, method: impl Into<MethodFilter>, handler: H) -> &mut Self {
        self.stack.push(RouteEntry {
            method: method.into(),
            handler: HandlerKind::Normal(Arc::new(handler)),
        });
        self
    }

    /// Adds a handler for every method.
    pub fn all<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.method(MethodFilter::All, handler)
    }

    /// Adds an error handler that catches failures of the handlers
    /// registered before it.
    pub fn error<H: ErrorHandler>(&mut self, handler: H) -> &mut Self {
        self.stack.push(RouteEntry {
            method: MethodFilter::All,
            handler: HandlerKind::Error(Arc::new(handler)),
        });
        self
    }

    method_shortcuts! {
        get => GET,
        post => POST,
        put => PUT,
        delete => DELETE,
        patch => PATCH,
        head => HEAD,
        options => OPTIONS,
    }

    fn has_normal_entry(&self, filter: impl Fn(&MethodFilter) -> bool) -> bool {
        self.stack
            .iter()
            .any(|e| !e.handler.is_error_handler() && filter(&e.method))
    }

    fn has_method(&self, method: &Method) -> bool {
        self.has_normal_entry(|m| m.method() == Some(method))
    }

    /// Returns `true` if a request with `method` reaches at least one
    /// handler of this route.
    pub fn handles_method(&self, method: &Method) -> bool {
        if self.has_normal_entry(|m| *m == MethodFilter::All) {
            return true;
        }
        if *method == Method::HEAD && !self.has_method(&Method::HEAD) {
            return self.has_method(&Method::GET);
        }
        self.has_method(method)
    }

    /// Methods with a dedicated handler, in registration order. `HEAD` is
    /// listed when `GET` is.
    pub fn methods(&self) -> Vec<Method> {
        let mut methods = Vec::new();
        for entry in &self.stack {
            if let (false, Some(method)) = (entry.handler.is_error_handler(), entry.method.method())
            {
                push_unique(&mut methods, method.clone());
            }
        }
        if methods.contains(&Method::GET) {
            push_unique(&mut methods, Method::HEAD);
        }
        methods
    }

    /// Runs the matching handlers for the request.
    pub(crate) async fn dispatch(&self, ctx: &Arc<RequestContext>) -> RouteExit {
        let method = match ctx.method() {
            m if *m == Method::HEAD && !self.has_method(&Method::HEAD) => Method::GET,
            m => m.clone(),
        };
        ctx.set_route(Some(self.path.clone()));

        let mut pending: Option<HandlerError> = None;
        for (index, entry) in self.stack.iter().enumerate() {
            if ctx.is_sent() {
                return RouteExit::Responded;
            }
            if !entry.method.matches(&method) {
                continue;
            }

            let signal = match (&entry.handler, pending.take()) {
                (HandlerKind::Normal(handler), None) => run_handler(handler, ctx).await,
                (HandlerKind::Error(handler), Some(err)) => {
                    run_error_handler(handler, err, ctx).await
                }
                // not eligible in the current mode
                (_, err) => {
                    pending = err;
                    continue;
                }
            };
            trace!(route = %self.path, index, "Route handler finished");

            match signal {
                Signal::Continue => {}
                Signal::Fail(err) if ctx.is_sent() => {
                    ctx.report_fault(err);
                    return RouteExit::Responded;
                }
                Signal::Fail(err) => pending = Some(err),
                Signal::SkipRoute => return RouteExit::Declined,
                Signal::ExitRouter => return RouteExit::ExitRouter,
                Signal::End => return RouteExit::Responded,
            }
        }

        if ctx.is_sent() {
            return RouteExit::Responded;
        }
        match pending {
            Some(err) => RouteExit::Failed(err),
            None => RouteExit::Declined,
        }
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("methods", &self.methods())
            .field("handlers", &self.stack.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Next;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use switchyard_core::{Settings, StatusCode};

    fn ctx(method: Method) -> Arc<RequestContext> {
        let request = http::Request::builder()
            .method(method)
            .uri("/items")
            .body(Bytes::new())
            .unwrap();
        Arc::new(RequestContext::new(request, Arc::new(Settings::default())))
    }

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> impl Handler {
        let log = Arc::clone(log);
        move |_ctx: Arc<RequestContext>, next: Next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(name);
                next.pass()
            }
        }
    }

    #[test]
    fn test_methods_and_head_fallback() {
        let mut route = Route::new("/items");
        route.get(|_ctx: Arc<RequestContext>, next: Next| async move { next.end() });
        route.post(|_ctx: Arc<RequestContext>, next: Next| async move { next.end() });

        assert_eq!(route.methods(), vec![Method::GET, Method::POST, Method::HEAD]);
        assert!(route.handles_method(&Method::HEAD));
        assert!(!route.handles_method(&Method::DELETE));
    }

    #[test]
    fn test_all_handles_everything() {
        let mut route = Route::new("/items");
        route.all(|_ctx: Arc<RequestContext>, next: Next| async move { next.pass() });
        assert!(route.handles_method(&Method::PATCH));
        assert!(route.methods().is_empty());
    }

    #[tokio::test]
    async fn test_only_matching_methods_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut route = Route::new("/items");
        route
            .get(recorder(&log, "get-1"))
            .post(recorder(&log, "post"))
            .all(recorder(&log, "all"))
            .get(recorder(&log, "get-2"));

        let exit = route.dispatch(&ctx(Method::GET)).await;
        assert!(matches!(exit, RouteExit::Declined));
        assert_eq!(*log.lock(), vec!["get-1", "all", "get-2"]);
    }

    #[tokio::test]
    async fn test_head_runs_get_handlers() {
        let mut route = Route::new("/items");
        route.get(|ctx: Arc<RequestContext>, next: Next| async move {
            ctx.send_text(StatusCode::OK, "items");
            next.end()
        });
        let ctx = ctx(Method::HEAD);
        assert!(matches!(route.dispatch(&ctx).await, RouteExit::Responded));
        assert!(ctx.is_sent());
    }

    #[tokio::test]
    async fn test_route_error_handler_recovers() {
        let mut route = Route::new("/items");
        route
            .get(|_ctx: Arc<RequestContext>, next: Next| async move {
                next.fail(HandlerError::msg("no items"))
            })
            .error(
                |err: HandlerError, ctx: Arc<RequestContext>, next: Next| async move {
                    ctx.send_text(StatusCode::OK, format!("recovered: {err}"));
                    next.end()
                },
            );

        let ctx = ctx(Method::GET);
        assert!(matches!(route.dispatch(&ctx).await, RouteExit::Responded));
        assert_eq!(ctx.take_response().body(), &Bytes::from("recovered: no items"));
    }

    #[tokio::test]
    async fn test_failure_skips_normal_handlers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut route = Route::new("/items");
        route
            .get(|_ctx: Arc<RequestContext>, next: Next| async move {
                next.fail(HandlerError::msg("broken"))
            })
            .get(recorder(&log, "skipped"));

        match route.dispatch(&ctx(Method::GET)).await {
            RouteExit::Failed(err) => assert_eq!(err.to_string(), "broken"),
            _ => panic!("expected failure"),
        }
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_skip_route() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut route = Route::new("/items");
        route
            .get(|_ctx: Arc<RequestContext>, next: Next| async move { next.skip_route() })
            .get(recorder(&log, "skipped"));

        assert!(matches!(
            route.dispatch(&ctx(Method::GET)).await,
            RouteExit::Declined
        ));
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_sets_route_path() {
        let mut route = Route::new("/items");
        route.get(|ctx: Arc<RequestContext>, next: Next| async move {
            let seen = ctx.route_path().unwrap_or_default();
            ctx.send_text(StatusCode::OK, seen);
            next.end()
        });
        let ctx = ctx(Method::GET);
        route.dispatch(&ctx).await;
        assert_eq!(ctx.take_response().body(), &Bytes::from("/items"));
    }
}
