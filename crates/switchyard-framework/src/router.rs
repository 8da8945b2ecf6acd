//! The router and its dispatch loop.
//!
//! A [`Router`] is an ordered stack of [`Layer`]s. Dispatching a request
//! walks the stack once, front to back:
//!
//! - In **normal mode** (no error pending) middleware, routes and mounted
//!   routers are eligible; error handlers are skipped.
//! - In **error mode** only error handlers are eligible. A handler that
//!   passes clears the error and the walk continues in normal mode.
//!
//! Before a layer runs, the router scopes `params` to that layer and, for
//! prefix layers, rewrites `base_url`/`path` so the layer sees paths relative
//! to its mount point. Both are restored before the next layer is evaluated
//! and when the router returns to its parent.
//!
//! A router that runs out of layers returns control to its caller: the
//! parent router continues after the mount, the application runs its final
//! handler.

use std::sync::Arc;

use switchyard_core::{HandlerError, Method};
use tracing::{debug, trace};

use crate::context::{RequestContext, RoutingState};
use crate::error::FrameworkResult;
use crate::handler::{
    BoxFuture, BoxedHandler, ErrorHandler, Handler, Signal, run_error_handler, run_handler,
};
use crate::layer::{Delegation, Invocation, Layer, LayerTarget, Outcome};
use crate::path::{MatchOptions, MatchStrategy, PathMatch, PathMatcher};
use crate::route::{Route, RouteExit};

/// Matching options shared by every layer of a router.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterOptions {
    /// Compare literal path text case-sensitively.
    pub case_sensitive: bool,
    /// Treat a trailing slash as significant.
    pub strict: bool,
    /// Expose the parent router's params to this router's layers.
    pub merge_params: bool,
}

impl RouterOptions {
    /// Sets case sensitivity.
    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    /// Sets strict trailing-slash handling.
    pub fn strict(mut self, yes: bool) -> Self {
        self.strict = yes;
        self
    }

    /// Sets param merging.
    pub fn merge_params(mut self, yes: bool) -> Self {
        self.merge_params = yes;
        self
    }
}

/// How a router dispatch ended.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// A handler ended the request or a response was sent.
    Responded,
    /// The stack was exhausted (or a handler left the router) without a
    /// response and without an error.
    Unhandled,
    /// The stack was exhausted with an error pending.
    Failed(HandlerError),
}

/// What the loop does after a layer finished.
enum Step {
    Next,
    Stop(DispatchOutcome),
}

/// An ordered stack of middleware, routes and mounted routers.
#[derive(Clone, Default)]
pub struct Router {
    stack: Vec<Layer>,
    options: RouterOptions,
}

macro_rules! method_shortcuts {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
            #[doc = concat!("Adds a `", stringify!($method), "` route.")]
            pub fn $name<H: Handler>(&mut self, path: &str, handler: H) -> FrameworkResult<&mut Self> {
                self.method(Method::$method, path, handler)
            }
        )*
    };
}

impl Router {
    /// Creates an empty router with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty router.
    pub fn with_options(options: RouterOptions) -> Self {
        Self {
            stack: Vec::new(),
            options,
        }
    }

    /// The router's options. (`options` is the OPTIONS route shortcut.)
    pub fn router_options(&self) -> RouterOptions {
        self.options
    }

    /// The layers, in registration order.
    pub fn layers(&self) -> &[Layer] {
        &self.stack
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    fn compile(&self, path: &str, strategy: MatchStrategy) -> FrameworkResult<PathMatcher> {
        let options = MatchOptions {
            strategy,
            case_sensitive: self.options.case_sensitive,
            strict: self.options.strict,
        };
        PathMatcher::compile(path, options)
    }

    fn push(
        &mut self,
        path: &str,
        strategy: MatchStrategy,
        target: LayerTarget,
    ) -> FrameworkResult<&mut Self> {
        let matcher = self.compile(path, strategy)?;
        let layer = Layer::new(matcher, target);
        debug!(path, kind = layer.kind(), index = self.stack.len(), "Registered layer");
        self.stack.push(layer);
        Ok(self)
    }

    /// Adds middleware that runs for every request under `path`.
    pub fn use_handler<H: Handler>(&mut self, path: &str, handler: H) -> FrameworkResult<&mut Self> {
        self.use_boxed(path, Arc::new(handler))
    }

    /// Adds type-erased middleware.
    pub fn use_boxed(&mut self, path: &str, handler: BoxedHandler) -> FrameworkResult<&mut Self> {
        self.push(path, MatchStrategy::Prefix, LayerTarget::Handler(handler))
    }

    /// Adds error middleware for requests under `path`.
    pub fn use_error<H: ErrorHandler>(
        &mut self,
        path: &str,
        handler: H,
    ) -> FrameworkResult<&mut Self> {
        self.push(
            path,
            MatchStrategy::Prefix,
            LayerTarget::ErrorHandler(Arc::new(handler)),
        )
    }

    /// Mounts `router` under `path`. The mounted router sees paths relative
    /// to `path`.
    pub fn mount(&mut self, path: &str, router: Router) -> FrameworkResult<&mut Self> {
        self.push(path, MatchStrategy::Nested, LayerTarget::Router(Arc::new(router)))
    }

    /// Adds a route for `path` and returns it for method registration.
    ///
    /// Every call creates a new route, even for a path registered before.
    pub fn route(&mut self, path: &str) -> FrameworkResult<&mut Route> {
        let matcher = self.compile(path, MatchStrategy::Exact)?;
        debug!(path, index = self.stack.len(), "Registered route");
        self.stack.push(Layer::new(
            matcher,
            LayerTarget::Route(Arc::new(Route::new(path))),
        ));
        let Some(route) = self.stack.last_mut().and_then(Layer::route_mut) else {
            unreachable!("a route layer was just pushed");
        };
        Ok(route)
    }

    /// Adds a route with a single handler for `method`.
    pub fn method<H: Handler>(
        &mut self,
        method: Method,
        path: &str,
        handler: H,
    ) -> FrameworkResult<&mut Self> {
        self.route(path)?.method(method, handler);
        Ok(self)
    }

    /// Adds a route with a handler for every method.
    pub fn all<H: Handler>(&mut self, path: &str, handler: H) -> FrameworkResult<&mut Self> {
        self.route(path)?.all(handler);
        Ok(self)
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

    /// Dispatches a request through this router.
    pub async fn dispatch(&self, ctx: &Arc<RequestContext>) -> DispatchOutcome {
        self.handle(ctx, None).await
    }

    /// Dispatches a request, starting in error mode when `initial` is set.
    ///
    /// The routing state of `ctx` is the same on return as on entry.
    pub(crate) fn handle<'a>(
        &'a self,
        ctx: &'a Arc<RequestContext>,
        initial: Option<HandlerError>,
    ) -> BoxFuture<'a, DispatchOutcome> {
        Box::pin(async move {
            let entry = ctx.routing_snapshot();
            let outcome = self.run(ctx, &entry, initial).await;
            ctx.restore_routing(entry);
            outcome
        })
    }

    async fn run(
        &self,
        ctx: &Arc<RequestContext>,
        entry: &RoutingState,
        initial: Option<HandlerError>,
    ) -> DispatchOutcome {
        let method = ctx.method().clone();
        let mut pending = initial;
        let mut dirty = false;

        for (index, layer) in self.stack.iter().enumerate() {
            if ctx.is_sent() {
                return DispatchOutcome::Responded;
            }
            if dirty {
                ctx.restore_routing(entry.clone());
                dirty = false;
            }

            let outcome = match layer.try_handle(&entry.path, &method, pending.is_some()) {
                Ok(outcome) => outcome,
                Err(err) => {
                    debug!(index, pattern = layer.pattern(), error = %err, "Layer match failed");
                    pending = Some(err);
                    continue;
                }
            };

            let step = match outcome {
                Outcome::Skip => continue,
                Outcome::MethodNotAllowed(allowed) => {
                    trace!(index, pattern = layer.pattern(), "Path matched, method did not");
                    ctx.record_allowed(&allowed);
                    continue;
                }
                Outcome::Invoke { target, matched } => {
                    trace!(index, pattern = layer.pattern(), kind = layer.kind(), "Invoking layer");
                    self.enter(ctx, entry, &matched, layer.rewrites_path());
                    dirty = true;
                    let signal = match target {
                        Invocation::Handler(handler) => run_handler(handler, ctx).await,
                        Invocation::ErrorHandler(handler) => match pending.take() {
                            Some(err) => run_error_handler(handler, err, ctx).await,
                            None => continue,
                        },
                    };
                    apply_signal(signal, ctx, &mut pending)
                }
                Outcome::Delegate {
                    target: Delegation::Route(route),
                    matched,
                } => {
                    trace!(index, pattern = layer.pattern(), "Dispatching route");
                    self.enter(ctx, entry, &matched, false);
                    dirty = true;
                    match route.dispatch(ctx).await {
                        RouteExit::Responded => Step::Stop(DispatchOutcome::Responded),
                        RouteExit::Declined => Step::Next,
                        RouteExit::Failed(err) => {
                            pending = Some(err);
                            Step::Next
                        }
                        RouteExit::ExitRouter => Step::Stop(DispatchOutcome::Unhandled),
                    }
                }
                Outcome::Delegate {
                    target: Delegation::Router(router),
                    matched,
                } => {
                    trace!(index, pattern = layer.pattern(), "Entering mounted router");
                    self.enter(ctx, entry, &matched, true);
                    dirty = true;
                    match router.handle(ctx, None).await {
                        DispatchOutcome::Responded => Step::Stop(DispatchOutcome::Responded),
                        DispatchOutcome::Unhandled => Step::Next,
                        DispatchOutcome::Failed(err) => {
                            pending = Some(err);
                            Step::Next
                        }
                    }
                }
            };

            if let Step::Stop(outcome) = step {
                return outcome;
            }
        }

        if ctx.is_sent() {
            return DispatchOutcome::Responded;
        }
        match pending {
            Some(err) => DispatchOutcome::Failed(err),
            None => DispatchOutcome::Unhandled,
        }
    }

    /// Scopes params to the layer and, for prefix layers, rewrites the path.
    fn enter(
        &self,
        ctx: &RequestContext,
        entry: &RoutingState,
        matched: &PathMatch,
        rewrite: bool,
    ) {
        let params = if self.options.merge_params {
            entry.params.merged_with(&matched.params)
        } else {
            matched.params.clone()
        };
        ctx.set_params(params);
        if rewrite {
            let base_url = format!("{}{}", entry.base_url, matched.matched_prefix);
            ctx.rewrite(base_url, matched.remainder.clone());
        }
    }
}

fn apply_signal(signal: Signal, ctx: &RequestContext, pending: &mut Option<HandlerError>) -> Step {
    match signal {
        Signal::Continue | Signal::SkipRoute => {
            *pending = None;
            Step::Next
        }
        Signal::Fail(err) if ctx.is_sent() => {
            ctx.report_fault(err);
            Step::Stop(DispatchOutcome::Responded)
        }
        Signal::Fail(err) => {
            *pending = Some(err);
            Step::Next
        }
        Signal::ExitRouter => Step::Stop(DispatchOutcome::Unhandled),
        Signal::End => Step::Stop(DispatchOutcome::Responded),
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("options", &self.options)
            .field("layers", &self.stack)
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

    type Log = Arc<Mutex<Vec<String>>>;

    fn request(method: Method, uri: &str) -> Arc<RequestContext> {
        let request = http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Bytes::new())
            .unwrap();
        Arc::new(RequestContext::new(request, Arc::new(Settings::default())))
    }

    /// Records `name` plus the routing state the handler saw, then passes.
    fn recorder(log: &Log, name: &'static str) -> impl Handler {
        let log = Arc::clone(log);
        move |ctx: Arc<RequestContext>, next: Next| {
            let log = Arc::clone(&log);
            async move {
                log.lock()
                    .push(format!("{name} base={} path={}", ctx.base_url(), ctx.path()));
                next.pass()
            }
        }
    }

    fn responder(body: &'static str) -> impl Handler {
        move |ctx: Arc<RequestContext>, next: Next| async move {
            ctx.send_text(StatusCode::OK, body);
            next.end()
        }
    }

    fn body(ctx: &RequestContext) -> Bytes {
        ctx.take_response().into_body()
    }

    #[tokio::test]
    async fn test_layers_run_in_registration_order() {
        let log: Log = Arc::default();
        let mut router = Router::new();
        router
            .use_handler("/", recorder(&log, "a"))
            .unwrap()
            .use_handler("/", recorder(&log, "b"))
            .unwrap()
            .get("/", responder("done"))
            .unwrap();

        let ctx = request(Method::GET, "/");
        assert!(matches!(router.dispatch(&ctx).await, DispatchOutcome::Responded));
        assert_eq!(*log.lock(), vec!["a base= path=/", "b base= path=/"]);
        assert_eq!(body(&ctx), "done");
    }

    #[tokio::test]
    async fn test_prefix_middleware_sees_relative_path() {
        let log: Log = Arc::default();
        let mut router = Router::new();
        router.use_handler("/api", recorder(&log, "api")).unwrap();

        let ctx = request(Method::GET, "/api/users?x=1");
        assert!(matches!(router.dispatch(&ctx).await, DispatchOutcome::Unhandled));
        assert_eq!(*log.lock(), vec!["api base=/api path=/users"]);
        // restored on return
        assert_eq!(ctx.path(), "/api/users");
        assert_eq!(ctx.base_url(), "");
    }

    #[tokio::test]
    async fn test_nested_mounts_concatenate_base_url() {
        let log: Log = Arc::default();
        let mut inner = Router::new();
        inner.use_handler("/", recorder(&log, "inner")).unwrap();
        let mut middle = Router::new();
        middle.mount("/b", inner).unwrap();
        let mut root = Router::new();
        root.mount("/a", middle).unwrap();
        root.use_handler("/", recorder(&log, "after")).unwrap();

        let ctx = request(Method::GET, "/a/b/c");
        root.dispatch(&ctx).await;
        assert_eq!(
            *log.lock(),
            vec!["inner base=/a/b path=/c", "after base= path=/a/b/c"]
        );
    }

    #[tokio::test]
    async fn test_error_mode_skips_normal_layers() {
        let log: Log = Arc::default();
        let mut router = Router::new();
        router
            .use_handler("/", |_ctx: Arc<RequestContext>, next: Next| async move {
                next.fail(HandlerError::msg("boom"))
            })
            .unwrap()
            .use_handler("/", recorder(&log, "skipped"))
            .unwrap()
            .get("/", responder("skipped too"))
            .unwrap()
            .use_error(
                "/",
                |err: HandlerError, ctx: Arc<RequestContext>, next: Next| async move {
                    ctx.send_text(StatusCode::OK, format!("caught {err}"));
                    next.end()
                },
            )
            .unwrap();

        let ctx = request(Method::GET, "/");
        assert!(matches!(router.dispatch(&ctx).await, DispatchOutcome::Responded));
        assert!(log.lock().is_empty());
        assert_eq!(body(&ctx), "caught boom");
    }

    #[tokio::test]
    async fn test_error_handler_can_recover() {
        let log: Log = Arc::default();
        let mut router = Router::new();
        router
            .use_error("/", {
                let log = Arc::clone(&log);
                move |_err: HandlerError, _ctx: Arc<RequestContext>, next: Next| {
                    let log = Arc::clone(&log);
                    async move {
                        log.lock().push("early error handler".to_string());
                        next.pass()
                    }
                }
            })
            .unwrap()
            .use_handler("/", |_ctx: Arc<RequestContext>, next: Next| async move {
                next.fail(HandlerError::msg("boom"))
            })
            .unwrap()
            .use_error(
                "/",
                |_err: HandlerError, _ctx: Arc<RequestContext>, next: Next| async move {
                    next.pass()
                },
            )
            .unwrap()
            .use_handler("/", recorder(&log, "recovered"))
            .unwrap();

        let ctx = request(Method::GET, "/");
        assert!(matches!(router.dispatch(&ctx).await, DispatchOutcome::Unhandled));
        assert_eq!(*log.lock(), vec!["recovered base= path=/"]);
    }

    #[tokio::test]
    async fn test_unhandled_error_propagates() {
        let mut router = Router::new();
        router
            .use_handler("/", |_ctx: Arc<RequestContext>, next: Next| async move {
                next.fail(HandlerError::msg("nobody caught me"))
            })
            .unwrap();

        match router.dispatch(&request(Method::GET, "/")).await {
            DispatchOutcome::Failed(err) => assert_eq!(err.to_string(), "nobody caught me"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_panic_enters_error_mode() {
        let mut router = Router::new();
        router
            .get("/", |ctx: Arc<RequestContext>, next: Next| async move {
                if ctx.path() == "/" {
                    panic!("kaboom");
                }
                next.pass()
            })
            .unwrap();

        match router.dispatch(&request(Method::GET, "/")).await {
            DispatchOutcome::Failed(err) => {
                assert_eq!(err.to_string(), "handler panicked: kaboom")
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_params_are_scoped_per_router() {
        let log: Log = Arc::default();

        let capture = |log: &Log, name: &'static str| {
            let log = Arc::clone(log);
            move |ctx: Arc<RequestContext>, next: Next| {
                let log = Arc::clone(&log);
                async move {
                    let mut params: Vec<String> = ctx
                        .params()
                        .iter()
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect();
                    params.sort();
                    log.lock().push(format!("{name}: {}", params.join(",")));
                    next.pass()
                }
            }
        };

        let mut isolated = Router::new();
        isolated.get("/:book", capture(&log, "isolated")).unwrap();
        let mut merged = Router::with_options(RouterOptions::default().merge_params(true));
        merged.get("/:book", capture(&log, "merged")).unwrap();

        let mut root = Router::new();
        root.mount("/users/:user", isolated).unwrap();
        root.mount("/users/:user", merged).unwrap();

        root.dispatch(&request(Method::GET, "/users/ada/dune")).await;
        assert_eq!(
            *log.lock(),
            vec!["isolated: book=dune", "merged: book=dune,user=ada"]
        );
    }

    #[tokio::test]
    async fn test_inner_params_win_on_merge() {
        let mut inner = Router::with_options(RouterOptions::default().merge_params(true));
        inner
            .get("/:id", |ctx: Arc<RequestContext>, next: Next| async move {
                ctx.send_text(StatusCode::OK, ctx.param("id").unwrap_or_default());
                next.end()
            })
            .unwrap();
        let mut root = Router::new();
        root.mount("/outer/:id", inner).unwrap();

        let ctx = request(Method::GET, "/outer/1/2");
        root.dispatch(&ctx).await;
        assert_eq!(body(&ctx), "2");
    }

    #[tokio::test]
    async fn test_method_mismatch_records_allowed_methods() {
        let mut router = Router::new();
        router.get("/items", responder("list")).unwrap();
        router.post("/items", responder("create")).unwrap();

        let ctx = request(Method::DELETE, "/items");
        assert!(matches!(router.dispatch(&ctx).await, DispatchOutcome::Unhandled));
        assert_eq!(
            ctx.allowed_methods(),
            vec![Method::GET, Method::HEAD, Method::POST]
        );
    }

    #[tokio::test]
    async fn test_options_shortcut_registers_route() {
        let mut router = Router::new();
        router.options("/items", responder("preflight")).unwrap();

        let ctx = request(Method::OPTIONS, "/items");
        assert!(matches!(router.dispatch(&ctx).await, DispatchOutcome::Responded));
        assert_eq!(body(&ctx), "preflight");

        let ctx = request(Method::GET, "/items");
        assert!(matches!(router.dispatch(&ctx).await, DispatchOutcome::Unhandled));
        assert_eq!(ctx.allowed_methods(), vec![Method::OPTIONS]);
    }

    #[tokio::test]
    async fn test_mount_under_optional_segment() {
        let log: Log = Arc::default();
        let mut inner = Router::new();
        inner.use_handler("/", recorder(&log, "inner")).unwrap();
        let mut root = Router::new();
        root.mount("/:lang?", inner).unwrap();

        let ctx = request(Method::GET, "/");
        root.dispatch(&ctx).await;
        let ctx = request(Method::GET, "/en/docs");
        root.dispatch(&ctx).await;
        assert_eq!(
            *log.lock(),
            vec!["inner base= path=/", "inner base=/en path=/docs"]
        );
    }

    #[tokio::test]
    async fn test_exit_router_resumes_parent() {
        let log: Log = Arc::default();
        let mut inner = Router::new();
        inner
            .use_handler("/", |_ctx: Arc<RequestContext>, next: Next| async move {
                next.exit_router()
            })
            .unwrap()
            .use_handler("/", recorder(&log, "inner-skipped"))
            .unwrap();

        let mut root = Router::new();
        root.mount("/admin", inner).unwrap();
        root.use_handler("/", recorder(&log, "root")).unwrap();

        root.dispatch(&request(Method::GET, "/admin/panel")).await;
        assert_eq!(*log.lock(), vec!["root base= path=/admin/panel"]);
    }

    #[tokio::test]
    async fn test_skip_route_moves_to_next_route() {
        let mut router = Router::new();
        router
            .route("/user/:id")
            .unwrap()
            .get(|ctx: Arc<RequestContext>, next: Next| async move {
                if ctx.param("id").as_deref() == Some("0") {
                    return next.skip_route();
                }
                next.pass()
            })
            .get(responder("regular"));
        router.get("/user/:id", responder("special")).unwrap();

        let ctx = request(Method::GET, "/user/0");
        router.dispatch(&ctx).await;
        assert_eq!(body(&ctx), "special");

        let ctx = request(Method::GET, "/user/7");
        router.dispatch(&ctx).await;
        assert_eq!(body(&ctx), "regular");
    }

    #[tokio::test]
    async fn test_bad_param_encoding_fails_with_400() {
        let mut router = Router::new();
        router.get("/files/:name", responder("unreachable")).unwrap();

        match router.dispatch(&request(Method::GET, "/files/%E0%A4%A")).await {
            DispatchOutcome::Failed(err) => {
                assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
                assert_eq!(err.to_string(), "Failed to decode param '%E0%A4%A'");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_after_send_is_a_fault() {
        let mut router = Router::new();
        router
            .get("/", |ctx: Arc<RequestContext>, next: Next| async move {
                ctx.send_text(StatusCode::OK, "sent");
                next.fail(HandlerError::msg("late"))
            })
            .unwrap();

        let ctx = request(Method::GET, "/");
        assert!(matches!(router.dispatch(&ctx).await, DispatchOutcome::Responded));
        assert_eq!(ctx.take_fault().unwrap().to_string(), "late");
        assert_eq!(body(&ctx), "sent");
    }

    #[tokio::test]
    async fn test_stops_once_response_sent() {
        let log: Log = Arc::default();
        let mut router = Router::new();
        router
            .use_handler("/", |ctx: Arc<RequestContext>, next: Next| async move {
                ctx.send_text(StatusCode::OK, "early");
                next.pass()
            })
            .unwrap()
            .use_handler("/", recorder(&log, "never"))
            .unwrap();

        let ctx = request(Method::GET, "/");
        assert!(matches!(router.dispatch(&ctx).await, DispatchOutcome::Responded));
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_strict_and_case_sensitive_options() {
        let mut strict = Router::with_options(RouterOptions::default().strict(true));
        strict.get("/foo", responder("foo")).unwrap();
        assert!(matches!(
            strict.dispatch(&request(Method::GET, "/foo/")).await,
            DispatchOutcome::Unhandled
        ));

        let mut lenient = Router::new();
        lenient.get("/foo", responder("foo")).unwrap();
        assert!(matches!(
            lenient.dispatch(&request(Method::GET, "/FOO/")).await,
            DispatchOutcome::Responded
        ));

        let mut sensitive = Router::with_options(RouterOptions::default().case_sensitive(true));
        sensitive.get("/foo", responder("foo")).unwrap();
        assert!(matches!(
            sensitive.dispatch(&request(Method::GET, "/FOO")).await,
            DispatchOutcome::Unhandled
        ));
    }

    #[test]
    fn test_invalid_pattern_rejected_at_registration() {
        let mut router = Router::new();
        assert!(router.get("/users/:", responder("x")).is_err());
        assert!(router.is_empty());
    }
}
