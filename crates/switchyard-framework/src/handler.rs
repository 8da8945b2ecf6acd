//! Handler traits and the continuation protocol.
//!
//! Every handler receives the request context and a [`Next`] token and must
//! return a [`Flow`]. The only way to build a `Flow` is to consume the token,
//! so a handler cannot continue the chain twice and cannot forget to decide:
//!
//! ```ignore
//! router.use_handler("/", |ctx: Arc<RequestContext>, next: Next| async move {
//!     if ctx.header("authorization").is_none() {
//!         ctx.send_text(StatusCode::UNAUTHORIZED, "login required");
//!         return next.end();
//!     }
//!     next.pass()
//! })?;
//! ```
//!
//! Error handlers additionally receive the pending [`HandlerError`]. They are
//! registered through dedicated methods (`use_error`, `Route::error`), never
//! inferred from the closure signature.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use switchyard_core::HandlerError;

use crate::context::RequestContext;

/// A boxed future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What the dispatch loop does after a handler finished.
pub(crate) enum Signal {
    /// Continue with the next eligible layer, leaving error mode.
    Continue,
    /// Enter (or stay in) error mode with this error.
    Fail(HandlerError),
    /// Skip the remaining handlers of the current route.
    SkipRoute,
    /// Stop the current router; its parent continues.
    ExitRouter,
    /// The handler finished the request.
    End,
}

/// Decision returned by a handler. Obtained only by consuming [`Next`].
#[must_use = "a Flow must be returned from the handler"]
pub struct Flow {
    signal: Signal,
}

impl Flow {
    pub(crate) fn into_signal(self) -> Signal {
        self.signal
    }

    /// Returns `true` if this flow carries an error.
    pub fn is_failure(&self) -> bool {
        matches!(self.signal, Signal::Fail(_))
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &self.signal {
            Signal::Continue => "Continue",
            Signal::Fail(_) => "Fail",
            Signal::SkipRoute => "SkipRoute",
            Signal::ExitRouter => "ExitRouter",
            Signal::End => "End",
        };
        f.debug_tuple("Flow").field(&name).finish()
    }
}

/// Continuation token handed to each handler invocation.
///
/// Consuming it produces the [`Flow`] the handler returns, so each
/// invocation continues at most once.
#[must_use = "consume Next to produce the handler's Flow"]
pub struct Next {
    _private: (),
}

impl Next {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }

    /// Continue with the next matching layer. Clears a pending error when
    /// called from an error handler.
    pub fn pass(self) -> Flow {
        Flow {
            signal: Signal::Continue,
        }
    }

    /// Continue in error mode: only error handlers run until one recovers.
    pub fn fail(self, error: impl Into<HandlerError>) -> Flow {
        Flow {
            signal: Signal::Fail(error.into()),
        }
    }

    /// Continues on `Ok`, fails on `Err`.
    pub fn resolve<E: Into<HandlerError>>(self, result: Result<(), E>) -> Flow {
        match result {
            Ok(()) => self.pass(),
            Err(e) => self.fail(e),
        }
    }

    /// Skip the remaining handlers of the current route and continue with the
    /// router's next layer. Outside a route this behaves like [`Next::pass`].
    pub fn skip_route(self) -> Flow {
        Flow {
            signal: Signal::SkipRoute,
        }
    }

    /// Leave the current router; the parent router continues after the mount.
    pub fn exit_router(self) -> Flow {
        Flow {
            signal: Signal::ExitRouter,
        }
    }

    /// The request is finished. Use after sending a response.
    pub fn end(self) -> Flow {
        Flow { signal: Signal::End }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Next")
    }
}

/// A request handler (middleware or route endpoint).
///
/// Implemented for every `Fn(Arc<RequestContext>, Next) -> impl Future<Output = Flow>`.
pub trait Handler: Send + Sync + 'static {
    /// Runs the handler.
    fn call(&self, ctx: Arc<RequestContext>, next: Next) -> BoxFuture<'static, Flow>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Arc<RequestContext>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Flow> + Send + 'static,
{
    fn call(&self, ctx: Arc<RequestContext>, next: Next) -> BoxFuture<'static, Flow> {
        Box::pin((self)(ctx, next))
    }
}

/// An error handler. Only runs while an error is pending.
///
/// Implemented for every
/// `Fn(HandlerError, Arc<RequestContext>, Next) -> impl Future<Output = Flow>`.
pub trait ErrorHandler: Send + Sync + 'static {
    /// Runs the handler with the pending error.
    fn call(
        &self,
        error: HandlerError,
        ctx: Arc<RequestContext>,
        next: Next,
    ) -> BoxFuture<'static, Flow>;
}

impl<F, Fut> ErrorHandler for F
where
    F: Fn(HandlerError, Arc<RequestContext>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Flow> + Send + 'static,
{
    fn call(
        &self,
        error: HandlerError,
        ctx: Arc<RequestContext>,
        next: Next,
    ) -> BoxFuture<'static, Flow> {
        Box::pin((self)(error, ctx, next))
    }
}

/// Type-erased request handler.
pub type BoxedHandler = Arc<dyn Handler>;

/// Type-erased error handler.
pub type BoxedErrorHandler = Arc<dyn ErrorHandler>;

/// A handler of either kind, as stored in a route.
#[derive(Clone)]
pub enum HandlerKind {
    /// Runs in normal mode.
    Normal(BoxedHandler),
    /// Runs in error mode.
    Error(BoxedErrorHandler),
}

impl HandlerKind {
    /// Returns `true` for [`HandlerKind::Error`].
    pub fn is_error_handler(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Debug for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal(_) => f.write_str("Normal(..)"),
            Self::Error(_) => f.write_str("Error(..)"),
        }
    }
}

/// Invokes a handler, turning a panic into a failure.
pub(crate) async fn run_handler(handler: &BoxedHandler, ctx: &Arc<RequestContext>) -> Signal {
    let started =
        std::panic::catch_unwind(AssertUnwindSafe(|| handler.call(Arc::clone(ctx), Next::new())));
    settle(started).await
}

/// Invokes an error handler, turning a panic into a failure.
pub(crate) async fn run_error_handler(
    handler: &BoxedErrorHandler,
    error: HandlerError,
    ctx: &Arc<RequestContext>,
) -> Signal {
    let started = std::panic::catch_unwind(AssertUnwindSafe(|| {
        handler.call(error, Arc::clone(ctx), Next::new())
    }));
    settle(started).await
}

async fn settle(started: std::thread::Result<BoxFuture<'static, Flow>>) -> Signal {
    let future = match started {
        Ok(future) => future,
        Err(payload) => return Signal::Fail(HandlerError::from_panic(payload)),
    };
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(flow) => flow.into_signal(),
        Err(payload) => Signal::Fail(HandlerError::from_panic(payload)),
    }
}
