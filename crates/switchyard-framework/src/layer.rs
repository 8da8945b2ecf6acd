//! Router stack entries.
//!
//! A [`Layer`] pairs a compiled [`PathMatcher`] with what runs when it
//! matches. The router asks each layer, in registration order, whether it
//! applies to the current request; the layer answers with an [`Outcome`] and
//! the router does the rest (param scoping, path rewriting, continuation).

use std::fmt;
use std::sync::Arc;

use switchyard_core::{HandlerError, Method};

use crate::handler::{BoxedErrorHandler, BoxedHandler};
use crate::path::{PathMatch, PathMatcher};
use crate::route::Route;
use crate::router::Router;

/// What a layer dispatches to.
#[derive(Clone)]
pub enum LayerTarget {
    /// Middleware, runs in normal mode.
    Handler(BoxedHandler),
    /// Error middleware, runs in error mode.
    ErrorHandler(BoxedErrorHandler),
    /// A route with per-method handlers.
    Route(Arc<Route>),
    /// A mounted router.
    Router(Arc<Router>),
}

impl LayerTarget {
    fn kind(&self) -> &'static str {
        match self {
            Self::Handler(_) => "handler",
            Self::ErrorHandler(_) => "error_handler",
            Self::Route(_) => "route",
            Self::Router(_) => "router",
        }
    }
}

/// A handler to invoke directly.
pub(crate) enum Invocation<'a> {
    Handler(&'a BoxedHandler),
    ErrorHandler(&'a BoxedErrorHandler),
}

/// A nested dispatch unit.
pub(crate) enum Delegation<'a> {
    Route(&'a Route),
    Router(&'a Router),
}

/// Result of asking a layer whether it applies.
pub(crate) enum Outcome<'a> {
    /// Not eligible in this mode, or the path does not match.
    Skip,
    /// The route path matched but it has no handler for the method.
    MethodNotAllowed(Vec<Method>),
    Invoke {
        target: Invocation<'a>,
        matched: PathMatch,
    },
    Delegate {
        target: Delegation<'a>,
        matched: PathMatch,
    },
}

/// One entry of a router stack.
#[derive(Clone)]
pub struct Layer {
    matcher: PathMatcher,
    target: LayerTarget,
}

impl Layer {
    pub(crate) fn new(matcher: PathMatcher, target: LayerTarget) -> Self {
        Self { matcher, target }
    }

    /// The registered pattern.
    pub fn pattern(&self) -> &str {
        self.matcher.pattern()
    }

    /// The compiled matcher.
    pub fn matcher(&self) -> &PathMatcher {
        &self.matcher
    }

    /// What this layer dispatches to.
    pub fn target(&self) -> &LayerTarget {
        &self.target
    }

    /// Short name of the target kind, for logs.
    pub fn kind(&self) -> &'static str {
        self.target.kind()
    }

    /// Returns `true` if this layer only runs in error mode.
    pub fn is_error_handler(&self) -> bool {
        matches!(self.target, LayerTarget::ErrorHandler(_))
    }

    /// Returns `true` if a match rewrites `base_url` and `path`.
    pub(crate) fn rewrites_path(&self) -> bool {
        self.matcher.options().strategy.is_prefix()
    }

    pub(crate) fn route_mut(&mut self) -> Option<&mut Route> {
        match &mut self.target {
            LayerTarget::Route(route) => Some(Arc::make_mut(route)),
            _ => None,
        }
    }

    /// Decides whether this layer applies to `path` in the given mode.
    ///
    /// A parameter that fails to decode turns into a `400` error; the router
    /// continues in error mode with it.
    pub(crate) fn try_handle(
        &self,
        path: &str,
        method: &Method,
        error_mode: bool,
    ) -> Result<Outcome<'_>, HandlerError> {
        if self.is_error_handler() != error_mode {
            return Ok(Outcome::Skip);
        }

        let matched = match self.matcher.matches(path) {
            Ok(Some(matched)) => matched,
            Ok(None) => return Ok(Outcome::Skip),
            Err(err) => return Err(err.into_handler_error()),
        };

        Ok(match &self.target {
            LayerTarget::Handler(handler) => Outcome::Invoke {
                target: Invocation::Handler(handler),
                matched,
            },
            LayerTarget::ErrorHandler(handler) => Outcome::Invoke {
                target: Invocation::ErrorHandler(handler),
                matched,
            },
            LayerTarget::Route(route) if route.handles_method(method) => Outcome::Delegate {
                target: Delegation::Route(route),
                matched,
            },
            LayerTarget::Route(route) => Outcome::MethodNotAllowed(route.methods()),
            LayerTarget::Router(router) => Outcome::Delegate {
                target: Delegation::Router(router),
                matched,
            },
        })
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("pattern", &self.pattern())
            .field("kind", &self.kind())
            .finish()
    }
}
