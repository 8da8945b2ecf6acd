//! Per-request context.
//!
//! A [`RequestContext`] is created by the application for every incoming
//! request and handed to each handler as an `Arc`. It owns everything that is
//! specific to one request:
//!
//! - the immutable [`HttpRequest`] as received from the transport,
//! - the routing state the dispatch loop rewrites while descending into
//!   mounted routers (`path`, `base_url`, `params`),
//! - the staged response and whether it has been sent,
//! - typed per-request state shared by the handlers of this request,
//! - a cancellation token the transport trips when the client goes away.
//!
//! Nothing in here is shared between requests; the routers themselves are
//! read-only during dispatch.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use parking_lot::Mutex;
use serde_json::Value;
use switchyard_core::method::push_unique;
use switchyard_core::{
    HandlerError, HeaderMap, HeaderName, HeaderValue, HttpRequest, HttpResponse, Method, Params,
    Settings, StatusCode, Uri,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::middleware::Query;

/// The part of the context the dispatch loop rewrites.
#[derive(Debug, Clone, Default)]
pub(crate) struct RoutingState {
    /// Path relative to the router currently dispatching.
    pub(crate) path: String,
    /// Concatenated mount prefixes of the enclosing routers.
    pub(crate) base_url: String,
    /// Params visible to the layer currently running.
    pub(crate) params: Params,
    /// Pattern of the route currently dispatching, if any.
    pub(crate) route: Option<String>,
}

/// The context object passed to every handler of one request.
pub struct RequestContext {
    request: HttpRequest,
    routing: Mutex<RoutingState>,
    /// Methods accepted by routes whose path matched but whose method did not.
    allowed: Mutex<Vec<Method>>,
    response: Mutex<HttpResponse>,
    sent: AtomicBool,
    state: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    settings: Arc<Settings>,
    cancellation: CancellationToken,
    fault: Mutex<Option<HandlerError>>,
}

impl RequestContext {
    /// Creates a context for `request`.
    ///
    /// A [`CancellationToken`] stored in the request extensions is adopted,
    /// otherwise a fresh token is created.
    pub fn new(request: HttpRequest, settings: Arc<Settings>) -> Self {
        let cancellation = request
            .extensions()
            .get::<CancellationToken>()
            .cloned()
            .unwrap_or_default();
        let routing = RoutingState {
            path: request.uri().path().to_string(),
            ..RoutingState::default()
        };

        Self {
            request,
            routing: Mutex::new(routing),
            allowed: Mutex::new(Vec::new()),
            response: Mutex::new(HttpResponse::default()),
            sent: AtomicBool::new(false),
            state: Mutex::new(HashMap::new()),
            settings,
            cancellation,
            fault: Mutex::new(None),
        }
    }

    // ─── Request ──────────────────────────────────────────────────────────────

    /// The request as received from the transport.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// Request URI.
    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    /// The full original path and query, never rewritten by mounting.
    pub fn original_url(&self) -> &str {
        self.request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// Returns a request header as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.headers().get(name).and_then(|v| v.to_str().ok())
    }

    /// Request body.
    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    /// Reads a value the transport attached to the request extensions.
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.request.extensions().get::<T>()
    }

    // ─── Routing state ───────────────────────────────────────────────────────

    /// Path relative to the mount point of the router currently dispatching.
    pub fn path(&self) -> String {
        self.routing.lock().path.clone()
    }

    /// Mount prefix of the router currently dispatching (`""` at the root).
    pub fn base_url(&self) -> String {
        self.routing.lock().base_url.clone()
    }

    /// All params visible to the running handler.
    pub fn params(&self) -> Params {
        self.routing.lock().params.clone()
    }

    /// One param visible to the running handler.
    pub fn param(&self, name: &str) -> Option<String> {
        self.routing.lock().params.get(name).map(str::to_string)
    }

    /// Pattern of the route currently dispatching.
    pub fn route_path(&self) -> Option<String> {
        self.routing.lock().route.clone()
    }

    /// Parsed query string, empty if no query parser ran.
    pub fn query(&self) -> Params {
        self.get_state::<Query>()
            .map(|q| q.into_params())
            .unwrap_or_default()
    }

    /// One query parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query().get(name).map(str::to_string)
    }

    /// Methods accepted by routes that matched the path but not the method.
    pub fn allowed_methods(&self) -> Vec<Method> {
        self.allowed.lock().clone()
    }

    pub(crate) fn routing_snapshot(&self) -> RoutingState {
        self.routing.lock().clone()
    }

    pub(crate) fn restore_routing(&self, state: RoutingState) {
        *self.routing.lock() = state;
    }

    pub(crate) fn set_params(&self, params: Params) {
        self.routing.lock().params = params;
    }

    pub(crate) fn rewrite(&self, base_url: String, path: String) {
        let mut routing = self.routing.lock();
        routing.base_url = base_url;
        routing.path = path;
    }

    pub(crate) fn set_route(&self, route: Option<String>) {
        self.routing.lock().route = route;
    }

    pub(crate) fn record_allowed(&self, methods: &[Method]) {
        let mut allowed = self.allowed.lock();
        for method in methods {
            push_unique(&mut allowed, method.clone());
        }
    }

    // ─── Response ────────────────────────────────────────────────────────────

    /// Returns `true` once a response has been sent.
    pub fn is_sent(&self) -> bool {
        self.sent.load(Ordering::SeqCst)
    }

    /// Mutates the staged response (status, headers) before it is sent.
    ///
    /// The response lock is not held while `f` runs, so `f` may call back
    /// into the context. Headers set that way are kept unless `f` set the
    /// same header, and a send from inside `f` supplies status and body.
    pub fn with_response<R>(&self, f: impl FnOnce(&mut HttpResponse) -> R) -> R {
        let sent_before = self.is_sent();
        let mut staged = std::mem::take(&mut *self.response.lock());
        let out = f(&mut staged);

        let mut slot = self.response.lock();
        let touched = std::mem::replace(&mut *slot, staged);
        let (parts, body) = touched.into_parts();
        for (name, value) in parts.headers.iter() {
            if !slot.headers().contains_key(name) {
                slot.headers_mut().insert(name.clone(), value.clone());
            }
        }
        if !sent_before && self.is_sent() {
            *slot.status_mut() = parts.status;
            *slot.body_mut() = body;
        }
        out
    }

    /// Sets a header on the staged response.
    pub fn set_header(&self, name: HeaderName, value: HeaderValue) {
        self.response.lock().headers_mut().insert(name, value);
    }

    /// Sends the staged response with `status` and `body`.
    ///
    /// Returns `false` (and changes nothing) if a response was already sent.
    pub fn send(&self, status: StatusCode, body: impl Into<Bytes>) -> bool {
        if self.sent.swap(true, Ordering::SeqCst) {
            warn!(
                method = %self.method(),
                url = %self.original_url(),
                "Response already sent, ignoring second send"
            );
            return false;
        }
        let mut response = self.response.lock();
        *response.status_mut() = status;
        *response.body_mut() = body.into();
        true
    }

    /// Sends a plain text body, defaulting the content type.
    pub fn send_text(&self, status: StatusCode, text: impl Into<String>) -> bool {
        self.default_content_type("text/plain; charset=utf-8");
        self.send(status, text.into())
    }

    /// Sends a JSON body, defaulting the content type.
    pub fn send_json(&self, status: StatusCode, value: &Value) -> bool {
        self.default_content_type("application/json");
        self.send(status, value.to_string())
    }

    /// Replaces the staged response wholesale and marks it sent.
    pub fn send_response(&self, response: HttpResponse) -> bool {
        if self.sent.swap(true, Ordering::SeqCst) {
            warn!(url = %self.original_url(), "Response already sent, ignoring second send");
            return false;
        }
        let mut staged = self.response.lock();
        let mut response = response;
        // headers staged earlier (e.g. X-Powered-By) survive unless overridden
        for (name, value) in staged.headers().iter() {
            if !response.headers().contains_key(name) {
                response.headers_mut().insert(name.clone(), value.clone());
            }
        }
        *staged = response;
        true
    }

    fn default_content_type(&self, value: &'static str) {
        let mut response = self.response.lock();
        if !response.headers().contains_key(CONTENT_TYPE) {
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(value));
        }
    }

    pub(crate) fn take_response(&self) -> HttpResponse {
        std::mem::take(&mut *self.response.lock())
    }

    // ─── Per-request state ───────────────────────────────────────────────────

    /// Stores a value in this request's state map.
    ///
    /// Only one value per type can be stored; subsequent calls overwrite.
    pub fn set_state<T: Send + Sync + 'static>(&self, value: T) {
        self.state.lock().insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a cloned value from this request's state map.
    pub fn get_state<T: Clone + 'static>(&self) -> Option<T> {
        self.state
            .lock()
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Returns `true` if a value of type `T` is stored.
    pub fn has_state<T: 'static>(&self) -> bool {
        self.state.lock().contains_key(&TypeId::of::<T>())
    }

    /// Removes and returns a stored value.
    pub fn take_state<T: 'static>(&self) -> Option<T> {
        self.state
            .lock()
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    // ─── Application & lifecycle ─────────────────────────────────────────────

    /// Settings of the application dispatching this request.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Token cancelled when the client connection goes away.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns `true` if the client connection went away.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub(crate) fn report_fault(&self, error: HandlerError) {
        let mut fault = self.fault.lock();
        if fault.is_none() {
            *fault = Some(error);
        } else {
            warn!(error = %error, "Additional fault after response was sent");
        }
    }

    pub(crate) fn take_fault(&self) -> Option<HandlerError> {
        self.fault.lock().take()
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", self.method())
            .field("url", &self.original_url())
            .field("routing", &*self.routing.lock())
            .field("sent", &self.is_sent())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(uri: &str) -> RequestContext {
        let request = http::Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Bytes::new())
            .unwrap();
        RequestContext::new(request, Arc::new(Settings::default()))
    }

    #[test]
    fn test_initial_routing_state() {
        let ctx = context("/users/42?verbose=1");
        assert_eq!(ctx.path(), "/users/42");
        assert_eq!(ctx.base_url(), "");
        assert_eq!(ctx.original_url(), "/users/42?verbose=1");
        assert!(ctx.params().is_empty());
    }

    #[test]
    fn test_with_response_allows_reentry() {
        let ctx = context("/");
        ctx.with_response(|response| {
            response
                .headers_mut()
                .insert("x-own", HeaderValue::from_static("closure"));
            ctx.set_header(
                HeaderName::from_static("x-own"),
                HeaderValue::from_static("context"),
            );
            ctx.set_header(
                HeaderName::from_static("x-extra"),
                HeaderValue::from_static("context"),
            );
            ctx.send_text(StatusCode::ACCEPTED, "inside");
        });

        let response = ctx.take_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.body(), &Bytes::from("inside"));
        assert_eq!(response.headers().get("x-own").unwrap(), "closure");
        assert_eq!(response.headers().get("x-extra").unwrap(), "context");
    }

    #[test]
    fn test_send_only_once() {
        let ctx = context("/");
        assert!(ctx.send_text(StatusCode::OK, "first"));
        assert!(!ctx.send_text(StatusCode::IM_A_TEAPOT, "second"));

        let response = ctx.take_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), &Bytes::from("first"));
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_send_response_keeps_staged_headers() {
        let ctx = context("/");
        ctx.set_header(
            HeaderName::from_static("x-trace"),
            HeaderValue::from_static("abc"),
        );
        let response = http::Response::builder()
            .status(StatusCode::CREATED)
            .body(Bytes::from_static(b"done"))
            .unwrap();
        assert!(ctx.send_response(response));

        let response = ctx.take_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("x-trace").unwrap(), "abc");
    }

    #[test]
    fn test_state_is_typed() {
        #[derive(Clone, Debug, PartialEq)]
        struct User(&'static str);

        let ctx = context("/");
        assert!(!ctx.has_state::<User>());
        ctx.set_state(User("ada"));
        assert_eq!(ctx.get_state::<User>(), Some(User("ada")));
        assert_eq!(ctx.take_state::<User>(), Some(User("ada")));
        assert!(!ctx.has_state::<User>());
    }

    #[test]
    fn test_adopts_cancellation_token_from_extensions() {
        let token = CancellationToken::new();
        let mut request = http::Request::new(Bytes::new());
        request.extensions_mut().insert(token.clone());
        let ctx = RequestContext::new(request, Arc::new(Settings::default()));

        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_first_fault_is_kept() {
        let ctx = context("/");
        ctx.report_fault(HandlerError::msg("first"));
        ctx.report_fault(HandlerError::msg("second"));
        assert_eq!(ctx.take_fault().unwrap().to_string(), "first");
        assert!(ctx.take_fault().is_none());
    }
}
