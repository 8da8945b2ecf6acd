//! `tower::Service` adapter for [`Application`].

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use switchyard_core::{HttpRequest, HttpResponse};
use tower::Service;

use crate::application::Application;
use crate::handler::BoxFuture;

/// A cloneable service that dispatches requests through a shared
/// [`Application`].
///
/// Every call creates a fresh request context; clones share the
/// application and may run concurrently.
#[derive(Debug, Clone)]
pub struct AppService {
    app: Arc<Application>,
}

impl AppService {
    /// Wraps `app`.
    pub fn new(app: Application) -> Self {
        Self { app: Arc::new(app) }
    }

    /// Wraps an already shared application.
    pub fn from_shared(app: Arc<Application>) -> Self {
        Self { app }
    }

    /// The wrapped application.
    pub fn app(&self) -> &Application {
        &self.app
    }
}

impl Service<HttpRequest> for AppService {
    type Response = HttpResponse;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<HttpResponse, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: HttpRequest) -> Self::Future {
        let app = Arc::clone(&self.app);
        Box::pin(async move { Ok(app.handle(request).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::handler::Next;
    use bytes::Bytes;
    use switchyard_core::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_oneshot() {
        let mut app = Application::new();
        app.get("/ping", |ctx: Arc<RequestContext>, next: Next| async move {
            ctx.send_text(StatusCode::OK, "pong");
            next.end()
        })
        .unwrap();

        let request = http::Request::builder()
            .uri("/ping")
            .body(Bytes::new())
            .unwrap();
        let response = app.into_service().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), &Bytes::from("pong"));
    }
}
