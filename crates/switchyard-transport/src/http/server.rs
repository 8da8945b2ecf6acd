//! HTTP server driving an [`Application`].
//!
//! Every request is answered by a single axum fallback handler that buffers
//! the body, attaches connection metadata to the request extensions and calls
//! the application through its `tower::Service` implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{ConnectInfo, Request, State},
    response::{IntoResponse, Response},
};
use http::{StatusCode, header::CONTENT_LENGTH};
use switchyard_framework::{AppService, Application};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tracing::{debug, error, info, trace};

use crate::error::{TransportError, TransportResult};

/// Default request body limit (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Address of the connected client, available through
/// `RequestContext::extension::<PeerAddr>()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr(pub SocketAddr);

/// Server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind; `0` picks a free port.
    pub port: u16,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl HttpServerConfig {
    /// Creates a config for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Sets the body limit.
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// `host:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Handle to a running server. Dropping it stops the server.
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// The bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signals the server to stop accepting connections.
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Stops the server and waits for in-flight requests to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            error!(error = %e, "HTTP server task failed");
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

/// Shared state for the fallback handler.
struct ServerState {
    service: AppService,
    max_body_bytes: usize,
}

/// HTTP server for one application.
pub struct HttpServer {
    config: HttpServerConfig,
    service: AppService,
}

impl HttpServer {
    /// Creates a server for `app`.
    pub fn new(config: HttpServerConfig, app: Application) -> Self {
        Self::from_service(config, app.into_service())
    }

    /// Creates a server for an existing service.
    pub fn from_service(config: HttpServerConfig, service: AppService) -> Self {
        Self { config, service }
    }

    /// Binds the socket and starts serving in a background task.
    pub async fn listen(self) -> TransportResult<ListenerHandle> {
        let addr = self.config.addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let state = Arc::new(ServerState {
            service: self.service,
            max_body_bytes: self.config.max_body_bytes,
        });
        let router = Router::new().fallback(dispatch).with_state(state);

        info!(addr = %local_addr, "HTTP server listening");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
                info!("HTTP server shutting down");
            });

            if let Err(e) = server.await {
                error!(error = %e, "HTTP server error");
            }
        });

        Ok(ListenerHandle {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

fn too_large() -> Response {
    (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large").into_response()
}

/// Fallback handler: every request goes to the application.
async fn dispatch(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();

    let declared = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > state.max_body_bytes) {
        debug!(remote_addr = %peer, limit = state.max_body_bytes, "Declared body too large");
        return too_large();
    }

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            debug!(remote_addr = %peer, error = %e, "Failed to buffer request body");
            return too_large();
        }
    };
    trace!(remote_addr = %peer, method = %parts.method, uri = %parts.uri, len = body.len(), "Received HTTP request");

    let mut request = http::Request::from_parts(parts, body);
    // cancelled if this future is dropped before the response is produced
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    request.extensions_mut().insert(PeerAddr(peer));
    request.extensions_mut().insert(token);

    let response = match state.service.clone().oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    guard.disarm();

    response.map(Body::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use switchyard_framework::{Next, RequestContext};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn roundtrip(addr: SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    fn app() -> Application {
        let mut app = Application::new();
        app.get("/hello/:name", |ctx: Arc<RequestContext>, next: Next| async move {
            let name = ctx.param("name").unwrap_or_default();
            let peer = ctx.extension::<PeerAddr>().is_some();
            ctx.send_text(StatusCode::OK, format!("hello {name} peer={peer}"));
            next.end()
        })
        .unwrap();
        app.post("/echo", |ctx: Arc<RequestContext>, next: Next| async move {
            ctx.send(StatusCode::OK, ctx.body().clone());
            next.end()
        })
        .unwrap();
        app
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_serves_application() {
        let server = HttpServer::new(HttpServerConfig::new("127.0.0.1", 0), app());
        let handle = server.listen().await.unwrap();

        let response = roundtrip(
            handle.local_addr(),
            "GET /hello/ada HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("hello ada peer=true"));

        let response = roundtrip(
            handle.local_addr(),
            "GET /nope HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 404"));

        handle.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_body_limit() {
        let config = HttpServerConfig::new("127.0.0.1", 0).with_max_body_bytes(8);
        let handle = HttpServer::new(config, app()).listen().await.unwrap();

        let ok = roundtrip(
            handle.local_addr(),
            "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 4\r\nConnection: close\r\n\r\nping",
        )
        .await;
        assert!(ok.starts_with("HTTP/1.1 200"));
        assert!(ok.ends_with("ping"));

        let rejected = roundtrip(
            handle.local_addr(),
            "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 20\r\nConnection: close\r\n\r\n01234567890123456789",
        )
        .await;
        assert!(rejected.starts_with("HTTP/1.1 413"));

        handle.shutdown().await;
    }

    #[test]
    fn test_config_addr() {
        let config = HttpServerConfig::new("0.0.0.0", 8080);
        assert_eq!(config.addr(), "0.0.0.0:8080");
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }
}
