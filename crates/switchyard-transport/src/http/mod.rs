//! HTTP transport.

mod server;

pub use server::{DEFAULT_MAX_BODY_BYTES, HttpServer, HttpServerConfig, ListenerHandle, PeerAddr};
