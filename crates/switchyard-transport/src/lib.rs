//! # Switchyard Transport
//!
//! Network front ends for Switchyard applications.
//!
//! ## Features
//!
//! - `http-server` (default): HTTP/1.1 server built on axum
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────┐
//! │  Application          │  (switchyard-framework)
//! │  as tower::Service    │
//! ├───────────────────────┤
//! │  switchyard-transport │  <- This crate
//! ├───────────────────────┤
//! │  Network (TCP/HTTP)   │
//! └───────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use switchyard_transport::http::{HttpServer, HttpServerConfig};
//!
//! let server = HttpServer::new(HttpServerConfig::new("127.0.0.1", 3000), app);
//! let handle = server.listen().await?;
//! println!("listening on {}", handle.local_addr());
//! ```

pub mod error;

#[cfg(feature = "http-server")]
pub mod http;

pub use error::{TransportError, TransportResult};

#[cfg(feature = "http-server")]
pub use self::http::{
    DEFAULT_MAX_BODY_BYTES, HttpServer, HttpServerConfig, ListenerHandle, PeerAddr,
};
