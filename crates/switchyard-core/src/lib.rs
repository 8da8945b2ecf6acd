//! # Switchyard Core
//!
//! Foundation types for the Switchyard request-dispatch engine.
//!
//! This crate holds the vocabulary every other layer shares:
//!
//! - **HTTP types**: requests and responses are plain [`http`] messages with a
//!   [`Bytes`] body ([`HttpRequest`], [`HttpResponse`]). Parsing the wire
//!   format is the transport's job.
//! - **Errors**: [`HandlerError`] for failures raised by application code and
//!   [`DispatchError`] for the ways a dispatch can end without a response.
//! - **Params**: [`Params`], the ordered capture list filled by path matching.
//! - **Settings**: [`Settings`], the per-application settings table.
//! - **Method filters**: [`MethodFilter`] for per-method route entries.
//!
//! The dispatch engine itself lives in `switchyard-framework`.

pub mod error;
pub mod method;
pub mod params;
pub mod settings;

pub use bytes::Bytes;
pub use http;
pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};

pub use error::{BoxError, DispatchError, HandlerError};
pub use method::{MethodFilter, allow_header};
pub use params::Params;
pub use settings::{Environment, QueryParserMode, Settings, SettingsError};

/// A request as handed over by the transport.
pub type HttpRequest = http::Request<Bytes>;

/// A response as handed back to the transport.
pub type HttpResponse = http::Response<Bytes>;
