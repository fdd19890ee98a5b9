//! # Server Module
//!
//! The service boundary between a transport layer and the dispatch core.
//!
//! The transport hands over a materialized [`HttpRequest`]. [`AppService`]
//! resolves it, runs the middleware chain and the security gate, translates
//! failures into problem payloads and returns an [`HttpResponse`] whose body
//! is fully serialized. [`ResponseWriter::write`] can then put it on any
//! `tokio` writer, honoring the keep-alive decision.
//!
//! Sockets, framing and TLS are the transport's business.

mod request;
mod response;
mod service;

pub use request::HttpRequest;
pub use response::{is_valid_status, ConnectionState, HttpResponse, Outcome, ResponseWriter};
pub use service::{AppService, ServiceBuilder};
