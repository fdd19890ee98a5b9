//! # dispatchkit
//!
//! **dispatchkit** is the request-dispatch core of an embedded HTTP server. It takes
//! fully materialized requests from a transport layer, resolves them against an
//! immutable route table, runs them through an ordered asynchronous middleware
//! chain, enforces per-endpoint security rules, and turns every result or failure
//! into a well-formed response with an RFC 9457 problem body on errors.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - **[`router`]** - Route templates (`/items/:id`), the path matcher and the route table
//! - **[`dispatcher`]** - Request context, handler contract and the terminal security gate
//! - **[`middleware`]** - The middleware chain plus tracing, metrics and auth middleware
//! - **[`security`]** - Security policies, the rule side table and principal providers
//! - **[`problem`]** - Problem details model and the error translator
//! - **[`server`]** - Service assembly, request/response types and the response writer
//! - **[`config`]** - TOML and environment configuration
//! - **[`logging`]** - `tracing` subscriber setup
//! - **[`cli`]** - The `dispatchkit-probe` command line
//!
//! ### Request Flow
//!
//! ```text
//! HttpRequest
//!   -> RouteTable::resolve (method + path matcher, registration order)
//!        no match -> 404 problem, no middleware runs
//!   -> RequestContext (path params, query, headers, body, attributes)
//!   -> MiddlewareChain: link 1 -> link 2 -> ... -> Dispatcher
//!        Dispatcher: security rule check -> route handler
//!   <- DispatchResult travels back through the links in reverse order
//!   -> ErrorTranslator (Err -> ProblemDetails)
//!   -> ResponseWriter (content-length, keep-alive) -> HttpResponse
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use dispatchkit::dispatcher::{DispatchResult, HandlerResponse, RequestContext};
//! use dispatchkit::middleware::TracingMiddleware;
//! use dispatchkit::security::SecurityPolicy;
//! use dispatchkit::server::{AppService, HttpRequest};
//! use http::Method;
//! use serde_json::json;
//!
//! async fn get_item(ctx: RequestContext) -> DispatchResult {
//!     Ok(HandlerResponse::ok_json(json!({ "id": ctx.path_param("id") })))
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let mut builder = AppService::builder();
//! builder.middleware(Arc::new(TracingMiddleware));
//! builder.register(Method::GET, "/items/:id", SecurityPolicy::PermitAll, get_item)?;
//! let service = builder.build()?;
//!
//! let response = service.handle(HttpRequest::new(Method::GET, "/items/42")).await;
//! assert_eq!(response.status, 200);
//! assert_eq!(response.json()?["id"], "42");
//! # Ok(())
//! # }
//! ```
//!
//! ## Failures
//!
//! | Failure | Status | Problem type |
//! |---------|--------|--------------|
//! | No route matched | 404 | `{base}/not-found` |
//! | Security rule denied (or no rule) | 403 | `{base}/forbidden` |
//! | Handler-declared problem | from the problem | from the problem |
//! | Any other error or panic | 500 | `{base}/internal-error` |
//!
//! Internal failure messages are logged with the request id and never sent to
//! the client; the problem body carries the request id as `traceId` instead.

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod echo;
pub mod error;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod problem;
pub mod router;
pub mod security;
pub mod server;

pub use config::DispatchConfig;
pub use dispatcher::{DispatchResult, Handler, HandlerResponse, Payload, RequestContext};
pub use error::{ConfigError, DispatchError};
pub use problem::{Problem, ProblemDetails};
pub use security::SecurityPolicy;
pub use server::{AppService, HttpRequest, HttpResponse, ServiceBuilder};
