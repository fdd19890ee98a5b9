//! # Middleware Module
//!
//! Cross-cutting request handling composed as an ordered chain.
//!
//! A [`MiddlewareChain`] is an immutable sequence of [`Middleware`] links that
//! ends in one terminal handler. Executing the chain starts a private [`Next`]
//! cursor at the first link; each link either delegates by calling
//! `next.run(ctx)` or answers on its own. Results travel back through the
//! links that delegated, in reverse order.
//!
//! A failure (an `Err` result or a panic) from any link resolves the whole
//! execution; links that were never reached do not run.
//!
//! ## Built-in middleware
//!
//! - [`TracingMiddleware`] - request span with status and latency
//! - [`MetricsMiddleware`] - lock-free counters
//! - [`AuthMiddleware`] - shared-token gate that short-circuits with 401

mod auth;
mod core;
mod metrics;
mod tracing;

pub use self::auth::AuthMiddleware;
pub use self::core::{Middleware, MiddlewareChain, MiddlewareChainBuilder, Next};
pub use self::metrics::MetricsMiddleware;
pub use self::tracing::TracingMiddleware;
