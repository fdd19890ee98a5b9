//! # Dispatcher Module
//!
//! The dispatcher module defines what flows through the middleware chain and
//! what sits at its end.
//!
//! ## Overview
//!
//! - [`RequestContext`] is the per-request carrier: request id, connection
//!   handle, path and query parameters, headers, raw body and a typed
//!   attribute bag that middleware use to hand data to handlers.
//! - [`Handler`] is the endpoint contract. Any
//!   `Fn(RequestContext) -> impl Future<Output = DispatchResult>` is a handler.
//! - [`HandlerResponse`] is the success side of a result; its [`Payload`]
//!   variant tells the response writer how to serialize it.
//! - [`Dispatcher`] is the terminal link of the service chain: it evaluates
//!   the security rule of the resolved route and then calls the route's handler.
//!
//! ## Request Flow
//!
//! 1. Router resolves the request to a route entry
//! 2. Service builds a `RequestContext` bound to that entry
//! 3. Middleware run in registration order, each delegating through `Next`
//! 4. `Dispatcher` checks the security rule, then awaits the handler
//! 5. The result travels back up the chain in reverse order
//!
//! ## Error Handling
//!
//! Handlers return `Err(DispatchError)` for anything that is not a success:
//! a `Problem` for deliberate 4xx answers, `Internal` for unexpected faults.
//! Panics are caught by the chain and reported as internal failures. Nothing
//! a handler does can escape past the service boundary.

mod context;
mod core;

pub use context::{
    ConnectionInfo, HeaderVec, QueryParams, RequestContext, RequestContextBuilder,
    MAX_INLINE_HEADERS,
};
pub use core::{DispatchResult, Dispatcher, Handler, HandlerFuture, HandlerResponse, Payload};
