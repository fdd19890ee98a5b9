//! # Router Module
//!
//! The router module provides path matching and route resolution for dispatchkit.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Parsing route templates such as `/users/:user_id/posts/:post_id`
//! - Building an immutable routing table from explicit registrations
//! - Matching incoming requests to registered routes
//! - Extracting path parameters in template declaration order
//!
//! ## Architecture
//!
//! The router uses a two-phase approach:
//!
//! 1. **Registration**: At startup each `register(method, template, policy, handler)`
//!    call parses the template into literal and placeholder segments and appends an
//!    entry. Duplicate `(method, template)` pairs are rejected.
//!
//! 2. **Resolution**: For each incoming request the table is scanned in
//!    registration order. Static templates are compared by string equality; the
//!    rest go through the segment matcher. The first match wins, so registration
//!    order is significant.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use dispatchkit::dispatcher::{DispatchResult, HandlerResponse, RequestContext};
//! use dispatchkit::router::RouteTable;
//! use dispatchkit::security::SecurityPolicy;
//! use http::Method;
//!
//! async fn get_pet(_ctx: RequestContext) -> DispatchResult {
//!     Ok(HandlerResponse::no_content())
//! }
//!
//! let mut builder = RouteTable::builder();
//! builder
//!     .register(Method::GET, "/pets/:id", SecurityPolicy::PermitAll, Arc::new(get_pet))
//!     .unwrap();
//! let table = builder.build();
//!
//! let m = table.resolve(&Method::GET, "/pets/123?verbose=1").unwrap();
//! assert_eq!(m.get_path_param("id"), Some("123"));
//! assert!(table.resolve(&Method::GET, "/pets").is_none());
//! ```
//!
//! ## Performance
//!
//! Resolution is a linear scan over the entries of the request method with
//! pre-split templates: no regex compilation, no allocation for up to eight
//! path parameters.

mod core;
mod matcher;

pub use core::{RouteEntry, RouteKey, RouteMatch, RouteTable, RouteTableBuilder};
pub use matcher::{
    match_path, ParamVec, PathMatch, RouteTemplate, MAX_INLINE_PARAMS, PLACEHOLDER_MARKER,
};
