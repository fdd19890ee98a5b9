//! Dispatcher core module - handler contract and the terminal route endpoint.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use super::context::{HeaderVec, RequestContext};
use crate::error::DispatchError;
use crate::security::{AccessDecision, PrincipalProvider, SecurityRuleSet};

/// Result of a middleware link or a handler.
pub type DispatchResult = Result<HandlerResponse, DispatchError>;

/// Boxed future returned by handlers and middleware.
pub type HandlerFuture = BoxFuture<'static, DispatchResult>;

/// Success payload together with the hint for how to serialize it.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// No body; `content-length: 0`
    Empty,
    /// Serialized with `serde_json`, `application/json`
    Json(Value),
    /// UTF-8 text, `text/plain; charset=utf-8`
    Text(String),
    /// Raw bytes with an explicit content type
    Binary { content_type: String, bytes: Bytes },
}

impl Payload {
    /// Content type the payload will be written with, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        match self {
            Payload::Empty => None,
            Payload::Json(_) => Some("application/json"),
            Payload::Text(_) => Some("text/plain; charset=utf-8"),
            Payload::Binary { content_type, .. } => Some(content_type),
        }
    }
}

/// Successful response produced by a handler or a short-circuiting middleware.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResponse {
    /// HTTP status code (200, 201, 204, ...)
    pub status: u16,
    /// Extra response headers (stack-allocated for ≤16 headers)
    pub headers: HeaderVec,
    pub payload: Payload,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, payload: Payload) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            payload,
        }
    }

    /// 200 with a JSON body.
    #[must_use]
    pub fn ok_json(body: Value) -> Self {
        Self::new(200, Payload::Json(body))
    }

    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        Self::new(status, Payload::Json(body))
    }

    /// Serialize any `Serialize` value as the JSON body.
    ///
    /// # Errors
    ///
    /// Serialization failures are internal errors.
    pub fn json_of<T: Serialize>(status: u16, body: &T) -> Result<Self, DispatchError> {
        Ok(Self::json(status, serde_json::to_value(body)?))
    }

    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, Payload::Text(body.into()))
    }

    #[must_use]
    pub fn bytes(status: u16, content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self::new(
            status,
            Payload::Binary {
                content_type: content_type.into(),
                bytes: bytes.into(),
            },
        )
    }

    /// 204 with no body.
    #[must_use]
    pub fn no_content() -> Self {
        Self::new(204, Payload::Empty)
    }

    /// Get a header by name
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header (case-insensitive).
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }
}

/// Endpoint logic: turns a request context into a response, asynchronously.
///
/// Implemented for every `Fn(RequestContext) -> impl Future<Output = DispatchResult>`,
/// so plain `async fn` items register directly:
///
/// ```rust
/// use dispatchkit::dispatcher::{DispatchResult, HandlerResponse, RequestContext};
/// use serde_json::json;
///
/// async fn get_item(ctx: RequestContext) -> DispatchResult {
///     Ok(HandlerResponse::ok_json(json!({ "id": ctx.path_param("id") })))
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: RequestContext) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DispatchResult> + Send + 'static,
{
    fn call(&self, ctx: RequestContext) -> HandlerFuture {
        Box::pin(self(ctx))
    }
}

/// Terminal link of the service's middleware chain.
///
/// Runs the security gate for the route the context was resolved to and, when
/// access is granted, invokes that route's handler. This is the only place the
/// security rules are evaluated.
pub struct Dispatcher {
    rules: Arc<SecurityRuleSet>,
    principals: Arc<dyn PrincipalProvider>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(rules: Arc<SecurityRuleSet>, principals: Arc<dyn PrincipalProvider>) -> Self {
        Self { rules, principals }
    }

    #[must_use]
    pub fn rules(&self) -> &SecurityRuleSet {
        &self.rules
    }
}

impl Handler for Dispatcher {
    fn call(&self, mut ctx: RequestContext) -> HandlerFuture {
        let Some(entry) = ctx.route().cloned() else {
            // Contexts reach the dispatcher only after routing; anything else is a wiring bug.
            error!(
                request_id = %ctx.request_id(),
                method = %ctx.method(),
                path = %ctx.path(),
                "Context reached dispatcher without a resolved route"
            );
            return Box::pin(futures::future::ready(Err(DispatchError::Internal(
                anyhow::anyhow!("request context has no resolved route"),
            ))));
        };

        let principal = match ctx.principal() {
            Some(p) => p.clone(),
            None => {
                let p = self.principals.resolve(&ctx);
                ctx.set_principal(p.clone());
                p
            }
        };

        let decision = self
            .rules
            .evaluate(entry.method(), entry.template(), &principal);
        if let AccessDecision::Deny(reason) = decision {
            return Box::pin(futures::future::ready(Err(DispatchError::Forbidden {
                method: ctx.method().clone(),
                path: ctx.path().to_string(),
                reason: reason.to_string(),
            })));
        }

        let request_id = ctx.request_id();
        debug!(
            request_id = %request_id,
            method = %entry.method(),
            route_pattern = %entry.template(),
            "Request dispatched to handler"
        );

        let fut = entry.handler().call(ctx);
        Box::pin(async move {
            let start = Instant::now();
            let result = fut.await;
            let elapsed_us = start.elapsed().as_micros() as u64;
            match &result {
                Ok(resp) => info!(
                    request_id = %request_id,
                    route_pattern = %entry.template(),
                    status = resp.status,
                    duration_us = elapsed_us,
                    "Handler execution complete"
                ),
                Err(err) => info!(
                    request_id = %request_id,
                    route_pattern = %entry.template(),
                    error_kind = err.kind(),
                    duration_us = elapsed_us,
                    "Handler execution failed"
                ),
            }
            result
        })
    }
}
