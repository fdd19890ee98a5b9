#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use dispatchkit::dispatcher::{DispatchResult, HandlerResponse, Payload, RequestContext};
use dispatchkit::error::{ConfigError, DispatchError};
use dispatchkit::middleware::{
    AuthMiddleware, MetricsMiddleware, Middleware, MiddlewareChain, Next, TracingMiddleware,
};
use dispatchkit::problem::Problem;
use futures::future::BoxFuture;
use http::Method;
use serde_json::json;

mod common;
use common::{CallLog, CountingHandler, Recorder};

fn ctx() -> RequestContext {
    RequestContext::builder(Method::GET, "/items/42")
        .path_param("id", "42")
        .build()
}

fn recorder(name: &'static str, log: &CallLog) -> Arc<dyn Middleware> {
    Arc::new(Recorder {
        name,
        log: log.clone(),
    })
}

/// Answers on its own without delegating.
struct ShortCircuit {
    log: CallLog,
}

impl Middleware for ShortCircuit {
    fn handle(&self, _ctx: RequestContext, _next: Next) -> BoxFuture<'_, DispatchResult> {
        self.log.push("short:answered");
        Box::pin(async { Ok::<_, DispatchError>(HandlerResponse::json(202, json!({ "cached": true }))) })
    }
}

/// Delegates, then rewrites the status and adds a header.
struct Rewrite;

impl Middleware for Rewrite {
    fn handle(&self, ctx: RequestContext, next: Next) -> BoxFuture<'_, DispatchResult> {
        Box::pin(async move {
            let mut resp = next.run(ctx).await?;
            resp.status = 203;
            resp.set_header("x-rewritten", "yes");
            Ok(resp)
        })
    }
}

/// Fails without delegating.
struct Reject;

impl Middleware for Reject {
    fn handle(&self, _ctx: RequestContext, _next: Next) -> BoxFuture<'_, DispatchResult> {
        let err = DispatchError::from(Problem::new(429).with_detail("slow down"));
        Box::pin(async move { Err::<HandlerResponse, _>(err) })
    }
}

struct PanicsBeforeFuture;

impl Middleware for PanicsBeforeFuture {
    fn handle(&self, _ctx: RequestContext, _next: Next) -> BoxFuture<'_, DispatchResult> {
        panic!("boom while building the future");
    }
}

struct PanicsWhilePolled;

impl Middleware for PanicsWhilePolled {
    fn handle(&self, ctx: RequestContext, next: Next) -> BoxFuture<'_, DispatchResult> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            if ctx.path().starts_with('/') {
                panic!("boom while polled");
            }
            next.run(ctx).await
        })
    }
}

/// Hands data to the handler through the attribute bag.
#[derive(Clone, Debug, PartialEq)]
struct Tenant(&'static str);

struct TenantMiddleware;

impl Middleware for TenantMiddleware {
    fn handle(&self, mut ctx: RequestContext, next: Next) -> BoxFuture<'_, DispatchResult> {
        ctx.insert_attribute(Tenant("acme"));
        next.run(ctx)
    }
}

#[tokio::test]
async fn test_links_run_fifo_and_unwind_in_reverse() {
    let log = CallLog::default();
    let handler = CountingHandler::default();
    let chain = MiddlewareChain::builder()
        .add_middleware(recorder("a", &log))
        .add_middleware(recorder("b", &log))
        .add_middleware(recorder("c", &log))
        .terminal(Arc::new(handler.clone()))
        .build()
        .unwrap();

    let resp = chain.execute(ctx()).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(handler.count(), 1);
    assert_eq!(
        log.entries(),
        vec!["a:before", "b:before", "c:before", "c:after", "b:after", "a:after"]
    );
}

#[tokio::test]
async fn test_short_circuit_skips_downstream() {
    let log = CallLog::default();
    let handler = CountingHandler::default();
    let chain = MiddlewareChain::builder()
        .add_middleware(recorder("outer", &log))
        .add_middleware(Arc::new(ShortCircuit { log: log.clone() }))
        .add_middleware(recorder("inner", &log))
        .terminal(Arc::new(handler.clone()))
        .build()
        .unwrap();

    let resp = chain.execute(ctx()).await.unwrap();
    assert_eq!(resp, HandlerResponse::json(202, json!({ "cached": true })));
    assert_eq!(handler.count(), 0);
    assert_eq!(
        log.entries(),
        vec!["outer:before", "short:answered", "outer:after"]
    );
}

#[tokio::test]
async fn test_delegate_then_transform() {
    let chain = MiddlewareChain::builder()
        .add_middleware(Arc::new(Rewrite))
        .terminal(Arc::new(CountingHandler::default()))
        .build()
        .unwrap();
    let resp = chain.execute(ctx()).await.unwrap();
    assert_eq!(resp.status, 203);
    assert_eq!(resp.get_header("X-Rewritten"), Some("yes"));
    assert_eq!(resp.payload, Payload::Json(json!({ "params": { "id": "42" } })));
}

#[tokio::test]
async fn test_failure_stops_the_chain() {
    let log = CallLog::default();
    let handler = CountingHandler::default();
    let chain = MiddlewareChain::builder()
        .add_middleware(recorder("outer", &log))
        .add_middleware(Arc::new(Reject))
        .add_middleware(recorder("never", &log))
        .terminal(Arc::new(handler.clone()))
        .build()
        .unwrap();

    let err = chain.execute(ctx()).await.unwrap_err();
    assert_eq!(err.status(), 429);
    assert_eq!(handler.count(), 0);
    assert_eq!(log.entries(), vec!["outer:before", "outer:after"]);
}

#[tokio::test]
async fn test_empty_chain_resolves_to_terminal() {
    let handler = CountingHandler::default();
    let chain = MiddlewareChain::builder()
        .terminal(Arc::new(handler.clone()))
        .build()
        .unwrap();
    assert!(chain.is_empty());
    let resp = chain.execute(ctx()).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(handler.count(), 1);
}

#[test]
fn test_missing_terminal_is_a_config_error() {
    let err = MiddlewareChain::builder()
        .add_middleware(Arc::new(Rewrite))
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::MissingTerminalHandler));
}

#[tokio::test]
async fn test_sync_panic_in_middleware_becomes_error() {
    let log = CallLog::default();
    let handler = CountingHandler::default();
    let chain = MiddlewareChain::builder()
        .add_middleware(recorder("outer", &log))
        .add_middleware(Arc::new(PanicsBeforeFuture))
        .terminal(Arc::new(handler.clone()))
        .build()
        .unwrap();

    let err = chain.execute(ctx()).await.unwrap_err();
    assert!(matches!(err, DispatchError::Panicked(ref m) if m.contains("building the future")));
    assert_eq!(handler.count(), 0);
    assert_eq!(log.entries(), vec!["outer:before", "outer:after"]);
}

#[tokio::test]
async fn test_async_panic_in_middleware_becomes_error() {
    let chain = MiddlewareChain::builder()
        .add_middleware(Arc::new(PanicsWhilePolled))
        .terminal(Arc::new(CountingHandler::default()))
        .build()
        .unwrap();
    let err = chain.execute(ctx()).await.unwrap_err();
    assert_eq!(err.kind(), "panic");
    assert_eq!(err.status(), 500);
}

async fn panicking_handler(_ctx: RequestContext) -> DispatchResult {
    panic!("handler exploded");
}

#[tokio::test]
async fn test_handler_panic_becomes_error() {
    let chain = MiddlewareChain::builder()
        .add_middleware(Arc::new(TracingMiddleware))
        .terminal(Arc::new(panicking_handler))
        .build()
        .unwrap();
    let err = chain.execute(ctx()).await.unwrap_err();
    assert!(matches!(err, DispatchError::Panicked(ref m) if m == "handler exploded"));
}

async fn tenant_handler(ctx: RequestContext) -> DispatchResult {
    let tenant = ctx.attribute::<Tenant>().cloned();
    Ok(HandlerResponse::text(200, tenant.map_or("none", |t| t.0)))
}

#[tokio::test]
async fn test_attributes_flow_to_handler() {
    let chain = MiddlewareChain::builder()
        .add_middleware(Arc::new(TenantMiddleware))
        .terminal(Arc::new(tenant_handler))
        .build()
        .unwrap();
    let resp = chain.execute(ctx()).await.unwrap();
    assert_eq!(resp.payload, Payload::Text("acme".to_string()));
}

#[tokio::test]
async fn test_chain_is_reusable_across_concurrent_requests() {
    let handler = CountingHandler::default();
    let chain = MiddlewareChain::builder()
        .add_middleware(Arc::new(Rewrite))
        .terminal(Arc::new(handler.clone()))
        .build()
        .unwrap();

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let chain = chain.clone();
            tokio::spawn(async move {
                let ctx = RequestContext::builder(Method::GET, format!("/items/{i}"))
                    .path_param("id", i.to_string())
                    .build();
                chain.execute(ctx).await
            })
        })
        .collect();
    for (i, task) in tasks.into_iter().enumerate() {
        let resp = task.await.unwrap().unwrap();
        assert_eq!(resp.status, 203);
        assert_eq!(
            resp.payload,
            Payload::Json(json!({ "params": { "id": i.to_string() } }))
        );
    }
    assert_eq!(handler.count(), 32);
}

#[tokio::test]
async fn test_auth_middleware_short_circuits() {
    let handler = CountingHandler::default();
    let chain = MiddlewareChain::builder()
        .add_middleware(Arc::new(AuthMiddleware::new("Bearer secret")))
        .terminal(Arc::new(handler.clone()))
        .build()
        .unwrap();

    let err = chain.execute(ctx()).await.unwrap_err();
    assert_eq!(err.status(), 401);
    assert_eq!(handler.count(), 0);

    let authorized = RequestContext::builder(Method::GET, "/items/1")
        .header("Authorization", "Bearer secret")
        .build();
    assert!(chain.execute(authorized).await.is_ok());
    assert_eq!(handler.count(), 1);
}

async fn slow_handler(_ctx: RequestContext) -> DispatchResult {
    tokio::time::sleep(Duration::from_millis(5)).await;
    Ok(HandlerResponse::no_content())
}

#[tokio::test]
async fn test_metrics_middleware_counts() {
    let metrics = Arc::new(MetricsMiddleware::new());
    let chain = MiddlewareChain::builder()
        .add_middleware(Arc::clone(&metrics) as Arc<dyn Middleware>)
        .terminal(Arc::new(slow_handler))
        .build()
        .unwrap();

    for _ in 0..3 {
        chain.execute(ctx()).await.unwrap();
    }
    assert_eq!(metrics.request_count(), 3);
    assert_eq!(metrics.status_class_count(2), 3);
    assert!(metrics.average_latency() >= Duration::from_millis(5));

    let failing = MiddlewareChain::builder()
        .add_middleware(Arc::clone(&metrics) as Arc<dyn Middleware>)
        .add_middleware(Arc::new(Reject))
        .terminal(Arc::new(slow_handler))
        .build()
        .unwrap();
    failing.execute(ctx()).await.unwrap_err();
    assert_eq!(metrics.request_count(), 4);
    assert_eq!(metrics.status_class_count(4), 1);
    assert_eq!(chain.names(), vec!["metrics"]);
}
