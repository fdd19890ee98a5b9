#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dispatchkit::dispatcher::{DispatchResult, Handler, HandlerResponse, RequestContext};
use dispatchkit::error::DispatchError;
use dispatchkit::middleware::{Middleware, Next};
use futures::future::BoxFuture;
use serde_json::json;

/// Shared, ordered log of what ran.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Middleware that records entry and exit around delegation.
pub struct Recorder {
    pub name: &'static str,
    pub log: CallLog,
}

impl Middleware for Recorder {
    fn handle(&self, ctx: RequestContext, next: Next) -> BoxFuture<'_, DispatchResult> {
        Box::pin(async move {
            self.log.push(format!("{}:before", self.name));
            let result = next.run(ctx).await;
            self.log.push(format!("{}:after", self.name));
            result
        })
    }
}

/// Handler that counts invocations and answers 200 with its path params.
#[derive(Clone, Default)]
pub struct CountingHandler {
    pub calls: Arc<AtomicUsize>,
}

impl CountingHandler {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Handler for CountingHandler {
    fn call(&self, ctx: RequestContext) -> dispatchkit::dispatcher::HandlerFuture {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let params: serde_json::Map<String, serde_json::Value> = ctx
            .path_params()
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect();
        Box::pin(async move {
            Ok::<_, DispatchError>(HandlerResponse::ok_json(json!({ "params": params })))
        })
    }
}

pub async fn ok_handler(_ctx: RequestContext) -> DispatchResult {
    Ok(HandlerResponse::text(200, "ok"))
}
