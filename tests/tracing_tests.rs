#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io;
use std::sync::{Arc, Mutex};

use dispatchkit::dispatcher::{DispatchResult, RequestContext};
use dispatchkit::middleware::TracingMiddleware;
use dispatchkit::security::SecurityPolicy;
use dispatchkit::server::{AppService, HttpRequest};
use http::Method;
use serde_json::Value;
use tracing_subscriber::fmt::MakeWriter;

/// Collects everything the subscriber writes.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn lines(&self) -> Vec<Value> {
        let buf = self.0.lock().unwrap();
        String::from_utf8_lossy(&buf)
            .lines()
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = Captured;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

async fn fail(_ctx: RequestContext) -> DispatchResult {
    Err(anyhow::anyhow!("upstream timed out").into())
}

fn service() -> AppService {
    let mut builder = AppService::builder();
    builder.middleware(Arc::new(TracingMiddleware));
    builder
        .register(Method::GET, "/jobs/:id", SecurityPolicy::PermitAll, fail)
        .unwrap();
    builder.build().unwrap()
}

#[tokio::test]
async fn test_request_span_carries_route_and_outcome() {
    let captured = Captured::default();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_current_span(true)
        .with_writer(captured.clone())
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let resp = service()
        .handle(HttpRequest::new(Method::GET, "/jobs/17"))
        .await;
    assert_eq!(resp.status, 500);
    let request_id = resp.get_header("x-request-id").unwrap().to_string();

    let lines = captured.lines();
    let failed = lines
        .iter()
        .find(|l| l["fields"]["message"] == "Request failed")
        .expect("failure line");
    assert_eq!(failed["fields"]["error_kind"], "internal");
    assert_eq!(failed["span"]["route_pattern"], "/jobs/:id");
    assert_eq!(failed["span"]["request_id"], request_id.as_str());

    // The real cause is logged even though the client never sees it.
    assert!(lines.iter().any(|l| l["fields"]["error"]
        .as_str()
        .is_some_and(|e| e.contains("upstream timed out"))));
}
