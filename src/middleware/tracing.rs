use std::time::Instant;

use futures::future::BoxFuture;
use tracing::{field, info, info_span, warn, Instrument};

use super::{Middleware, Next};
use crate::dispatcher::{DispatchResult, RequestContext};

/// Opens a `request` span around the rest of the chain and records the
/// outcome on it.
///
/// Place it first so that every downstream log line carries the request id,
/// method and route pattern.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn handle(&self, ctx: RequestContext, next: Next) -> BoxFuture<'_, DispatchResult> {
        let span = info_span!(
            "request",
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            route_pattern = ctx.route_pattern().unwrap_or_default(),
            status = field::Empty,
            error_kind = field::Empty,
            latency_us = field::Empty,
        );
        let recorder = span.clone();

        Box::pin(
            async move {
                info!("Request received");
                let start = Instant::now();
                let result = next.run(ctx).await;
                let latency_us = start.elapsed().as_micros() as u64;

                recorder.record("latency_us", latency_us);
                match &result {
                    Ok(resp) => {
                        recorder.record("status", resp.status);
                        info!(status = resp.status, latency_us, "Request completed");
                    }
                    Err(err) => {
                        recorder.record("status", err.status());
                        recorder.record("error_kind", err.kind());
                        warn!(
                            status = err.status(),
                            error_kind = err.kind(),
                            latency_us,
                            "Request failed"
                        );
                    }
                }
                result
            }
            .instrument(span),
        )
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}
