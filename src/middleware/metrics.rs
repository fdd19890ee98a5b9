use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;

use super::{Middleware, Next};
use crate::dispatcher::{DispatchResult, RequestContext};
use crate::error::DispatchError;

/// Middleware collecting request statistics.
///
/// All counters use atomic operations for thread-safe updates without locks.
/// Register it as an `Arc<MetricsMiddleware>` and keep a clone to read the
/// counters.
///
/// Metrics collected:
/// - Total request count
/// - Average latency (time spent in the rest of the chain)
/// - Responses per status class (1xx to 5xx)
/// - Requests denied by the security gate
#[derive(Debug, Default)]
pub struct MetricsMiddleware {
    request_count: AtomicUsize,
    total_latency_ns: AtomicU64,
    status_classes: [AtomicUsize; 5],
    forbidden: AtomicUsize,
}

impl MetricsMiddleware {
    /// Create a new metrics middleware with all counters initialized to zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the total number of requests that entered this link
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Calculate the average request latency
    ///
    /// Returns zero duration if no requests have been processed yet.
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    /// Responses seen for a status class, given as its leading digit (`2` for 2xx).
    ///
    /// Failures are counted under the status they will be answered with.
    pub fn status_class_count(&self, class: u16) -> usize {
        match class {
            1..=5 => self.status_classes[usize::from(class - 1)].load(Ordering::Relaxed),
            _ => 0,
        }
    }

    /// Get the total number of requests denied by a security rule
    pub fn forbidden_count(&self) -> usize {
        self.forbidden.load(Ordering::Relaxed)
    }

    fn record(&self, result: &DispatchResult, latency: Duration) {
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        let status = match result {
            Ok(resp) => resp.status,
            Err(err) => {
                if matches!(err, DispatchError::Forbidden { .. }) {
                    self.forbidden.fetch_add(1, Ordering::Relaxed);
                }
                err.status()
            }
        };
        if let 100..=599 = status {
            self.status_classes[usize::from(status / 100 - 1)].fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Middleware for MetricsMiddleware {
    fn handle(&self, ctx: RequestContext, next: Next) -> BoxFuture<'_, DispatchResult> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        Box::pin(async move {
            let start = Instant::now();
            let result = next.run(ctx).await;
            self.record(&result, start.elapsed());
            result
        })
    }

    fn name(&self) -> &'static str {
        "metrics"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::HandlerResponse;
    use http::Method;

    #[test]
    fn test_record_classifies_statuses() {
        let m = MetricsMiddleware::new();
        m.record(&Ok(HandlerResponse::no_content()), Duration::from_millis(2));
        m.record(
            &Err(DispatchError::Forbidden {
                method: Method::GET,
                path: "/x".into(),
                reason: "no rule".into(),
            }),
            Duration::from_millis(4),
        );
        assert_eq!(m.status_class_count(2), 1);
        assert_eq!(m.status_class_count(4), 1);
        assert_eq!(m.status_class_count(5), 0);
        assert_eq!(m.status_class_count(9), 0);
        assert_eq!(m.forbidden_count(), 1);
    }

    #[test]
    fn test_average_latency_without_requests_is_zero() {
        assert_eq!(MetricsMiddleware::new().average_latency(), Duration::ZERO);
    }
}
