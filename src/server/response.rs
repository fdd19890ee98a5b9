use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, warn};

use crate::config::HttpConfig;
use crate::dispatcher::{HandlerResponse, HeaderVec, Payload};
use crate::problem::{Problem, ProblemDetails, PROBLEM_CONTENT_TYPE};

/// Last-resort body used when a problem payload itself cannot be serialized.
const FALLBACK_PROBLEM_BODY: &[u8] =
    br#"{"title":"Internal Server Error","status":500,"detail":"response serialization failed"}"#;

/// Whether `status` can be written on an HTTP/1.1 status line.
#[must_use]
pub fn is_valid_status(status: u16) -> bool {
    (100..=599).contains(&status) && StatusCode::from_u16(status).is_ok()
}

/// What a request execution produced: a success payload or a problem.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(HandlerResponse),
    Problem(ProblemDetails),
}

impl Outcome {
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Outcome::Success(resp) => resp.status,
            Outcome::Problem(p) => p.status(),
        }
    }
}

impl From<HandlerResponse> for Outcome {
    fn from(resp: HandlerResponse) -> Self {
        Outcome::Success(resp)
    }
}

impl From<ProblemDetails> for Outcome {
    fn from(problem: ProblemDetails) -> Self {
        Outcome::Problem(problem)
    }
}

/// Protocol-level response: status, headers and a fully serialized body.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderVec,
    pub body: Bytes,
}

impl HttpResponse {
    /// Get a header by name (case-insensitive)
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

    /// Whether the connection stays open after this response is written.
    #[must_use]
    pub fn keep_alive(&self) -> bool {
        !self
            .get_header("connection")
            .is_some_and(|v| v.eq_ignore_ascii_case("close"))
    }

    /// Body parsed as JSON.
    ///
    /// # Errors
    ///
    /// Fails when the body is not JSON.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// HTTP/1.1 wire encoding: status line, headers, blank line, body.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let reason = StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("");
        let mut out = Vec::with_capacity(128 + self.body.len());
        out.extend_from_slice(format!("HTTP/1.1 {} {}\r\n", self.status, reason).as_bytes());
        for (name, value) in &self.headers {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

/// State of the connection after a response was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    KeepAlive,
    Closed,
}

/// Serializes outcomes into [`HttpResponse`]s and writes them out.
#[derive(Debug, Clone, Default)]
pub struct ResponseWriter {
    config: HttpConfig,
}

impl ResponseWriter {
    #[must_use]
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Serialize an outcome.
    ///
    /// The body is fully serialized before `content-length` is set.
    /// `keep_alive` is the client's wish; it is honored only when keep-alive
    /// is enabled in the configuration.
    #[must_use]
    pub fn render(&self, outcome: Outcome, keep_alive: bool) -> HttpResponse {
        let declared = outcome.status();
        if !is_valid_status(declared) {
            error!(status = declared, "Response status out of range, answering 500");
            let replacement = Problem::new(500).with_detail("The response status was invalid.");
            return self.render(Outcome::Problem(replacement.into()), keep_alive);
        }

        let (status, mut headers, content_type, body) = match outcome {
            Outcome::Success(resp) => {
                let content_type = resp.payload.content_type().map(str::to_string);
                match serialize_payload(resp.payload) {
                    Ok(body) => (resp.status, resp.headers, content_type, body),
                    Err(e) => {
                        error!(error = %e, status = resp.status, "Response serialization failed");
                        (
                            500,
                            HeaderVec::new(),
                            Some(PROBLEM_CONTENT_TYPE.to_string()),
                            Bytes::from_static(FALLBACK_PROBLEM_BODY),
                        )
                    }
                }
            }
            Outcome::Problem(problem) => {
                let body = problem.to_vec().map(Bytes::from).unwrap_or_else(|e| {
                    error!(error = %e, "Problem serialization failed");
                    Bytes::from_static(FALLBACK_PROBLEM_BODY)
                });
                (
                    problem.status(),
                    HeaderVec::new(),
                    Some(PROBLEM_CONTENT_TYPE.to_string()),
                    body,
                )
            }
        };

        // Framing headers belong to the writer.
        headers.retain(|(k, _)| {
            !["content-length", "connection", "keep-alive", "transfer-encoding"]
                .iter()
                .any(|h| k.eq_ignore_ascii_case(h))
        });
        if let Some(ct) = content_type {
            if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
                headers.push((Arc::from("content-type"), ct));
            }
        }
        headers.push((Arc::from("content-length"), body.len().to_string()));

        if keep_alive && self.config.keep_alive {
            headers.push((Arc::from("connection"), "keep-alive".to_string()));
            headers.push((
                Arc::from("keep-alive"),
                format!(
                    "timeout={}, max={}",
                    self.config.keep_alive_timeout_secs, self.config.max_requests
                ),
            ));
        } else {
            headers.push((Arc::from("connection"), "close".to_string()));
        }

        debug!(status, content_length = body.len(), "Response rendered");
        HttpResponse {
            status,
            headers,
            body,
        }
    }

    /// Write an encoded response to `io` and flush it.
    ///
    /// When the response does not keep the connection alive the stream is shut
    /// down, but only once the write has completed. Write failures are logged
    /// and reported as [`ConnectionState::Closed`]; they are never returned.
    pub async fn write<W>(&self, io: &mut W, response: &HttpResponse) -> ConnectionState
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let keep_alive = response.keep_alive();
        let bytes = response.encode();

        let result = async {
            io.write_all(&bytes).await?;
            io.flush().await?;
            if !keep_alive {
                io.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        }
        .await;

        match result {
            Ok(()) if keep_alive => ConnectionState::KeepAlive,
            Ok(()) => ConnectionState::Closed,
            Err(e) => {
                warn!(
                    status = response.status,
                    bytes = bytes.len(),
                    error = %e,
                    "Response write failed, closing connection"
                );
                ConnectionState::Closed
            }
        }
    }
}

fn serialize_payload(payload: Payload) -> Result<Bytes, serde_json::Error> {
    Ok(match payload {
        Payload::Empty => Bytes::new(),
        Payload::Json(value) => Bytes::from(serde_json::to_vec(&value)?),
        Payload::Text(text) => Bytes::from(text),
        Payload::Binary { bytes, .. } => bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    #[test]
    fn test_json_success_sets_framing_headers() {
        let writer = ResponseWriter::default();
        let resp = writer.render(
            Outcome::Success(HandlerResponse::ok_json(json!({"id": "42"}))),
            true,
        );
        assert_eq!(resp.status, 200);
        assert_eq!(resp.get_header("content-type"), Some("application/json"));
        assert_eq!(
            resp.get_header("content-length"),
            Some(resp.body.len().to_string().as_str())
        );
        assert_eq!(resp.get_header("connection"), Some("keep-alive"));
        assert_eq!(resp.get_header("keep-alive"), Some("timeout=5, max=1000"));
        assert_eq!(resp.json().unwrap(), json!({"id": "42"}));
    }

    #[test]
    fn test_problem_uses_problem_content_type() {
        let writer = ResponseWriter::default();
        let resp = writer.render(Outcome::Problem(Problem::new(404).into()), false);
        assert_eq!(resp.status, 404);
        assert_eq!(resp.get_header("content-type"), Some(PROBLEM_CONTENT_TYPE));
        assert_eq!(resp.get_header("connection"), Some("close"));
        assert!(!resp.keep_alive());
    }

    #[test]
    fn test_config_can_disable_keep_alive() {
        let writer = ResponseWriter::new(HttpConfig {
            keep_alive: false,
            ..HttpConfig::default()
        });
        let resp = writer.render(Outcome::Success(HandlerResponse::no_content()), true);
        assert_eq!(resp.get_header("connection"), Some("close"));
        assert_eq!(resp.get_header("content-length"), Some("0"));
        assert_eq!(resp.get_header("content-type"), None);
    }

    #[test]
    fn test_handler_cannot_override_framing() {
        let writer = ResponseWriter::default();
        let resp = writer.render(
            Outcome::Success(
                HandlerResponse::text(200, "hi")
                    .with_header("Content-Length", "999")
                    .with_header("x-extra", "1"),
            ),
            true,
        );
        assert_eq!(resp.get_header("content-length"), Some("2"));
        assert_eq!(resp.get_header("x-extra"), Some("1"));
    }

    #[test]
    fn test_out_of_range_status_is_replaced() {
        let writer = ResponseWriter::default();
        for outcome in [
            Outcome::Problem(Problem::new(42).into()),
            Outcome::Success(HandlerResponse::text(600, "late")),
        ] {
            let resp = writer.render(outcome, true);
            assert_eq!(resp.status, 500);
            assert_eq!(resp.get_header("content-type"), Some(PROBLEM_CONTENT_TYPE));
            assert!(resp.encode().starts_with(b"HTTP/1.1 500 Internal Server Error\r\n"));
        }
        assert!(is_valid_status(204));
        assert!(!is_valid_status(99));
    }

    #[test]
    fn test_encode_status_line() {
        let writer = ResponseWriter::default();
        let resp = writer.render(Outcome::Success(HandlerResponse::text(201, "ok")), false);
        let wire = String::from_utf8(resp.encode()).unwrap();
        assert!(wire.starts_with("HTTP/1.1 201 Created\r\n"));
        assert!(wire.ends_with("\r\n\r\nok"));
    }

    #[tokio::test]
    async fn test_write_keeps_or_closes() {
        let writer = ResponseWriter::default();
        let mut sink: Vec<u8> = Vec::new();
        let open = writer.render(Outcome::Success(HandlerResponse::no_content()), true);
        assert_eq!(writer.write(&mut sink, &open).await, ConnectionState::KeepAlive);
        assert_eq!(sink, open.encode());

        let mut sink: Vec<u8> = Vec::new();
        let close = writer.render(Outcome::Success(HandlerResponse::no_content()), false);
        assert_eq!(writer.write(&mut sink, &close).await, ConnectionState::Closed);
        assert_eq!(sink, close.encode());
    }

    struct BrokenPipe;

    impl AsyncWrite for BrokenPipe {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_write_failure_forces_close() {
        let writer = ResponseWriter::default();
        let resp = writer.render(Outcome::Success(HandlerResponse::no_content()), true);
        assert_eq!(
            writer.write(&mut BrokenPipe, &resp).await,
            ConnectionState::Closed
        );
    }
}
