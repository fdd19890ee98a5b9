use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Version};
use tracing::debug;

use crate::dispatcher::{HeaderVec, QueryParams};

/// A fully materialized request as handed over by the transport layer.
///
/// Framing, body aggregation and idle timeouts happen before this value
/// exists; the service only reads it.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Request target: path plus optional `?query`
    pub target: String,
    pub version: Version,
    /// Header names as received; lookups are case-insensitive
    pub headers: HeaderVec,
    pub body: Bytes,
    /// Remote address, when the transport knows it
    pub peer: Option<SocketAddr>,
}

impl HttpRequest {
    /// An HTTP/1.1 request with no headers and an empty body.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            version: Version::HTTP_11,
            headers: HeaderVec::new(),
            body: Bytes::new(),
            peer: None,
        }
    }

    /// Build from the raw method token of a request line.
    ///
    /// The token is upper-cased first, so `get` and `GET` are the same method.
    ///
    /// # Errors
    ///
    /// Returns the `http` crate error when the token is not a valid method.
    pub fn from_parts(
        method: &str,
        target: impl Into<String>,
    ) -> Result<Self, http::method::InvalidMethod> {
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())?;
        Ok(Self::new(method, target))
    }

    #[must_use]
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Path without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        self.target
            .split_once('?')
            .map_or(self.target.as_str(), |(p, _)| p)
    }

    /// Raw query string without the leading `?`.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, q)| q)
    }

    /// Decoded query parameters.
    #[must_use]
    pub fn query_params(&self) -> QueryParams {
        let params = self.query().map(QueryParams::parse).unwrap_or_default();
        debug!(
            param_count = params.len(),
            query_params = ?params,
            "Query params parsed"
        );
        params
    }

    /// Get a header by name (case-insensitive per RFC 9110)
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the client asked for the connection to stay open.
    ///
    /// HTTP/1.1 and later default to keep-alive unless `connection: close` is
    /// sent; HTTP/1.0 keeps the connection only with `connection: keep-alive`.
    #[must_use]
    pub fn keep_alive(&self) -> bool {
        let has_token = |token: &str| {
            self.get_header("connection").is_some_and(|v| {
                v.split(',')
                    .any(|t| t.trim().eq_ignore_ascii_case(token))
            })
        };
        match self.version {
            Version::HTTP_09 => false,
            Version::HTTP_10 => has_token("keep-alive"),
            _ => !has_token("close"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_token_is_upper_cased() {
        let req = HttpRequest::from_parts("post", "/orders").unwrap();
        assert_eq!(req.method, Method::POST);
        assert!(HttpRequest::from_parts("BAD METHOD", "/").is_err());
    }

    #[test]
    fn test_target_split() {
        let req = HttpRequest::new(Method::GET, "/items?tag=a&tag=b");
        assert_eq!(req.path(), "/items");
        assert_eq!(req.query(), Some("tag=a&tag=b"));
        assert_eq!(req.query_params().get_all("tag").count(), 2);

        let bare = HttpRequest::new(Method::GET, "/items");
        assert_eq!(bare.query(), None);
        assert!(bare.query_params().is_empty());
    }

    #[test]
    fn test_keep_alive_rules() {
        let req = HttpRequest::new(Method::GET, "/");
        assert!(req.keep_alive());
        assert!(!req.clone().with_header("Connection", "close").keep_alive());
        assert!(!req
            .clone()
            .with_header("connection", "Upgrade, Close")
            .keep_alive());

        let old = HttpRequest::new(Method::GET, "/").with_version(Version::HTTP_10);
        assert!(!old.keep_alive());
        assert!(old.with_header("Connection", "Keep-Alive").keep_alive());
    }
}
