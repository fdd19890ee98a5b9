use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{Extensions, Method};
use serde::de::DeserializeOwned;
use smallvec::SmallVec;

use crate::error::DispatchError;
use crate::ids::RequestId;
use crate::router::{ParamVec, RouteEntry, RouteMatch};
use crate::security::Principal;

/// Maximum inline headers before heap allocation.
/// Most requests have ≤16 headers.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage for the hot path.
///
/// Header names use `Arc<str>` so that repeated names (`content-type`,
/// `connection`) clone cheaply; values are per-request data.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// What this core knows about the connection a request arrived on.
///
/// The transport layer owns the socket; this is the handle it passes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionInfo {
    /// Remote address, when the transport knows it
    pub peer_addr: Option<SocketAddr>,
    /// Whether the connection should stay open after the response
    pub keep_alive: bool,
}

/// Decoded query string. A key may appear any number of times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Parse `a=1&b=x%20y&a=2` (no leading `?`) with form-urlencoded decoding.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        Self(
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )
    }

    /// First value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `name`.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Per-request state carried through the middleware chain into the handler.
///
/// A context is owned by exactly one request execution: it is moved into each
/// middleware and on into the handler, and dropped when the response is done.
/// Everything except the attribute bag and the attached principal is fixed at
/// construction time.
#[derive(Debug)]
pub struct RequestContext {
    request_id: RequestId,
    connection: ConnectionInfo,
    method: Method,
    path: String,
    path_params: ParamVec,
    query: QueryParams,
    headers: HeaderVec,
    body: Bytes,
    route: Option<Arc<RouteEntry>>,
    principal: Option<Principal>,
    attributes: Extensions,
}

impl RequestContext {
    /// Start building a context for `method path`. Intended for the service and for tests.
    #[must_use]
    pub fn builder(method: Method, path: impl Into<String>) -> RequestContextBuilder {
        RequestContextBuilder::new(method, path)
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionInfo {
        &self.connection
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Template of the matched route (e.g. `/items/:id`), if routing happened.
    #[must_use]
    pub fn route_pattern(&self) -> Option<&str> {
        self.route.as_ref().map(|r| r.template())
    }

    pub(crate) fn route(&self) -> Option<&Arc<RouteEntry>> {
        self.route.as_ref()
    }

    /// Path parameters in template declaration order.
    #[must_use]
    pub fn path_params(&self) -> &ParamVec {
        &self.path_params
    }

    /// Get a path parameter by name.
    #[inline]
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    /// First value of a query parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name)
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderVec {
        &self.headers
    }

    /// Get a header by name (case-insensitive per RFC 9110)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Raw body bytes as received.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// A malformed body is the caller's fault, so this fails with a 400 problem
    /// rather than an internal error.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, DispatchError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| DispatchError::bad_request(format!("request body is not valid JSON: {e}")))
    }

    /// Principal attached by a middleware or by the security gate.
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Attach the caller identity. The security gate uses it instead of asking
    /// the configured provider.
    pub fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }

    /// Typed attribute bag for middleware-to-handler communication.
    #[must_use]
    pub fn attributes(&self) -> &Extensions {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Extensions {
        &mut self.attributes
    }

    /// Convenience for `attributes().get::<T>()`.
    #[must_use]
    pub fn attribute<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.attributes.get::<T>()
    }

    /// Convenience for `attributes_mut().insert(value)`; returns the previous value.
    pub fn insert_attribute<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.attributes.insert(value)
    }
}

/// Builder for [`RequestContext`].
#[derive(Debug)]
pub struct RequestContextBuilder {
    request_id: Option<RequestId>,
    connection: ConnectionInfo,
    method: Method,
    path: String,
    path_params: ParamVec,
    query: QueryParams,
    headers: HeaderVec,
    body: Bytes,
    route: Option<Arc<RouteEntry>>,
}

impl RequestContextBuilder {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request_id: None,
            connection: ConnectionInfo::default(),
            method,
            path: path.into(),
            path_params: ParamVec::new(),
            query: QueryParams::default(),
            headers: HeaderVec::new(),
            body: Bytes::new(),
            route: None,
        }
    }

    #[must_use]
    pub fn request_id(mut self, id: RequestId) -> Self {
        self.request_id = Some(id);
        self
    }

    #[must_use]
    pub fn connection(mut self, connection: ConnectionInfo) -> Self {
        self.connection = connection;
        self
    }

    #[must_use]
    pub fn path_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.path_params.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn headers(mut self, headers: HeaderVec) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Bind the context to a resolved route, taking over its path parameters.
    #[must_use]
    pub fn route_match(mut self, matched: RouteMatch) -> Self {
        self.path_params = matched.path_params;
        self.route = Some(matched.entry);
        self
    }

    #[must_use]
    pub fn build(self) -> RequestContext {
        RequestContext {
            request_id: self.request_id.unwrap_or_default(),
            connection: self.connection,
            method: self.method,
            path: self.path,
            path_params: self.path_params,
            query: self.query,
            headers: self.headers,
            body: self.body,
            route: self.route,
            principal: None,
            attributes: Extensions::new(),
        }
    }
}
