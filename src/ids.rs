//! Request identifiers.
//!
//! Every request gets a [`RequestId`]. A trusted upstream may supply one in
//! the `x-request-id` header; the service reuses it when it is a valid ULID
//! and answers with the id it actually used, so client reports and log lines
//! can be joined.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::server::HttpRequest;

/// Header carrying the request id in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// ULID-backed request identifier; sorts by creation time.
///
/// Serialized as its 26-character Crockford base32 text.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequestId(Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Id for an inbound request: the `x-request-id` value when it parses,
    /// a fresh id otherwise.
    #[must_use]
    pub fn for_request(req: &HttpRequest) -> Self {
        Self::parse_or_new(req.get_header(REQUEST_ID_HEADER))
    }

    #[must_use]
    pub fn parse_or_new(candidate: Option<&str>) -> Self {
        candidate
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or_else(Self::new)
    }

    /// Milliseconds since the Unix epoch at which the id was minted.
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        self.0.timestamp_ms()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

impl TryFrom<String> for RequestId {
    type Error = ulid::DecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.to_string()
    }
}
