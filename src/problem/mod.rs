//! # Problem Details
//!
//! Standardized machine-readable error bodies in the shape of RFC 9457:
//!
//! ```json
//! { "type": "...", "title": "...", "status": 404, "detail": "...", "instance": "/items/9" }
//! ```
//!
//! Members without a value are omitted from the wire form rather than written
//! as `null`. Extension members are flattened next to the standard ones.
//!
//! [`ProblemDetails`] is either a single [`Problem`] or a list of them; the
//! list form serializes as `{"status": <first status or 500>, "problems": [...]}`.
//! The [`ErrorTranslator`] turns every [`DispatchError`](crate::error::DispatchError)
//! into exactly one `ProblemDetails`.

mod translator;

pub use translator::ErrorTranslator;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Content type for serialized problem bodies.
pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// Default base for the problem type URIs minted by this crate.
pub const DEFAULT_TYPE_BASE: &str = "https://dispatchkit.dev/problems";

/// RFC 9457 default when a problem carries no `type`.
pub const ABOUT_BLANK: &str = "about:blank";

const RESERVED_MEMBERS: [&str; 5] = ["type", "title", "status", "detail", "instance"];

/// A single problem occurrence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl Problem {
    /// A problem with `status` set and `title` defaulted to the canonical reason phrase.
    #[must_use]
    pub fn new(status: u16) -> Self {
        let title = http::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .map(str::to_string);
        Self {
            status: Some(status),
            title,
            ..Self::default()
        }
    }

    /// Shorthand for a handler-declared validation failure (400).
    #[must_use]
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(400).with_detail(detail)
    }

    #[must_use]
    pub fn with_type(mut self, type_uri: impl Into<String>) -> Self {
        self.type_uri = Some(type_uri.into());
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    #[must_use]
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Attach an extension member. Names of the standard members are ignored.
    #[must_use]
    pub fn with_extension(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        if !RESERVED_MEMBERS.contains(&name.as_str()) {
            self.extensions.insert(name, value.into());
        }
        self
    }

    /// Effective status: the declared one, or 500.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.unwrap_or(500)
    }

    /// Effective type: the declared one, or `about:blank`.
    #[must_use]
    pub fn type_or_blank(&self) -> &str {
        self.type_uri.as_deref().unwrap_or(ABOUT_BLANK)
    }
}

/// Either one problem or several; never both.
#[derive(Debug, Clone, PartialEq)]
pub enum ProblemDetails {
    Single(Problem),
    Multiple(Vec<Problem>),
}

impl ProblemDetails {
    /// HTTP status for this payload.
    ///
    /// For the multiple variant this is the status of the first problem, or 500
    /// when the list is empty or the first problem declares none.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            ProblemDetails::Single(p) => p.status_code(),
            ProblemDetails::Multiple(list) => list.first().map_or(500, Problem::status_code),
        }
    }

    /// The first (or only) problem, if any.
    #[must_use]
    pub fn primary(&self) -> Option<&Problem> {
        match self {
            ProblemDetails::Single(p) => Some(p),
            ProblemDetails::Multiple(list) => list.first(),
        }
    }

    /// Serialize to the wire form.
    ///
    /// # Errors
    ///
    /// Fails only if an extension value cannot be represented as JSON.
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl From<Problem> for ProblemDetails {
    fn from(problem: Problem) -> Self {
        ProblemDetails::Single(problem)
    }
}

impl From<Vec<Problem>> for ProblemDetails {
    fn from(problems: Vec<Problem>) -> Self {
        ProblemDetails::Multiple(problems)
    }
}

impl Serialize for ProblemDetails {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ProblemDetails::Single(problem) => problem.serialize(serializer),
            ProblemDetails::Multiple(problems) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("status", &self.status())?;
                map.serialize_entry("problems", problems)?;
                map.end()
            }
        }
    }
}

impl std::fmt::Display for ProblemDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.primary() {
            Some(p) => write!(
                f,
                "{} {}",
                self.status(),
                p.title.as_deref().unwrap_or_else(|| p.type_or_blank())
            ),
            None => write!(f, "{} (no problems)", self.status()),
        }
    }
}

/// Problem type URIs used by the translator, derived from one base URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemTypes {
    pub not_found: String,
    pub forbidden: String,
    pub internal: String,
}

impl ProblemTypes {
    #[must_use]
    pub fn from_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            not_found: format!("{base}/not-found"),
            forbidden: format!("{base}/forbidden"),
            internal: format!("{base}/internal-error"),
        }
    }
}

impl Default for ProblemTypes {
    fn default() -> Self {
        Self::from_base(DEFAULT_TYPE_BASE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_members_are_omitted() {
        let p = Problem::new(404).with_detail("nothing here");
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(
            v,
            json!({"title": "Not Found", "status": 404, "detail": "nothing here"})
        );
    }

    #[test]
    fn test_extensions_are_flattened() {
        let p = Problem::new(409)
            .with_type("https://example.test/conflict")
            .with_extension("balance", 30)
            .with_extension("status", "ignored");
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["balance"], 30);
        assert_eq!(v["status"], 409);
        assert_eq!(v["type"], "https://example.test/conflict");
    }

    #[test]
    fn test_multiple_status_comes_from_first() {
        let details = ProblemDetails::from(vec![Problem::new(422), Problem::new(400)]);
        assert_eq!(details.status(), 422);
        let v = serde_json::to_value(&details).unwrap();
        assert_eq!(v["status"], 422);
        assert_eq!(v["problems"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_multiple_defaults_to_500() {
        assert_eq!(ProblemDetails::Multiple(Vec::new()).status(), 500);
        let untyped = Problem {
            title: Some("x".into()),
            ..Problem::default()
        };
        assert_eq!(ProblemDetails::Multiple(vec![untyped]).status(), 500);
    }

    #[test]
    fn test_round_trip_keeps_unknown_members() {
        let raw = json!({"type": "urn:x", "status": 400, "field": "email"});
        let p: Problem = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(p.extensions.get("field"), Some(&json!("email")));
        assert_eq!(serde_json::to_value(&p).unwrap(), raw);
    }

    #[test]
    fn test_types_from_base_trim_slash() {
        let t = ProblemTypes::from_base("https://errors.example/");
        assert_eq!(t.not_found, "https://errors.example/not-found");
    }
}
