//! Segment-based path matching for route templates.
//!
//! Templates are split on `/`. A segment starting with `:` is a placeholder that
//! binds exactly one non-empty path segment; every other segment must match the
//! request segment literally (case-sensitive). Segment counts must be equal, so
//! there is no trailing wildcard. Everything here is pure and allocation-light,
//! safe to call from any number of tasks at once.

use smallvec::SmallVec;
use std::sync::Arc;

use crate::error::ConfigError;

/// Marker that introduces a placeholder segment (`/items/:id`).
pub const PLACEHOLDER_MARKER: char = ':';

/// Maximum number of path parameters before heap allocation.
/// Most REST APIs have ≤4 path params (e.g., /users/:id/posts/:post_id).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names use `Arc<str>` because they come from the route table built at
/// startup; cloning one is an atomic increment. Values are per-request data.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Outcome of matching one path against one template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMatch {
    /// Whether the path satisfied the template
    pub matches: bool,
    /// Placeholder bindings in template declaration order
    pub params: ParamVec,
}

impl PathMatch {
    #[must_use]
    pub fn no_match() -> Self {
        Self::default()
    }

    /// Look up a bound placeholder by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(Box<str>),
    Param(Arc<str>),
}

/// A route template split into segments once, at registration time.
#[derive(Debug, Clone)]
pub struct RouteTemplate {
    raw: Arc<str>,
    segments: Vec<Segment>,
    param_count: usize,
}

impl RouteTemplate {
    /// Parse a template such as `/users/:user_id/posts/:post_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTemplate`] when the template does not start
    /// with `/`, contains an unnamed placeholder (`:` alone) or binds the same
    /// placeholder name twice.
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        if !template.starts_with('/') {
            return Err(ConfigError::InvalidTemplate {
                template: template.to_string(),
                reason: "template must start with '/'".to_string(),
            });
        }

        let mut segments = Vec::with_capacity(template.matches('/').count());
        let mut names: Vec<&str> = Vec::new();
        for raw in split_segments(template) {
            match raw.strip_prefix(PLACEHOLDER_MARKER) {
                Some("") => {
                    return Err(ConfigError::InvalidTemplate {
                        template: template.to_string(),
                        reason: "placeholder without a name".to_string(),
                    });
                }
                Some(name) => {
                    if names.contains(&name) {
                        return Err(ConfigError::InvalidTemplate {
                            template: template.to_string(),
                            reason: format!("placeholder '{name}' appears more than once"),
                        });
                    }
                    names.push(name);
                    segments.push(Segment::Param(Arc::from(name)));
                }
                None => segments.push(Segment::Literal(Box::from(raw))),
            }
        }

        Ok(Self {
            raw: Arc::from(template),
            param_count: names.len(),
            segments,
        })
    }

    /// The template exactly as registered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the template has no placeholders, so plain string equality decides a match.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.param_count == 0
    }

    /// Placeholder names in declaration order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_ref()),
            Segment::Literal(_) => None,
        })
    }

    /// Match a query-free request path against this template.
    #[must_use]
    pub fn match_path(&self, path: &str) -> PathMatch {
        let mut params = ParamVec::new();
        let mut path_segments = split_segments(path);

        for segment in &self.segments {
            let Some(actual) = path_segments.next() else {
                return PathMatch::no_match();
            };
            match segment {
                Segment::Literal(expected) => {
                    if expected.as_ref() != actual {
                        return PathMatch::no_match();
                    }
                }
                Segment::Param(name) => {
                    if actual.is_empty() {
                        return PathMatch::no_match();
                    }
                    params.push((Arc::clone(name), actual.to_string()));
                }
            }
        }

        if path_segments.next().is_some() {
            return PathMatch::no_match();
        }

        PathMatch {
            matches: true,
            params,
        }
    }
}

/// Match `path` against `template` without pre-compiling the template.
///
/// An invalid template never matches anything.
///
/// ```
/// use dispatchkit::router::match_path;
///
/// let m = match_path("/items/:id", "/items/42");
/// assert!(m.matches);
/// assert_eq!(m.get("id"), Some("42"));
/// assert!(!match_path("/items/:id", "/items/42/extra").matches);
/// ```
#[must_use]
pub fn match_path(template: &str, path: &str) -> PathMatch {
    match RouteTemplate::parse(template) {
        Ok(compiled) => compiled.match_path(path),
        Err(_) => PathMatch::no_match(),
    }
}

fn split_segments(path: &str) -> std::str::Split<'_, char> {
    path.strip_prefix('/').unwrap_or(path).split('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_template() {
        assert!(match_path("/", "/").matches);
        assert!(!match_path("/", "/items").matches);
    }

    #[test]
    fn test_params_extracted_in_declared_order() {
        let m = match_path("/users/:user_id/posts/:post_id", "/users/7/posts/abc");
        assert!(m.matches);
        let names: Vec<&str> = m.params.iter().map(|(k, _)| k.as_ref()).collect();
        let values: Vec<&str> = m.params.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(names, vec!["user_id", "post_id"]);
        assert_eq!(values, vec!["7", "abc"]);
    }

    #[test]
    fn test_placeholder_rejects_empty_segment() {
        assert!(!match_path("/items/:id", "/items/").matches);
        assert!(!match_path("/items/:id/detail", "/items//detail").matches);
    }

    #[test]
    fn test_literals_are_case_sensitive() {
        assert!(!match_path("/Items/:id", "/items/1").matches);
    }

    #[test]
    fn test_segment_count_must_be_equal() {
        assert!(!match_path("/items/:id", "/items").matches);
        assert!(!match_path("/items/:id", "/items/1/2").matches);
        assert!(!match_path("/items", "/items/").matches);
    }

    #[test]
    fn test_invalid_templates_are_rejected() {
        assert!(RouteTemplate::parse("items").is_err());
        assert!(RouteTemplate::parse("/items/:").is_err());
        assert!(RouteTemplate::parse("/a/:id/b/:id").is_err());
        assert!(!match_path("/items/:", "/items/1").matches);
    }

    #[test]
    fn test_static_detection() {
        assert!(RouteTemplate::parse("/health").unwrap().is_static());
        assert!(!RouteTemplate::parse("/items/:id").unwrap().is_static());
    }
}
