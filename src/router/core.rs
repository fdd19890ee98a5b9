//! Router core module - route table and resolution, the request hot path.

// Deny avoidable allocations in the hot path
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::Method;
use tracing::{debug, info, warn};

use super::matcher::{ParamVec, RouteTemplate};
use crate::dispatcher::Handler;
use crate::error::ConfigError;
use crate::security::SecurityPolicy;

/// Resolution slower than this is logged at warn level.
const SLOW_MATCH_THRESHOLD: Duration = Duration::from_millis(1);

/// Identity of a registration: method plus path template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub method: Method,
    pub template: String,
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.template)
    }
}

/// One registered endpoint. Immutable once the table is built.
pub struct RouteEntry {
    method: Method,
    template: RouteTemplate,
    policy: SecurityPolicy,
    handler: Arc<dyn Handler>,
}

impl RouteEntry {
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn template(&self) -> &str {
        self.template.as_str()
    }

    #[must_use]
    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    #[must_use]
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    #[must_use]
    pub fn key(&self) -> RouteKey {
        RouteKey {
            method: self.method.clone(),
            template: self.template.as_str().to_string(),
        }
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("template", &self.template.as_str())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Result of successfully resolving a request to a route.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched entry (shared with the table)
    pub entry: Arc<RouteEntry>,
    /// Path parameters in template declaration order
    pub path_params: ParamVec,
}

impl RouteMatch {
    /// Get a path parameter by name
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Immutable mapping from `(method, template)` to handler entries.
///
/// Entries are kept in registration order, which decides ties: the first
/// entry that matches wins. The table is shared behind an `Arc` and read
/// concurrently without locking.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<Arc<RouteEntry>>,
}

impl RouteTable {
    #[must_use]
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &Arc<RouteEntry>> {
        self.entries.iter()
    }

    /// `METHOD template` strings for every route, in registration order.
    #[must_use]
    pub fn patterns(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| format!("{} {}", e.method, e.template.as_str()))
            .collect()
    }

    /// Resolve a request to a route.
    ///
    /// The query string (anything after `?`) is ignored. Templates without
    /// placeholders are compared by plain string equality first; the segment
    /// matcher handles the rest.
    ///
    /// # Returns
    ///
    /// * `Some(RouteMatch)` - The first matching entry in registration order
    /// * `None` - If no route matches (results in 404)
    #[must_use]
    pub fn resolve(&self, method: &Method, raw_path: &str) -> Option<RouteMatch> {
        let path = raw_path.split_once('?').map_or(raw_path, |(p, _)| p);

        debug!(method = %method, path = %path, "Route match attempt");
        let match_start = Instant::now();

        let mut found = None;
        for entry in self.entries.iter().filter(|e| e.method == *method) {
            if entry.template.is_static() {
                if entry.template.as_str() == path {
                    found = Some(RouteMatch {
                        entry: Arc::clone(entry),
                        path_params: ParamVec::new(),
                    });
                    break;
                }
                continue;
            }
            let m = entry.template.match_path(path);
            if m.matches {
                found = Some(RouteMatch {
                    entry: Arc::clone(entry),
                    path_params: m.params,
                });
                break;
            }
        }

        let match_duration = match_start.elapsed();
        match &found {
            Some(m) if match_duration > SLOW_MATCH_THRESHOLD => warn!(
                method = %method,
                path = %path,
                route_pattern = %m.entry.template(),
                duration_us = match_duration.as_micros() as u64,
                "Slow route matching detected"
            ),
            Some(m) => debug!(
                method = %method,
                path = %path,
                route_pattern = %m.entry.template(),
                path_params = ?m.path_params,
                duration_us = match_duration.as_micros() as u64,
                "Route matched"
            ),
            None => info!(
                method = %method,
                path = %path,
                duration_us = match_duration.as_micros() as u64,
                "No route matched"
            ),
        }
        found
    }

    /// Print all registered routes to stdout.
    pub fn dump_routes(&self) {
        println!("[routes] count={}", self.entries.len());
        for pattern in self.patterns() {
            println!("[route] {pattern}");
        }
    }
}

/// Collects registrations and produces an immutable [`RouteTable`].
#[derive(Default)]
pub struct RouteTableBuilder {
    entries: Vec<Arc<RouteEntry>>,
}

impl RouteTableBuilder {
    /// Register a handler for `method template`.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::InvalidTemplate`] - the template cannot be parsed
    /// * [`ConfigError::DuplicateRoute`] - the same method and template were registered before
    pub fn register(
        &mut self,
        method: Method,
        template: &str,
        policy: SecurityPolicy,
        handler: Arc<dyn Handler>,
    ) -> Result<&mut Self, ConfigError> {
        let template = RouteTemplate::parse(template)?;
        if self.contains(&method, template.as_str()) {
            return Err(ConfigError::DuplicateRoute {
                method,
                template: template.as_str().to_string(),
            });
        }

        debug!(
            method = %method,
            route_pattern = %template.as_str(),
            params = ?template.param_names().collect::<Vec<_>>(),
            "Route registered"
        );
        self.entries.push(Arc::new(RouteEntry {
            method,
            template,
            policy,
            handler,
        }));
        Ok(self)
    }

    /// Whether `method template` has already been registered.
    #[must_use]
    pub fn contains(&self, method: &Method, template: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.method == *method && e.template.as_str() == template)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn build(self) -> RouteTable {
        let table = RouteTable {
            entries: self.entries,
        };
        let routes_summary: Vec<String> = table.patterns().into_iter().take(10).collect();
        info!(
            routes_count = table.len(),
            routes_summary = ?routes_summary,
            "Routing table loaded"
        );
        table
    }
}

impl fmt::Debug for RouteTableBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTableBuilder")
            .field("entries", &self.entries)
            .finish()
    }
}
