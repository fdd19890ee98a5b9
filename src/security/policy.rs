use std::collections::{BTreeSet, HashMap};
use std::fmt;

use http::Method;
use tracing::{debug, info};

use super::Principal;
use crate::error::ConfigError;

/// Declared access policy for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityPolicy {
    /// Anyone, authenticated or not.
    PermitAll,
    /// Roles are ANY-of, permissions are ALL-of. Empty sets impose no constraint.
    Restricted {
        roles: BTreeSet<String>,
        permissions: BTreeSet<String>,
    },
}

impl SecurityPolicy {
    #[must_use]
    pub fn permit_all() -> Self {
        SecurityPolicy::PermitAll
    }

    /// Caller must hold at least one of `roles`.
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SecurityPolicy::Restricted {
            roles: roles.into_iter().map(Into::into).collect(),
            permissions: BTreeSet::new(),
        }
    }

    /// Caller must hold every one of `permissions`.
    pub fn permissions<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SecurityPolicy::Restricted {
            roles: BTreeSet::new(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    /// Add an all-of permission requirement on top of this policy.
    ///
    /// Has no effect on [`SecurityPolicy::PermitAll`].
    #[must_use]
    pub fn and_permissions<I, S>(self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self {
            SecurityPolicy::PermitAll => SecurityPolicy::PermitAll,
            SecurityPolicy::Restricted {
                roles,
                mut permissions,
            } => {
                permissions.extend(extra.into_iter().map(Into::into));
                SecurityPolicy::Restricted { roles, permissions }
            }
        }
    }
}

/// Normalize a path for rule keys: always a leading `/`, never a trailing `/`
/// unless the whole path is `/`.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Lookup key for a rule: `METHOD:normalizedPath` with the method upper-cased.
#[must_use]
pub fn rule_key(method: &Method, path: &str) -> String {
    format!(
        "{}:{}",
        method.as_str().to_ascii_uppercase(),
        normalize_path(path)
    )
}

/// Authorization rule for one `(method, path)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityRule {
    pub method: Method,
    /// Normalized path template
    pub path: String,
    pub permit_all: bool,
    /// ANY-of
    pub roles: BTreeSet<String>,
    /// ALL-of
    pub permissions: BTreeSet<String>,
}

impl SecurityRule {
    #[must_use]
    pub fn from_policy(method: &Method, path: &str, policy: &SecurityPolicy) -> Self {
        let (permit_all, roles, permissions) = match policy {
            SecurityPolicy::PermitAll => (true, BTreeSet::new(), BTreeSet::new()),
            SecurityPolicy::Restricted { roles, permissions } => {
                (false, roles.clone(), permissions.clone())
            }
        };
        Self {
            method: method.clone(),
            path: normalize_path(path),
            permit_all,
            roles,
            permissions,
        }
    }

    #[must_use]
    pub fn key(&self) -> String {
        rule_key(&self.method, &self.path)
    }

    /// Evaluate this rule for `principal`.
    #[must_use]
    pub fn evaluate(&self, principal: &Principal) -> AccessDecision {
        if self.permit_all {
            return AccessDecision::Allow;
        }
        if !self.roles.is_empty() && !self.roles.iter().any(|r| principal.has_role(r)) {
            return AccessDecision::Deny(DenyReason::MissingRole);
        }
        let missing: Vec<String> = self
            .permissions
            .iter()
            .filter(|p| !principal.has_permission(p))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return AccessDecision::Deny(DenyReason::MissingPermissions(missing));
        }
        AccessDecision::Allow
    }
}

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// No rule is registered for the endpoint.
    NoRule,
    /// None of the accepted roles is held.
    MissingRole,
    /// These required permissions are not held.
    MissingPermissions(Vec<String>),
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::NoRule => write!(f, "no security rule registered"),
            DenyReason::MissingRole => write!(f, "caller holds none of the accepted roles"),
            DenyReason::MissingPermissions(p) => {
                write!(f, "caller lacks permissions [{}]", p.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny(DenyReason),
}

impl AccessDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

/// Side table of security rules, keyed by `METHOD:normalizedPath`.
///
/// Built during registration and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct SecurityRuleSet {
    rules: HashMap<String, SecurityRule>,
}

impl SecurityRuleSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DuplicateSecurityRule`] if a rule with the same key exists.
    pub fn insert(&mut self, rule: SecurityRule) -> Result<(), ConfigError> {
        let key = rule.key();
        if self.rules.contains_key(&key) {
            return Err(ConfigError::DuplicateSecurityRule { key });
        }
        self.rules.insert(key, rule);
        Ok(())
    }

    /// Build a rule from a policy and add it.
    ///
    /// # Errors
    ///
    /// Same as [`SecurityRuleSet::insert`].
    pub fn insert_policy(
        &mut self,
        method: &Method,
        path: &str,
        policy: &SecurityPolicy,
    ) -> Result<(), ConfigError> {
        self.insert(SecurityRule::from_policy(method, path, policy))
    }

    #[must_use]
    pub fn get(&self, method: &Method, path: &str) -> Option<&SecurityRule> {
        self.rules.get(&rule_key(method, path))
    }

    /// Whether a rule is registered under the normalized key of `method path`.
    #[must_use]
    pub fn contains(&self, method: &Method, path: &str) -> bool {
        self.rules.contains_key(&rule_key(method, path))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Decide whether `principal` may call `method path`.
    ///
    /// `path` is the route template the request resolved to. A missing rule denies.
    #[must_use]
    pub fn evaluate(&self, method: &Method, path: &str, principal: &Principal) -> AccessDecision {
        let decision = match self.get(method, path) {
            Some(rule) => rule.evaluate(principal),
            None => AccessDecision::Deny(DenyReason::NoRule),
        };
        match &decision {
            AccessDecision::Allow => debug!(
                method = %method,
                route_pattern = %path,
                subject = principal.subject().unwrap_or("anonymous"),
                "Access granted"
            ),
            AccessDecision::Deny(reason) => info!(
                method = %method,
                route_pattern = %path,
                subject = principal.subject().unwrap_or("anonymous"),
                reason = %reason,
                "Access denied"
            ),
        }
        decision
    }
}
