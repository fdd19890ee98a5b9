use std::collections::BTreeSet;

use crate::dispatcher::RequestContext;

/// The authenticated (or anonymous) caller of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    subject: Option<String>,
    roles: BTreeSet<String>,
    permissions: BTreeSet<String>,
}

impl Principal {
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Self::default()
        }
    }

    /// A caller with no identity, roles or permissions.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    #[must_use]
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    #[must_use]
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }
}

/// Supplies the caller's roles and permissions for a request.
///
/// Implement this on top of whatever authentication collaborator the server
/// uses (session store, token introspection, mTLS identity). It is only asked
/// when no middleware has already attached a principal to the context.
pub trait PrincipalProvider: Send + Sync {
    fn resolve(&self, ctx: &RequestContext) -> Principal;
}

/// Treats every caller as anonymous. Only `permit_all` endpoints (and rules
/// with no requirements) are reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousPrincipal;

impl PrincipalProvider for AnonymousPrincipal {
    fn resolve(&self, _ctx: &RequestContext) -> Principal {
        Principal::anonymous()
    }
}

/// Reads an identity that a trusted upstream gateway has already authenticated
/// and forwarded as headers. Roles and permissions are comma-separated.
///
/// Never expose a service using this provider directly to clients: anyone can
/// set these headers.
#[derive(Debug, Clone)]
pub struct HeaderPrincipalProvider {
    subject_header: String,
    roles_header: String,
    permissions_header: String,
}

impl Default for HeaderPrincipalProvider {
    fn default() -> Self {
        Self {
            subject_header: "x-auth-subject".to_string(),
            roles_header: "x-auth-roles".to_string(),
            permissions_header: "x-auth-permissions".to_string(),
        }
    }
}

impl HeaderPrincipalProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn subject_header(mut self, name: &str) -> Self {
        self.subject_header = name.to_string();
        self
    }

    #[must_use]
    pub fn roles_header(mut self, name: &str) -> Self {
        self.roles_header = name.to_string();
        self
    }

    #[must_use]
    pub fn permissions_header(mut self, name: &str) -> Self {
        self.permissions_header = name.to_string();
        self
    }
}

fn split_list(value: Option<&str>) -> impl Iterator<Item = String> + '_ {
    value
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl PrincipalProvider for HeaderPrincipalProvider {
    fn resolve(&self, ctx: &RequestContext) -> Principal {
        let base = match ctx.get_header(&self.subject_header) {
            Some(subject) if !subject.trim().is_empty() => Principal::new(subject.trim()),
            _ => Principal::anonymous(),
        };
        base.with_roles(split_list(ctx.get_header(&self.roles_header)))
            .with_permissions(split_list(ctx.get_header(&self.permissions_header)))
    }
}
