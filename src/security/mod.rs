//! # Security Module
//!
//! Per-endpoint authorization for dispatchkit.
//!
//! ## Overview
//!
//! Every registered route carries a [`SecurityPolicy`]. During the registration
//! pass the policy is recorded as a [`SecurityRule`] in a side table, the
//! [`SecurityRuleSet`], keyed by `METHOD:normalizedPath`. At request time the
//! rule set is consulted exactly once, by the gate that sits between the last
//! middleware and the matched handler.
//!
//! ## Evaluation
//!
//! 1. Look up the rule for the resolved route. No rule means **deny** (fail closed).
//! 2. `permit_all` rules allow unconditionally.
//! 3. Otherwise allow iff
//!    - the rule requires no roles, or the caller holds at least one of them, **and**
//!    - the rule requires no permissions, or the caller holds all of them.
//!
//! A denial becomes a 403 problem and the handler never runs.
//!
//! ## Callers
//!
//! Who the caller is comes from outside this crate. A [`PrincipalProvider`]
//! turns the request context into a [`Principal`] (subject, roles, permissions);
//! this module only evaluates, it never issues or validates credentials.
//!
//! ```rust
//! use dispatchkit::security::{AccessDecision, Principal, SecurityPolicy, SecurityRuleSet};
//! use http::Method;
//!
//! let mut rules = SecurityRuleSet::new();
//! rules
//!     .insert_policy(&Method::POST, "/orders", &SecurityPolicy::permissions(["orders:write"]))
//!     .unwrap();
//!
//! let clerk = Principal::new("clerk").with_permissions(["orders:read"]);
//! assert!(matches!(
//!     rules.evaluate(&Method::POST, "/orders", &clerk),
//!     AccessDecision::Deny(_)
//! ));
//! ```

mod policy;
mod principal;

pub use policy::{
    normalize_path, rule_key, AccessDecision, DenyReason, SecurityPolicy, SecurityRule,
    SecurityRuleSet,
};
pub use principal::{AnonymousPrincipal, HeaderPrincipalProvider, Principal, PrincipalProvider};
