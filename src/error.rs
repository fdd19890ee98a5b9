//! Error types.
//!
//! [`ConfigError`] covers everything that can go wrong while the service is being
//! assembled; it is returned from builders and never seen at request time.
//! [`DispatchError`] is the failure side of every middleware and handler result
//! and is always translated into a [`ProblemDetails`] before a response is written.

use std::path::PathBuf;

use http::Method;
use thiserror::Error;

use crate::problem::{Problem, ProblemDetails};

/// Startup-time configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate route registration: {method} {template}")]
    DuplicateRoute { method: Method, template: String },

    #[error("invalid route template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("duplicate security rule for key {key}")]
    DuplicateSecurityRule { key: String },

    #[error("middleware chain has no terminal handler")]
    MissingTerminalHandler,

    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },
}

/// Request-time failures raised by routing, security, middleware or handlers.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No route matched the request.
    #[error("no route for {method} {path}")]
    NotFound { method: Method, path: String },

    /// A route matched but its security policy denied the caller.
    #[error("access denied to {method} {path}: {reason}")]
    Forbidden {
        method: Method,
        path: String,
        reason: String,
    },

    /// A problem payload raised deliberately by domain code; passed through unchanged.
    #[error("{0}")]
    Problem(ProblemDetails),

    /// Anything else. The message is logged but never sent to the client.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),

    /// A middleware or handler panicked while producing its result.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl DispatchError {
    /// Wrap any error as an unexpected internal failure.
    pub fn internal<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DispatchError::Internal(anyhow::Error::new(err))
    }

    /// A handler-declared validation failure (400).
    pub fn bad_request(detail: impl Into<String>) -> Self {
        DispatchError::Problem(Problem::bad_request(detail).into())
    }

    /// Short classification used in logs and the `errorKind` problem extension.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::NotFound { .. } => "not_found",
            DispatchError::Forbidden { .. } => "forbidden",
            DispatchError::Problem(_) => "problem",
            DispatchError::Internal(_) => "internal",
            DispatchError::Panicked(_) => "panic",
        }
    }

    /// HTTP status this failure will be answered with.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            DispatchError::NotFound { .. } => 404,
            DispatchError::Forbidden { .. } => 403,
            DispatchError::Problem(p) => p.status(),
            DispatchError::Internal(_) | DispatchError::Panicked(_) => 500,
        }
    }
}

impl From<ProblemDetails> for DispatchError {
    fn from(problem: ProblemDetails) -> Self {
        DispatchError::Problem(problem)
    }
}

impl From<Problem> for DispatchError {
    fn from(problem: Problem) -> Self {
        DispatchError::Problem(problem.into())
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::internal(err)
    }
}

impl From<std::io::Error> for DispatchError {
    fn from(err: std::io::Error) -> Self {
        DispatchError::internal(err)
    }
}
