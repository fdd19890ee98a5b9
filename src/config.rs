//! # Configuration Module
//!
//! Service configuration loaded from an optional TOML file and then
//! overridden from environment variables.
//!
//! ## File Format
//!
//! ```toml
//! [http]
//! keep_alive = true
//! keep_alive_timeout_secs = 5
//! max_requests = 1000
//!
//! [problems]
//! type_base = "https://errors.example.com/problems"
//! ```
//!
//! Every key is optional; missing keys keep their defaults.
//!
//! ## Environment Variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `DISPATCHKIT_KEEP_ALIVE` | `http.keep_alive` (`true`/`false`/`1`/`0`) |
//! | `DISPATCHKIT_KEEP_ALIVE_TIMEOUT_SECS` | `http.keep_alive_timeout_secs` |
//! | `DISPATCHKIT_MAX_REQUESTS` | `http.max_requests` |
//! | `DISPATCHKIT_PROBLEM_TYPE_BASE` | `problems.type_base` |
//!
//! ## Usage
//!
//! ```rust
//! use dispatchkit::config::DispatchConfig;
//!
//! let config = DispatchConfig::default();
//! assert!(config.http.keep_alive);
//! assert_eq!(config.http.keep_alive_timeout_secs, 5);
//! ```

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::problem::{ProblemTypes, DEFAULT_TYPE_BASE};

pub const ENV_KEEP_ALIVE: &str = "DISPATCHKIT_KEEP_ALIVE";
pub const ENV_KEEP_ALIVE_TIMEOUT_SECS: &str = "DISPATCHKIT_KEEP_ALIVE_TIMEOUT_SECS";
pub const ENV_MAX_REQUESTS: &str = "DISPATCHKIT_MAX_REQUESTS";
pub const ENV_PROBLEM_TYPE_BASE: &str = "DISPATCHKIT_PROBLEM_TYPE_BASE";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub http: HttpConfig,
    pub problems: ProblemConfig,
}

/// Connection policy used by the response writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Allow keep-alive at all. When false every response closes the connection.
    pub keep_alive: bool,
    /// Advertised in the `keep-alive: timeout=` response header
    pub keep_alive_timeout_secs: u64,
    /// Advertised in the `keep-alive: max=` response header
    pub max_requests: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            keep_alive: true,
            keep_alive_timeout_secs: 5,
            max_requests: 1000,
        }
    }
}

/// Settings for the problem payloads produced by the error translator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProblemConfig {
    /// Base URI the built-in problem types are derived from
    pub type_base: String,
}

impl Default for ProblemConfig {
    fn default() -> Self {
        Self {
            type_base: DEFAULT_TYPE_BASE.to_string(),
        }
    }
}

impl ProblemConfig {
    #[must_use]
    pub fn types(&self) -> ProblemTypes {
        ProblemTypes::from_base(&self.type_base)
    }
}

impl DispatchConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML parse error; the caller decides how to report it.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::Io`] - the file cannot be read
    /// * [`ConfigError::Parse`] - the file is not valid configuration TOML
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults plus environment overrides.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidEnv`] when a variable is set to an unparsable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Override fields from `DISPATCHKIT_*` environment variables.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidEnv`] when a variable is set to an unparsable value.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with a custom lookup.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidEnv`] when a value cannot be parsed.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup(ENV_KEEP_ALIVE) {
            self.http.keep_alive = parse_bool(ENV_KEEP_ALIVE, &val)?;
        }
        if let Some(val) = lookup(ENV_KEEP_ALIVE_TIMEOUT_SECS) {
            self.http.keep_alive_timeout_secs = parse_num(ENV_KEEP_ALIVE_TIMEOUT_SECS, &val)?;
        }
        if let Some(val) = lookup(ENV_MAX_REQUESTS) {
            self.http.max_requests = parse_num(ENV_MAX_REQUESTS, &val)?;
        }
        if let Some(val) = lookup(ENV_PROBLEM_TYPE_BASE) {
            let val = val.trim();
            if val.is_empty() {
                return Err(invalid(ENV_PROBLEM_TYPE_BASE, val));
            }
            self.problems.type_base = val.to_string();
        }
        Ok(())
    }
}

fn parse_bool(key: &str, val: &str) -> Result<bool, ConfigError> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, val)),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, val: &str) -> Result<T, ConfigError> {
    val.trim().parse().map_err(|_| invalid(key, val))
}

fn invalid(key: &str, val: &str) -> ConfigError {
    ConfigError::InvalidEnv {
        key: key.to_string(),
        value: val.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = DispatchConfig::from_toml_str("[http]\nmax_requests = 10\n").unwrap();
        assert_eq!(cfg.http.max_requests, 10);
        assert!(cfg.http.keep_alive);
        assert_eq!(cfg.problems.type_base, DEFAULT_TYPE_BASE);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_KEEP_ALIVE, "off"),
            (ENV_MAX_REQUESTS, "7"),
            (ENV_PROBLEM_TYPE_BASE, "https://errors.test/p/"),
        ]
        .into_iter()
        .collect();
        let mut cfg = DispatchConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| (*v).to_string()))
            .unwrap();
        assert!(!cfg.http.keep_alive);
        assert_eq!(cfg.http.max_requests, 7);
        assert_eq!(
            cfg.problems.types().not_found,
            "https://errors.test/p/not-found"
        );
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let mut cfg = DispatchConfig::default();
        let err = cfg
            .apply_overrides(|k| (k == ENV_KEEP_ALIVE_TIMEOUT_SECS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref key, .. } if key == ENV_KEEP_ALIVE_TIMEOUT_SECS));
    }
}
