use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use http::Method;
use serde::Deserialize;

use crate::config::DispatchConfig;
use crate::echo::echo_handler;
use crate::middleware::{MetricsMiddleware, TracingMiddleware};
use crate::security::{HeaderPrincipalProvider, SecurityPolicy};
use crate::server::{AppService, HttpRequest};

/// Command-line interface for probing a route table
///
/// Loads a route manifest, wires every route to the echo handler and pushes
/// requests through the full pipeline.
#[derive(Parser, Debug)]
#[command(name = "dispatchkit-probe")]
#[command(about = "Probe a dispatchkit route table", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available probe commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the routes of a manifest in registration order
    Routes {
        /// Path to the route manifest (TOML)
        #[arg(short, long)]
        manifest: PathBuf,
    },
    /// Send one request through the pipeline and print the HTTP response
    Request {
        /// Path to the route manifest (TOML)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Optional service configuration file (TOML)
        #[arg(short, long, env = "DISPATCHKIT_CONFIG")]
        config: Option<PathBuf>,

        /// Request method, e.g. GET
        method: String,

        /// Request target: path and optional query string
        target: String,

        /// Request header as `name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request body
        #[arg(short, long)]
        body: Option<String>,
    },
}

/// Route manifest: the routes to register, in order.
///
/// ```toml
/// [[routes]]
/// method = "GET"
/// path = "/items/:id"
/// permit_all = true
///
/// [[routes]]
/// method = "POST"
/// path = "/orders"
/// permissions = ["orders:write"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteManifest {
    #[serde(default)]
    pub routes: Vec<ManifestRoute>,
}

/// One manifest entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestRoute {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub permit_all: bool,
    /// Any-of
    #[serde(default)]
    pub roles: Vec<String>,
    /// All-of
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl ManifestRoute {
    /// # Errors
    ///
    /// Fails when the method token is not a valid HTTP method.
    pub fn method(&self) -> Result<Method> {
        Method::from_bytes(self.method.to_ascii_uppercase().as_bytes())
            .with_context(|| format!("invalid method '{}'", self.method))
    }

    #[must_use]
    pub fn policy(&self) -> SecurityPolicy {
        if self.permit_all {
            SecurityPolicy::PermitAll
        } else {
            SecurityPolicy::roles(self.roles.iter().cloned())
                .and_permissions(self.permissions.iter().cloned())
        }
    }
}

impl RouteManifest {
    /// # Errors
    ///
    /// Fails when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse manifest {}", path.display()))
    }
}

/// Build a service with the echo handler on every manifest route.
///
/// Callers are identified from `x-auth-*` headers; tracing and metrics
/// middleware wrap every request.
///
/// # Errors
///
/// Any registration failure (bad method, bad template, duplicate route).
pub fn build_service(manifest: &RouteManifest, config: DispatchConfig) -> Result<AppService> {
    let mut builder = AppService::builder();
    builder
        .config(config)
        .middleware(Arc::new(TracingMiddleware))
        .middleware(Arc::new(MetricsMiddleware::new()))
        .principal_provider(Arc::new(HeaderPrincipalProvider::new()));
    for route in &manifest.routes {
        builder
            .register(route.method()?, &route.path, route.policy(), echo_handler)
            .with_context(|| format!("failed to register {} {}", route.method, route.path))?;
    }
    Ok(builder.build()?)
}

/// Parse `name: value`.
fn parse_header(raw: &str) -> Result<(&str, &str)> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value.trim())),
        _ => bail!("invalid header '{raw}', expected 'name: value'"),
    }
}

/// Execute a parsed command line, writing results to `out`.
///
/// # Errors
///
/// Manifest, configuration and request-line errors; request failures are
/// reported as HTTP responses instead.
pub async fn run_cli(cli: Cli, out: &mut dyn Write) -> Result<()> {
    match cli.command {
        Commands::Routes { manifest } => {
            let manifest = RouteManifest::from_file(&manifest)?;
            let service = build_service(&manifest, DispatchConfig::default())?;
            for entry in service.routes().entries() {
                writeln!(
                    out,
                    "{:<7} {:<40} {:?}",
                    entry.method().as_str(),
                    entry.template(),
                    entry.policy()
                )?;
            }
            writeln!(out, "{} route(s)", service.routes().len())?;
        }
        Commands::Request {
            manifest,
            config,
            method,
            target,
            headers,
            body,
        } => {
            let manifest = RouteManifest::from_file(&manifest)?;
            let mut cfg = match config {
                Some(path) => DispatchConfig::from_file(&path)?,
                None => DispatchConfig::default(),
            };
            cfg.apply_env_overrides()?;
            let service = build_service(&manifest, cfg)?;

            let mut req = HttpRequest::from_parts(&method, target)
                .with_context(|| format!("invalid method '{method}'"))?;
            for raw in &headers {
                let (name, value) = parse_header(raw)?;
                req = req.with_header(name, value);
            }
            if let Some(body) = body {
                req = req.with_body(Bytes::from(body));
            }

            let response = service.handle(req).await;
            out.write_all(&response.encode())?;
            writeln!(out)?;
        }
    }
    Ok(())
}
