//! # CLI Module
//!
//! Command-line probe for route tables, available as the `dispatchkit-probe`
//! binary.
//!
//! ## Commands
//!
//! ### `routes`
//!
//! List the routes of a manifest in registration order, with their policies:
//!
//! ```bash
//! dispatchkit-probe routes --manifest routes.toml
//! ```
//!
//! ### `request`
//!
//! Push one request through the full pipeline (routing, middleware, security
//! gate, error translation) and print the encoded HTTP response. Every route
//! is served by an echo handler. Caller identity comes from the
//! `x-auth-subject`, `x-auth-roles` and `x-auth-permissions` headers.
//!
//! ```bash
//! dispatchkit-probe request --manifest routes.toml GET /items/42
//! dispatchkit-probe request --manifest routes.toml POST /orders \
//!     -H 'x-auth-permissions: orders:write' --body '{"qty": 1}'
//! ```
//!
//! ## Usage from Code
//!
//! ```rust,ignore
//! use dispatchkit::cli::{run_cli, Cli};
//! use clap::Parser;
//!
//! let cli = Cli::parse();
//! run_cli(cli, &mut std::io::stdout()).await?;
//! ```

mod commands;


pub use commands::{build_service, run_cli, Cli, Commands, ManifestRoute, RouteManifest};
