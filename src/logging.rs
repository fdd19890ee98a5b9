//! Structured logging setup
//!
//! All components log through `tracing` with structured fields (`request_id`,
//! `method`, `path`, `route_pattern`, `status`, `duration_us`). This module
//! installs the subscriber:
//! - JSON output for production, pretty output for development
//! - Sampling strategies (all, error-only, sampled)
//! - Optional non-blocking output through `tracing-appender`
//!
//! Configuration comes from `DISPATCHKIT_LOG_*` environment variables; the
//! standard `RUST_LOG` filter takes precedence over the configured level.

use std::env;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use tracing::subscriber::Interest;
use tracing::{Level, Metadata, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Sampling mode: how to decide which logs to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    /// Log everything (high volume)
    All,
    /// Log only WARN and ERROR levels
    ErrorOnly,
    /// Sample below WARN, log all warnings and errors
    Sampled,
}

impl SamplingMode {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error-only" | "error_only" => SamplingMode::ErrorOnly,
            "sampled" => SamplingMode::Sampled,
            _ => SamplingMode::All,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level: trace/debug/info/warn/error
    pub log_level: String,
    /// Log format: json/pretty
    pub format: LogFormat,
    /// Sampling mode: all/error-only/sampled
    pub sampling_mode: SamplingMode,
    /// Sampling rate (0.0-1.0) for Sampled mode
    pub sampling_rate: f64,
    /// Write through a background thread
    pub async_logging: bool,
    /// Extra filter directives (comma-separated, e.g. `dispatchkit::router=debug`)
    pub target_filter: Option<String>,
    /// Include file:line location (dev only)
    pub include_location: bool,
}

impl LogConfig {
    /// Parse configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str, default: bool| {
            lookup(key)
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };
        Self {
            log_level: lookup("DISPATCHKIT_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            format: LogFormat::parse(
                &lookup("DISPATCHKIT_LOG_FORMAT").unwrap_or_else(|| "json".to_string()),
            ),
            sampling_mode: SamplingMode::parse(
                &lookup("DISPATCHKIT_LOG_SAMPLING_MODE").unwrap_or_else(|| "all".to_string()),
            ),
            sampling_rate: lookup("DISPATCHKIT_LOG_SAMPLING_RATE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.1),
            async_logging: flag("DISPATCHKIT_LOG_ASYNC", false),
            target_filter: lookup("DISPATCHKIT_LOG_TARGET_FILTER"),
            include_location: flag("DISPATCHKIT_LOG_INCLUDE_LOCATION", false),
        }
    }

    /// Create a default configuration for local development
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            sampling_mode: SamplingMode::All,
            sampling_rate: 1.0,
            async_logging: false,
            target_filter: None,
            include_location: true,
        }
    }

    /// Create a default production configuration
    pub fn default_prod() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            sampling_mode: SamplingMode::Sampled,
            sampling_rate: 0.1,
            async_logging: true,
            target_filter: None,
            include_location: false,
        }
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

/// Sampling layer: decides whether to emit a log based on sampling rules
pub struct SamplingLayer {
    mode: SamplingMode,
    sampling_rate: f64,
    counter: AtomicU64,
}

impl SamplingLayer {
    pub fn new(mode: SamplingMode, sampling_rate: f64) -> Self {
        Self {
            mode,
            sampling_rate: sampling_rate.clamp(0.0, 1.0),
            counter: AtomicU64::new(0),
        }
    }

    /// Check if this event should be logged based on sampling rules
    pub fn should_sample(&self, metadata: &Metadata<'_>) -> bool {
        let important = matches!(*metadata.level(), Level::WARN | Level::ERROR);
        match self.mode {
            SamplingMode::All => true,
            SamplingMode::ErrorOnly => important,
            SamplingMode::Sampled => {
                // Spans always pass so that sampled events keep their context.
                if important || metadata.is_span() {
                    return true;
                }
                if self.sampling_rate <= 0.0 {
                    return false;
                }
                let count = self.counter.fetch_add(1, Ordering::Relaxed);
                let interval = (1.0 / self.sampling_rate) as u64;
                interval > 0 && count % interval == 0
            }
        }
    }
}

impl<S> Layer<S> for SamplingLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn register_callsite(&self, metadata: &'static Metadata<'static>) -> Interest {
        match self.mode {
            // Sampling is decided per event, so the answer must not be cached.
            SamplingMode::Sampled => Interest::sometimes(),
            _ if self.should_sample(metadata) => Interest::always(),
            _ => Interest::never(),
        }
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: LayerContext<'_, S>) -> bool {
        self.should_sample(metadata)
    }
}

/// Initialize logging from `DISPATCHKIT_LOG_*` variables.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging() -> Result<Option<WorkerGuard>> {
    init_logging_with_config(&LogConfig::from_env())
}

/// Initialize logging with an explicit configuration.
///
/// With `async_logging` the returned guard must be kept alive for the whole
/// program; dropping it flushes and stops the background writer.
///
/// # Example
///
/// ```no_run
/// use dispatchkit::logging::{init_logging_with_config, LogConfig};
///
/// let _guard = init_logging_with_config(&LogConfig::default_dev())
///     .expect("Failed to initialize logging");
/// ```
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging_with_config(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let mut env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level().as_str()));

    if let Some(target_filter) = &config.target_filter {
        for filter in target_filter.split(',').map(str::trim) {
            if filter.is_empty() {
                continue;
            }
            match filter.parse() {
                Ok(directive) => env_filter = env_filter.add_directive(directive),
                Err(_) => eprintln!("Warning: Invalid log filter directive: {filter}"),
            }
        }
    }

    let (writer, guard) = if config.async_logging {
        let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
        (tracing_subscriber::fmt::writer::BoxMakeWriter::new(non_blocking), Some(guard))
    } else {
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stdout),
            None,
        )
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_list(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(SamplingLayer::new(config.sampling_mode, config.sampling_rate))
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}
