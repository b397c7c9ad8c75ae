//! Logging setup for orderhook services.
//!
//! Library crates in the workspace log through the `tracing` macros with
//! structured fields. This crate owns the one place where a subscriber is
//! installed, so binaries and test harnesses share the same formatting and
//! the same environment switches.
//!
//! # Environment Variables
//!
//! - `ORDERHOOK_DEBUG=1` - Force debug level
//! - `ORDERHOOK_LOG_LEVEL=trace|debug|info|warn|error` - Set log level
//! - `ORDERHOOK_LOG_FORMAT=json|pretty|compact|plain` - Set output format
//! - `ORDERHOOK_LOG_FILE=/path/to/file` - Append to a file instead of stdout
//! - `RUST_LOG` - Full filter directive, overrides the level
//!
//! # Usage
//!
//! ```no_run
//! use orderhook_log::LogConfig;
//!
//! let _guard = LogConfig::from_env().init();
//! tracing::info!(port = 8080, "listening");
//! ```

use std::env;
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub use tracing::{debug, error, info, trace, warn};

/// Errors raised while installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("failed to open log file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("a global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Log level filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a level name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// Directive string understood by `EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line (default)
    Json,
    /// Multi-line, human oriented
    Pretty,
    /// Single line, abbreviated
    Compact,
    /// Single line, full
    Plain,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" => Some(LogFormat::Pretty),
            "compact" => Some(LogFormat::Compact),
            "plain" | "text" => Some(LogFormat::Plain),
            _ => None,
        }
    }
}

/// Where log lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    File(String),
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Include the event target (module path) in each line
    pub targets: bool,
    /// Include thread ids in each line
    pub thread_ids: bool,
    /// Explicit filter directive, takes precedence over `level`
    pub env_filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            output: LogOutput::Stdout,
            targets: true,
            thread_ids: false,
            env_filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from the `ORDERHOOK_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Kept separate from [`LogConfig::from_env`] so callers and tests can feed
    /// values without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let debug = lookup("ORDERHOOK_DEBUG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if let Some(level) = lookup("ORDERHOOK_LOG_LEVEL").and_then(|s| LogLevel::parse(&s)) {
            config.level = level;
        }
        if debug && config.level > LogLevel::Debug {
            config.level = LogLevel::Debug;
        }

        if let Some(format) = lookup("ORDERHOOK_LOG_FORMAT").and_then(|s| LogFormat::parse(&s)) {
            config.format = format;
        }

        if let Some(path) = lookup("ORDERHOOK_LOG_FILE").filter(|p| !p.is_empty()) {
            config.output = LogOutput::File(path);
        }

        config.env_filter = lookup("RUST_LOG").filter(|f| !f.is_empty());
        config
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_targets(mut self, enable: bool) -> Self {
        self.targets = enable;
        self
    }

    pub fn with_thread_ids(mut self, enable: bool) -> Self {
        self.thread_ids = enable;
        self
    }

    /// Set a filter directive such as `"orderhook=debug,hyper=info"`.
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// The effective filter directive.
    pub fn filter_directive(&self) -> String {
        self.env_filter
            .clone()
            .unwrap_or_else(|| self.level.as_str().to_string())
    }

    /// Install the global subscriber.
    ///
    /// The returned guard flushes buffered lines when dropped and must be
    /// held for the lifetime of the process. If a subscriber is already
    /// installed the error is reported on stderr and `None` is returned.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("orderhook-log: {e}");
                None
            }
        }
    }

    /// Install the global subscriber, reporting failures to the caller.
    pub fn try_init(self) -> Result<WorkerGuard, LogError> {
        let filter = EnvFilter::try_new(self.filter_directive())
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()));

        let (writer, guard) = match &self.output {
            LogOutput::Stdout => tracing_appender::non_blocking(io::stdout()),
            LogOutput::Stderr => tracing_appender::non_blocking(io::stderr()),
            LogOutput::File(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| LogError::File {
                        path: path.clone(),
                        source,
                    })?;
                tracing_appender::non_blocking(file)
            }
        };

        let ansi = matches!(self.output, LogOutput::Stdout | LogOutput::Stderr)
            && env::var("NO_COLOR").is_err();

        let registry = tracing_subscriber::registry().with(filter);
        let result = match self.format {
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(writer)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids),
                )
                .try_init(),
            LogFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_writer(writer)
                        .with_ansi(ansi)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids),
                )
                .try_init(),
            LogFormat::Compact => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_writer(writer)
                        .with_ansi(ansi)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids),
                )
                .try_init(),
            LogFormat::Plain => registry
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_ansi(ansi)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids),
                )
                .try_init(),
        };

        result.map_err(|e| LogError::AlreadyInitialized(e.to_string()))?;
        Ok(guard)
    }
}
