//! Structured logging setup
//!
//! Logs go to stderr; `RUST_LOG` overrides the default filter, e.g.
//! `RUST_LOG=metal=debug,tfplug=info`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default log level used when `RUST_LOG` is unset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
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

fn env_filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.as_str()))
}

/// Install the global subscriber at `info`
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(LogLevel::Info);
}

pub fn init_logging_with_default(default_level: LogLevel) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .init();
}

/// Like [`init_logging`] but returns false instead of panicking when a
/// subscriber is already installed
pub fn try_init_logging(default_level: LogLevel) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init()
        .is_ok()
}
