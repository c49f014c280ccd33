//! Structured logging.
//!
//! Everything the framework logs goes through `tracing` with structured
//! fields (`trace_id`, `method`, `path`, `status`, ...). [`init`] installs a
//! subscriber that writes those events as JSON lines (production) or as
//! human-readable text (development).
//!
//! `RUST_LOG` overrides [`LoggingConfig::level`] when set.
//!
//! ```no_run
//! use taproom::logging::{self, LoggingConfig};
//!
//! logging::init(&LoggingConfig::default()).expect("logging initialised twice");
//! ```

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::ServerError;

/// Log output format.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Filter directive, e.g. `info` or `taproom=debug,hyper=warn`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { format: LogFormat::Json, level: "info".to_owned() }
    }
}

impl LoggingConfig {
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), ServerError> {
    let registry = tracing_subscriber::registry().with(config.filter());

    match config.format {
        LogFormat::Text => registry.with(fmt::layer()).try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(false))
            .try_init()?,
    }
    Ok(())
}
