//! # aviso-logging
//!
//! Structured logging with `tracing`.
//!
//! One global subscriber: an `EnvFilter` (`RUST_LOG` wins over the configured
//! level) feeding a `fmt` layer in text or JSON form.

#![deny(unsafe_code)]

use aviso_settings::{LogFormat, LoggingSettings};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

/// Fallback directive used when the configured level does not parse.
const FALLBACK_DIRECTIVE: &str = "info";

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A global subscriber is already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Build the filter from `RUST_LOG`, falling back to `level`.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| directive_filter(level))
}

/// Parse `level` as a filter directive, falling back to `info`.
pub fn directive_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|e| {
        eprintln!("aviso-logging: invalid log level {level:?} ({e}), using {FALLBACK_DIRECTIVE}");
        EnvFilter::new(FALLBACK_DIRECTIVE)
    })
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), LoggingError> {
    let filter = build_filter(&settings.level);

    let fmt_layer = match settings.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(fmt_layer).try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_directive_is_kept() {
        let filter = directive_filter("aviso_server=debug,warn");
        let rendered = filter.to_string();
        assert!(rendered.contains("aviso_server=debug"));
        assert!(rendered.contains("warn"));
    }

    #[test]
    fn invalid_directive_falls_back() {
        let filter = directive_filter("aviso=loud");
        assert_eq!(filter.to_string(), FALLBACK_DIRECTIVE);
    }

    #[test]
    fn second_init_reports_error() {
        let settings = LoggingSettings::default();
        let first = init_logging(&settings);
        let second = init_logging(&settings);
        // The first call may lose to another test's subscriber; the second never wins.
        let _ = first;
        assert!(matches!(second, Err(LoggingError::Init(_))));
    }
}
