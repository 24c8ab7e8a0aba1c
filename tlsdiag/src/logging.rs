#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! # Structured Logging
//!
//! Library code only emits `tracing` events and spans. The subscriber is
//! installed once by the binary through [`init_tracing`]; tests can install
//! their own scoped subscriber instead.
//!
//! [`OpSpan`] wraps a span with a start time so that connection and handshake
//! steps report how long they took, whether they succeed or fail.

use std::time::{Duration, Instant};

use tracing::{Level, Span, debug, span, warn};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default level when `RUST_LOG` is not set
    pub log_level: Level,
    /// Show source file and line of each event
    pub show_location: bool,
    /// Show the thread id of each event
    pub show_thread_ids: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self { log_level: Level::INFO, show_location: true, show_thread_ids: false }
    }
}

impl TracingConfig {
    /// Enable debug logging
    #[must_use]
    pub fn debug() -> Self {
        Self { log_level: Level::DEBUG, ..Default::default() }
    }

    /// Pick the level from a `--debug` style flag
    #[must_use]
    pub fn from_debug_flag(debug: bool) -> Self {
        if debug { Self::debug() } else { Self::default() }
    }

    /// Also show thread ids
    #[must_use]
    pub fn with_thread_ids(mut self) -> Self {
        self.show_thread_ids = true;
        self
    }
}

/// Install the process-wide subscriber, writing to stderr.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
///
/// # Example
/// ```no_run
/// use tlsdiag::logging::{TracingConfig, init_tracing};
///
/// init_tracing(&TracingConfig::debug()).ok();
/// ```
pub fn init_tracing(config: &TracingConfig) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::builder().with_default_directive(config.log_level.into()).from_env_lossy();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_file(config.show_location)
                .with_line_number(config.show_location)
                .with_thread_ids(config.show_thread_ids),
        )
        .with(filter)
        .try_init()
}

/// A timed span around one network operation
#[derive(Debug)]
pub struct OpSpan {
    span: Span,
    start_time: Instant,
}

impl OpSpan {
    /// Span for dialing an endpoint
    pub fn connection(endpoint: &str, transport: &str) -> Self {
        let span = span!(Level::INFO, "connect", endpoint = %endpoint, transport = %transport);

        span.in_scope(|| {
            debug!("Dialing {}", endpoint);
        });

        Self { span, start_time: Instant::now() }
    }

    /// Span for a TLS handshake
    pub fn handshake(peer: &str, side: &str) -> Self {
        let span = span!(Level::INFO, "tls_handshake", peer = %peer, side = %side);

        span.in_scope(|| {
            debug!("Starting TLS handshake");
        });

        Self { span, start_time: Instant::now() }
    }

    /// Get elapsed time since span creation
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Complete the span successfully
    pub fn complete(self) {
        let duration = self.start_time.elapsed();
        self.span.in_scope(|| {
            debug!(
                "Completed in {}.{:03}s",
                duration.as_secs(),
                duration.subsec_millis()
            );
        });
    }

    /// Complete the span with error
    pub fn error<E>(self, error: &E)
    where
        E: std::error::Error,
    {
        let duration = self.start_time.elapsed();
        self.span.in_scope(|| {
            warn!(
                error = %error,
                "Failed after {}.{:03}s",
                duration.as_secs(),
                duration.subsec_millis()
            );
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_config_default() {
        let config = TracingConfig::default();
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.show_location);
        assert!(!config.show_thread_ids);
    }

    #[test]
    fn test_from_debug_flag() {
        assert_eq!(TracingConfig::from_debug_flag(true).log_level, Level::DEBUG);
        assert_eq!(TracingConfig::from_debug_flag(false).log_level, Level::INFO);
    }

    #[test]
    fn test_with_thread_ids_keeps_level() {
        let config = TracingConfig::debug().with_thread_ids();
        assert!(config.show_thread_ids);
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn test_op_span_timing() {
        let span = OpSpan::connection("localhost:4040", "tls");
        assert!(span.elapsed() < Duration::from_secs(5));
        span.complete();
    }
}
