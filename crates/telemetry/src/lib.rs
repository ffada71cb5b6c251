//! Logging and timing for droidcfg
//!
//! This crate wires up observability for the CLI:
//! - Structured logging with tracing, written to stderr
//! - Per-process session id, attached to every event through [`session_span`]
//! - Timers that log operation durations

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

/// Global session ID for correlating logs
static SESSION_ID: Lazy<String> = Lazy::new(|| Uuid::new_v4().to_string());

/// Initialize logging with custom configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_with_config(config: TelemetryConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        tracing::subscriber::set_global_default(
            subscriber.with(fmt::layer().json().with_writer(std::io::stderr)),
        )
    } else {
        tracing::subscriber::set_global_default(
            subscriber.with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(config.show_target)
                    .with_file(config.show_file)
                    .with_line_number(config.show_line_number)
                    .with_ansi(config.ansi)
                    .compact(),
            ),
        )
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    tracing::debug!(
        session_id = %session_id(),
        version = env!("CARGO_PKG_VERSION"),
        "Telemetry initialized"
    );

    Ok(())
}

/// Get the current session ID
pub fn session_id() -> &'static str {
    &SESSION_ID
}

/// Root span carrying the session id.
///
/// Enter it once in `main`; every event logged while it is entered is
/// tagged with `session_id`. The span is at error level so it stays enabled
/// under any filter.
pub fn session_span() -> tracing::Span {
    tracing::error_span!("session", session_id = %session_id())
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
    /// Include the event target
    pub show_target: bool,
    /// Include the source file
    pub show_file: bool,
    /// Include the source line
    pub show_line_number: bool,
    /// Color the compact format
    pub ansi: bool,
    /// Emit one JSON object per event instead of the compact format
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            show_target: false,
            show_file: false,
            show_line_number: false,
            ansi: true,
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Map `-v` repetitions and `--quiet` to a log level
    pub fn from_verbosity(verbose: u8, quiet: bool) -> Self {
        let log_level = if quiet {
            "off"
        } else {
            match verbose {
                0 => "error",
                1 => "warn",
                2 => "info",
                3 => "debug",
                _ => "trace",
            }
        };

        Self {
            log_level: log_level.to_string(),
            show_target: verbose >= 3,
            ..Self::default()
        }
    }

    /// Disable ANSI colors in log output
    pub fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }

    /// Switch between JSON and compact log lines
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

/// Timer for measuring operation duration.
///
/// The duration is logged once, on [`Timer::stop`] or when the timer is
/// dropped.
pub struct Timer {
    name: String,
    start: Instant,
    stopped: bool,
}

impl Timer {
    /// Start a new timer
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
            stopped: false,
        }
    }

    /// Stop the timer and log the duration
    pub fn stop(mut self) -> Duration {
        self.stopped = true;
        self.record()
    }

    fn record(&self) -> Duration {
        let duration = self.start.elapsed();
        tracing::debug!(
            operation = %self.name,
            duration_ms = duration.as_millis(),
            "Timer completed"
        );
        duration
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if !self.stopped {
            self.record();
        }
    }
}

/// Enter a span and time it until the end of the enclosing scope.
///
/// The timer is declared after the span so it drops first and its log line
/// lands inside the span.
#[macro_export]
macro_rules! timed_span {
    ($name:expr) => {
        let _span = tracing::info_span!($name).entered();
        let _timer = $crate::Timer::start($name);
    };
    ($name:expr, $($field:tt)*) => {
        let _span = tracing::info_span!($name, $($field)*).entered();
        let _timer = $crate::Timer::start($name);
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn capture(f: impl FnOnce()) -> String {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        buf.contents()
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(TelemetryConfig::from_verbosity(0, false).log_level, "error");
        assert_eq!(TelemetryConfig::from_verbosity(1, false).log_level, "warn");
        assert_eq!(TelemetryConfig::from_verbosity(3, false).log_level, "debug");
        assert_eq!(TelemetryConfig::from_verbosity(5, false).log_level, "trace");
        assert_eq!(TelemetryConfig::from_verbosity(3, true).log_level, "off");
        assert!(TelemetryConfig::from_verbosity(3, false).show_target);
    }

    #[test]
    fn test_without_ansi() {
        assert!(!TelemetryConfig::default().without_ansi().ansi);
    }

    #[test]
    fn test_timer() {
        let timer = Timer::start("test_operation");
        std::thread::sleep(std::time::Duration::from_millis(10));
        let duration = timer.stop();
        assert!(duration.as_millis() >= 10);
    }

    #[test]
    fn test_with_json() {
        assert!(TelemetryConfig::default().with_json(true).json);
        assert!(!TelemetryConfig::default().with_json(false).json);
    }

    #[test]
    fn test_dropped_timer_logs_once() {
        let output = capture(|| {
            let _timer = Timer::start("convert");
        });
        assert_eq!(output.matches("Timer completed").count(), 1);
        assert!(output.contains("operation=convert"));
    }

    #[test]
    fn test_stopped_timer_logs_once() {
        let output = capture(|| {
            Timer::start("import").stop();
        });
        assert_eq!(output.matches("Timer completed").count(), 1);
    }

    #[test]
    fn test_timed_span_logs_inside_span() {
        let output = capture(|| {
            timed_span!("validate", path = "descriptor.toml");
        });
        let line = output
            .lines()
            .find(|line| line.contains("Timer completed"))
            .unwrap();
        assert!(line.contains("validate{path=\"descriptor.toml\"}"), "{}", line);
        assert!(line.contains("operation=validate"));
    }

    #[test]
    fn test_session_span_tags_events() {
        let output = capture(|| {
            let _session = session_span().entered();
            tracing::warn!("Release build type reuses debug signing");
        });
        assert!(output.contains(&format!("session{{session_id={}}}", session_id())));
    }

    #[test]
    fn test_session_id() {
        let id = session_id();
        assert!(!id.is_empty());
        // Should be a valid UUID
        assert!(Uuid::parse_str(id).is_ok());
    }
}
