//! Where finished access lines go.
//!
//! Anything that can take a severity and a message is a sink. Three shapes
//! are supported out of the box:
//!
//! - a closure `Fn(Severity, &str)`
//! - a type with `info`/`warn`/`error` methods, via [`Leveled`]
//! - [`TracingSink`], which emits `tracing` events

use tracing::{error, info, warn};

use super::observer::LogRecord;
use super::severity::Severity;

/// Receives one finished line per logged request.
///
/// Writes are fire-and-forget: the access log neither waits for nor checks
/// the outcome.
pub trait LogSink: Send + Sync {
    fn log(&self, severity: Severity, message: &str);

    /// Full record including status and timing. Sinks that can store
    /// structured fields override this; the default forwards to [`log`](LogSink::log).
    fn record(&self, record: &LogRecord) {
        self.log(record.severity, &record.message);
    }
}

impl<F> LogSink for F
where
    F: Fn(Severity, &str) + Send + Sync,
{
    fn log(&self, severity: Severity, message: &str) {
        self(severity, message)
    }
}

/// A logger with one method per level.
pub trait LeveledSink: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Adapts a [`LeveledSink`] to [`LogSink`].
#[derive(Clone, Debug, Default)]
pub struct Leveled<L>(pub L);

impl<L: LeveledSink> LogSink for Leveled<L> {
    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info  => self.0.info(message),
            Severity::Warn  => self.0.warn(message),
            Severity::Error => self.0.error(message),
        }
    }
}

/// Emits every line as a `tracing` event with target `access_log`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info  => info!(target: "access_log", "{message}"),
            Severity::Warn  => warn!(target: "access_log", "{message}"),
            Severity::Error => error!(target: "access_log", "{message}"),
        }
    }

    fn record(&self, record: &LogRecord) {
        let status = record.status;
        let elapsed_ms = record.elapsed.as_millis() as u64;
        let message = &record.message;
        match record.severity {
            Severity::Info  => info!(target: "access_log", status, elapsed_ms, "{message}"),
            Severity::Warn  => warn!(target: "access_log", status, elapsed_ms, "{message}"),
            Severity::Error => error!(target: "access_log", status, elapsed_ms, "{message}"),
        }
    }
}
