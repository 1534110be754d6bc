//! Host-app logging bridge.
//!
//! The SDK logs through the `log` facade. The host installs a [`LogSink`]
//! once at startup to receive those records on the foreign side; without one,
//! records are discarded.

use std::sync::{Arc, OnceLock};

/// Severity of a forwarded log record.
#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum LogLevel {
    /// Extremely detailed, low-priority messages.
    Trace,
    /// Debugging information.
    Debug,
    /// Progress of normal operation.
    Info,
    /// Potentially harmful situations.
    Warn,
    /// Errors the SDK could not recover from locally.
    Error,
}

/// Receives log records emitted by the SDK.
#[uniffi::export(with_foreign)]
pub trait LogSink: Send + Sync {
    /// Handles one log record.
    fn log(&self, level: LogLevel, message: String);
}

static SINK: OnceLock<Arc<dyn LogSink>> = OnceLock::new();

struct FacadeBridge;

impl log::Log for FacadeBridge {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        // Debug and trace records from other crates are noise for the host.
        let from_sdk = record
            .module_path()
            .is_some_and(|path| path.starts_with("authkit"));
        let verbose = matches!(record.level(), log::Level::Debug | log::Level::Trace);
        if verbose && !from_sdk {
            return;
        }

        if let Some(sink) = SINK.get() {
            sink.log(level_of(record.level()), format!("{}", record.args()));
        }
    }

    fn flush(&self) {}
}

const fn level_of(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

/// Installs `sink` as the process-wide destination for SDK log records.
///
/// Call once, before constructing any other SDK object. A second call is
/// ignored with a warning through the already-installed sink.
#[uniffi::export]
pub fn install_log_sink(sink: Arc<dyn LogSink>) {
    if SINK.set(sink).is_err() {
        log::warn!("log sink already installed, ignoring replacement");
        return;
    }

    static BRIDGE: FacadeBridge = FacadeBridge;
    if log::set_logger(&BRIDGE).is_ok() {
        log::set_max_level(log::LevelFilter::Trace);
    }
}
