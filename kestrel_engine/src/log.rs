//! Engine logging
//!
//! Every subsystem logs through `Engine::log` with a source tag such as
//! `"kestrel::upload"` or `"kestrel::vulkan"`. The sink is replaceable with
//! `Engine::set_logger`; the default sink prints colored lines to stdout.

use colored::*;
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Logger trait for custom logging sinks
///
/// # Example
///
/// ```no_run
/// use kestrel_engine::kestrel::log::{Logger, LogEntry};
///
/// struct FileLogger {
///     file: std::fs::File,
/// }
///
/// impl Logger for FileLogger {
///     fn log(&self, entry: &LogEntry) {
///         // Write to file...
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Handle one log entry
    fn log(&self, entry: &LogEntry);
}

/// One log record
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity level
    pub severity: LogSeverity,

    /// Time at which the entry was created
    pub timestamp: SystemTime,

    /// Source tag (e.g. "kestrel::renderer", "kestrel::vulkan")
    pub source: String,

    /// Message text
    pub message: String,

    /// Source file (ERROR entries only)
    pub file: Option<&'static str>,

    /// Source line (ERROR entries only)
    pub line: Option<u32>,
}

/// Log severity levels, ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogSeverity {
    /// Fixed-width label used in log lines
    pub fn label(self) -> &'static str {
        match self {
            LogSeverity::Trace => "TRACE",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO ",
            LogSeverity::Warn => "WARN ",
            LogSeverity::Error => "ERROR",
        }
    }
}

/// Format an entry without colors: `[timestamp] [SEVERITY] [source] message (file:line)`
pub fn format_entry(entry: &LogEntry) -> String {
    let datetime: DateTime<Local> = entry.timestamp.into();
    let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f");

    match (entry.file, entry.line) {
        (Some(file), Some(line)) => format!(
            "[{}] [{}] [{}] {} ({}:{})",
            timestamp, entry.severity.label(), entry.source, entry.message, file, line
        ),
        _ => format!(
            "[{}] [{}] [{}] {}",
            timestamp, entry.severity.label(), entry.source, entry.message
        ),
    }
}

/// Default logger: colored console output
///
/// Trace is gray, Debug cyan, Info green, Warn yellow, Error bold red.
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        let label = entry.severity.label();
        let severity_str = match entry.severity {
            LogSeverity::Trace => label.bright_black(),
            LogSeverity::Debug => label.cyan(),
            LogSeverity::Info => label.green(),
            LogSeverity::Warn => label.yellow(),
            LogSeverity::Error => label.red().bold(),
        };

        let source = entry.source.bright_blue();

        if let (Some(file), Some(line)) = (entry.file, entry.line) {
            println!(
                "[{}] [{}] [{}] {} ({}:{})",
                timestamp, severity_str, source, entry.message, file, line
            );
        } else {
            println!("[{}] [{}] [{}] {}", timestamp, severity_str, source, entry.message);
        }
    }
}

// ===== LOGGING MACROS =====

/// Log a TRACE message
#[macro_export]
macro_rules! engine_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::kestrel::Engine::log(
            $crate::kestrel::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a DEBUG message
#[macro_export]
macro_rules! engine_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::kestrel::Engine::log(
            $crate::kestrel::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an INFO message
#[macro_export]
macro_rules! engine_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::kestrel::Engine::log(
            $crate::kestrel::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a WARN message
#[macro_export]
macro_rules! engine_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::kestrel::Engine::log(
            $crate::kestrel::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an ERROR message with file:line information
///
/// ```ignore
/// engine_error!("kestrel::renderer", "Failed to upload texture: {}", error);
/// ```
#[macro_export]
macro_rules! engine_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::kestrel::Engine::log_detailed(
            $crate::kestrel::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Log an ERROR and evaluate to `Error::BackendError` carrying the same message
///
/// ```ignore
/// device.create_image(&info, None)
///     .map_err(|e| engine_err!("kestrel::vulkan", "Failed to create image: {:?}", e))?;
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::kestrel::Engine::log_detailed(
            $crate::kestrel::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::kestrel::Error::BackendError(message)
    }};
}

/// Log an ERROR and return `Err(Error::BackendError(..))` from the current function
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
