//! Unit tests for log.rs
//!
//! Tests LogSeverity, LogEntry, entry formatting and DefaultLogger.

use crate::log::{format_entry, DefaultLogger, LogEntry, LogSeverity, Logger};
use std::sync::Mutex;
use std::time::SystemTime;

fn entry(severity: LogSeverity, source: &str, message: &str) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: source.to_string(),
        message: message.to_string(),
        file: None,
        line: None,
    }
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_labels_have_fixed_width() {
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        assert_eq!(severity.label().len(), 5);
    }
    assert_eq!(LogSeverity::Info.label(), "INFO ");
    assert_eq!(LogSeverity::Error.label(), "ERROR");
}

// ============================================================================
// FORMAT TESTS
// ============================================================================

#[test]
fn test_format_entry_without_location() {
    let line = format_entry(&entry(LogSeverity::Info, "kestrel::renderer", "Renderer created"));

    assert!(line.contains("[INFO ]"));
    assert!(line.contains("[kestrel::renderer]"));
    assert!(line.ends_with("Renderer created"));
}

#[test]
fn test_format_entry_with_location() {
    let mut e = entry(LogSeverity::Error, "kestrel::vulkan", "Device lost");
    e.file = Some("vulkan_device.rs");
    e.line = Some(42);

    let line = format_entry(&e);
    assert!(line.contains("[ERROR]"));
    assert!(line.ends_with("Device lost (vulkan_device.rs:42)"));
}

#[test]
fn test_format_entry_timestamp_shape() {
    let line = format_entry(&entry(LogSeverity::Debug, "test", "x"));

    // "[YYYY-MM-DD HH:MM:SS.mmm] ..."
    let close = line.find(']').unwrap();
    assert_eq!(close, 24);
    assert_eq!(&line[5..6], "-");
    assert_eq!(&line[20..21], ".");
}

#[test]
fn test_log_entry_clone() {
    let mut e1 = entry(LogSeverity::Warn, "test", "warning");
    e1.file = Some("test.rs");
    e1.line = Some(10);

    let e2 = e1.clone();
    assert_eq!(e1.severity, e2.severity);
    assert_eq!(e1.source, e2.source);
    assert_eq!(e1.message, e2.message);
    assert_eq!(e1.file, e2.file);
    assert_eq!(e1.line, e2.line);
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_default_logger_all_severities() {
    let logger = DefaultLogger;

    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        logger.log(&entry(severity, "test", "message"));

        let mut located = entry(severity, "test", "message with location");
        located.file = Some("test.rs");
        located.line = Some(7);
        logger.log(&located);
    }
}

#[test]
fn test_logger_trait_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DefaultLogger>();
}

// ============================================================================
// CUSTOM LOGGER TESTS
// ============================================================================

struct CollectingLogger {
    lines: Mutex<Vec<String>>,
}

impl Logger for CollectingLogger {
    fn log(&self, entry: &LogEntry) {
        self.lines.lock().unwrap().push(format_entry(entry));
    }
}

#[test]
fn test_custom_logger_implementation() {
    let logger = CollectingLogger { lines: Mutex::new(Vec::new()) };

    logger.log(&entry(LogSeverity::Info, "a", "first"));
    logger.log(&entry(LogSeverity::Warn, "b", "second"));

    let lines = logger.lines.lock().unwrap();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("first"));
    assert!(lines[1].contains("[WARN ]"));
}
