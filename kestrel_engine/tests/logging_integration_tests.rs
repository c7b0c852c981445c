//! Integration tests for Engine logging and the renderer's log output
//!
//! No GPU required.
//!
//! Run with: cargo test --test logging_integration_tests

use kestrel_engine::glam::UVec2;
use kestrel_engine::kestrel::log::{LogEntry, LogSeverity, Logger};
use kestrel_engine::kestrel::render::{EmptyDevice, Renderer, RendererSettings, TextureDesc};
use kestrel_engine::kestrel::{Engine, Error};
use serial_test::serial;
use std::sync::{Arc, Mutex};

// ============================================================================
// TEST LOGGER IMPLEMENTATION
// ============================================================================

/// Test logger that captures log entries for verification
struct TestLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl TestLogger {
    fn new() -> (Self, Arc<Mutex<Vec<LogEntry>>>) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        (Self { entries: entries.clone() }, entries)
    }
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn captured(entries: &Arc<Mutex<Vec<LogEntry>>>, severity: LogSeverity, source: &str) -> Vec<String> {
    entries
        .lock()
        .unwrap()
        .iter()
        .filter(|entry| entry.severity == severity && entry.source == source)
        .map(|entry| entry.message.clone())
        .collect()
}

// ============================================================================
// LOGGING TESTS
// ============================================================================

#[test]
#[serial]
fn test_integration_custom_logger() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    Engine::log(LogSeverity::Info, "test::module", "Test info message".to_string());
    Engine::log(LogSeverity::Warn, "test::module", "Test warning message".to_string());

    {
        let captured_entries = entries.lock().unwrap();
        assert_eq!(captured_entries.len(), 2);
        assert_eq!(captured_entries[0].severity, LogSeverity::Info);
        assert_eq!(captured_entries[0].message, "Test info message");
        assert_eq!(captured_entries[1].severity, LogSeverity::Warn);
        assert_eq!(captured_entries[1].message, "Test warning message");
    }

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_upload_failure_logged_with_location() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    let settings = RendererSettings::default();
    let device = EmptyDevice::new(&settings);
    let probe = device.probe();
    let renderer = Renderer::new(settings, Box::new(device)).unwrap();
    renderer
        .create_texture(&TextureDesc {
            size: UVec2::new(4, 4),
            ..Default::default()
        })
        .unwrap();

    probe.fail_next_upload(Error::OutOfMemory);
    assert!(renderer.process().is_err());

    let errors: Vec<LogEntry> = entries
        .lock()
        .unwrap()
        .iter()
        .filter(|entry| entry.severity == LogSeverity::Error)
        .cloned()
        .collect();
    assert!(errors.iter().any(|entry| entry.source == "kestrel::upload"));
    assert!(errors.iter().all(|entry| entry.file.is_some() && entry.line.is_some()));

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_device_loss_logged_as_warning() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    let settings = RendererSettings::default();
    let device = EmptyDevice::new(&settings);
    let probe = device.probe();
    let renderer = Renderer::new(settings, Box::new(device)).unwrap();
    renderer.process().unwrap();

    probe.lose_device();
    renderer.end_frame(renderer.begin_frame());
    assert_eq!(renderer.process().unwrap_err(), Error::DeviceLost);
    renderer.process().unwrap();

    assert_eq!(captured(&entries, LogSeverity::Warn, "kestrel::renderer").len(), 1);
    assert!(!captured(&entries, LogSeverity::Info, "kestrel::renderer").is_empty());
    assert!(captured(&entries, LogSeverity::Error, "kestrel::renderer").is_empty());

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_logger_reset() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);
    Engine::log(LogSeverity::Info, "test", "Before reset".to_string());
    assert_eq!(entries.lock().unwrap().len(), 1);

    Engine::reset_logger();
    Engine::log(LogSeverity::Info, "test", "After reset".to_string());

    assert_eq!(entries.lock().unwrap().len(), 1);
}
