//! Unit tests for Engine singleton manager
//!
//! ENGINE_STATE and LOGGER are process-wide, so every test is #[serial].

use crate::kestrel::log::{LogEntry, LogSeverity, Logger};
use crate::kestrel::{Engine, Error};
use crate::renderer::{EmptyDevice, Renderer, RendererSettings};
use serial_test::serial;
use std::sync::{Arc, Mutex};

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Test logger that captures log entries for verification
struct TestLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl TestLogger {
    fn new() -> (Self, Arc<Mutex<Vec<LogEntry>>>) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                entries: Arc::clone(&entries),
            },
            entries,
        )
    }
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn setup() {
    Engine::reset_for_testing();
    Engine::reset_logger();
    Engine::initialize().unwrap();
}

fn empty_renderer() -> Renderer {
    let settings = RendererSettings::default();
    let device = Box::new(EmptyDevice::new(&settings));
    Renderer::new(settings, device).unwrap()
}

// ============================================================================
// INITIALIZATION AND SHUTDOWN
// ============================================================================

#[test]
#[serial]
fn test_initialize_is_idempotent() {
    setup();
    assert!(Engine::initialize().is_ok());
    assert!(Engine::initialize().is_ok());
}

#[test]
#[serial]
fn test_shutdown_clears_renderer() {
    setup();
    Engine::create_renderer(empty_renderer()).unwrap();

    Engine::shutdown();

    assert!(matches!(Engine::renderer(), Err(Error::InitializationFailed(_))));
}

#[test]
#[serial]
fn test_shutdown_idempotent() {
    setup();
    Engine::shutdown();
    Engine::shutdown();
    assert!(Engine::renderer().is_err());
}

#[test]
#[serial]
fn test_shutdown_keeps_outstanding_references_alive() {
    setup();
    let renderer = Engine::create_renderer(empty_renderer()).unwrap();

    Engine::shutdown();

    assert!(renderer.process().is_ok());
}

// ============================================================================
// RENDERER SINGLETON
// ============================================================================

#[test]
#[serial]
fn test_create_renderer_success() {
    setup();
    let renderer = Engine::create_renderer(empty_renderer()).unwrap();

    let fetched = Engine::renderer().unwrap();

    assert!(Arc::ptr_eq(&renderer, &fetched));
}

#[test]
#[serial]
fn test_create_renderer_twice_fails() {
    setup();
    Engine::create_renderer(empty_renderer()).unwrap();

    let result = Engine::create_renderer(empty_renderer());

    assert!(matches!(result, Err(Error::InitializationFailed(_))));
}

#[test]
#[serial]
fn test_renderer_not_created_fails() {
    setup();
    assert!(matches!(Engine::renderer(), Err(Error::InitializationFailed(_))));
}

#[test]
#[serial]
fn test_destroy_renderer_allows_recreation() {
    setup();
    Engine::create_renderer(empty_renderer()).unwrap();

    Engine::destroy_renderer().unwrap();

    assert!(Engine::renderer().is_err());
    assert!(Engine::create_renderer(empty_renderer()).is_ok());
}

#[test]
#[serial]
fn test_destroy_renderer_without_renderer_is_ok() {
    setup();
    assert!(Engine::destroy_renderer().is_ok());
}

#[test]
#[serial]
fn test_renderer_shared_between_threads() {
    setup();
    Engine::create_renderer(empty_renderer()).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            std::thread::spawn(|| {
                let renderer = Engine::renderer().unwrap();
                renderer.resource_count()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 1);
    }
}

// ============================================================================
// LOGGING
// ============================================================================

#[test]
#[serial]
fn test_default_logger_logs_without_panic() {
    setup();
    Engine::log(LogSeverity::Info, "kestrel::test", "message".to_string());
    Engine::log_detailed(LogSeverity::Error, "kestrel::test", "error".to_string(), file!(), line!());
}

#[test]
#[serial]
fn test_custom_logger_receives_entries() {
    setup();
    let (logger, entries) = TestLogger::new();
    Engine::set_logger(logger);

    Engine::log(LogSeverity::Warn, "kestrel::test", "watch out".to_string());

    let entries = entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, LogSeverity::Warn);
    assert_eq!(entries[0].source, "kestrel::test");
    assert_eq!(entries[0].message, "watch out");
    assert!(entries[0].file.is_none());
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_log_detailed_records_location() {
    setup();
    let (logger, entries) = TestLogger::new();
    Engine::set_logger(logger);

    Engine::log_detailed(LogSeverity::Error, "kestrel::test", "boom".to_string(), "renderer.rs", 42);

    let entries = entries.lock().unwrap();
    assert_eq!(entries[0].file, Some("renderer.rs"));
    assert_eq!(entries[0].line, Some(42));
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_reset_logger_detaches_custom_logger() {
    setup();
    let (logger, entries) = TestLogger::new();
    Engine::set_logger(logger);

    Engine::reset_logger();
    Engine::log(LogSeverity::Info, "kestrel::test", "ignored".to_string());

    assert!(entries.lock().unwrap().is_empty());
}

#[test]
#[serial]
fn test_engine_errors_are_logged() {
    setup();
    let (logger, entries) = TestLogger::new();
    Engine::set_logger(logger);

    let _ = Engine::renderer();

    let entries = entries.lock().unwrap();
    assert!(entries
        .iter()
        .any(|entry| entry.severity == LogSeverity::Error && entry.source == "kestrel::Engine"));
    drop(entries);
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_renderer_creation_is_logged() {
    setup();
    let (logger, entries) = TestLogger::new();
    Engine::set_logger(logger);

    Engine::create_renderer(empty_renderer()).unwrap();

    let entries = entries.lock().unwrap();
    assert!(entries.iter().any(|entry| entry.source == "kestrel::renderer"));
    assert!(entries.iter().any(|entry| entry.source == "kestrel::Engine"));
    drop(entries);
    Engine::reset_logger();
}
