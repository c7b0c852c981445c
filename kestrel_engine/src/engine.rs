/// Kestrel Engine - Singleton manager for the renderer and the logger
///
/// The renderer singleton is stored behind a RwLock and handed out as an
/// `Arc<Renderer>`, so the game thread and the render thread can each hold
/// a reference.

use std::sync::{Arc, OnceLock, RwLock};
use std::time::SystemTime;

use crate::error::{Error, Result};
use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
use crate::renderer::Renderer;

// ===== INTERNAL STATE =====

/// Global engine state storage
static ENGINE_STATE: OnceLock<EngineState> = OnceLock::new();

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Internal state structure holding all engine singletons
struct EngineState {
    renderer: RwLock<Option<Arc<Renderer>>>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            renderer: RwLock::new(None),
        }
    }
}

// ===== PUBLIC API =====

/// Main engine singleton manager
///
/// # Example
///
/// ```no_run
/// use kestrel_engine::kestrel::{Engine, render::{Renderer, RendererSettings}};
///
/// Engine::initialize()?;
/// let renderer = Engine::create_renderer(Renderer::with_driver(RendererSettings::default(), None)?)?;
///
/// // Render thread
/// renderer.process()?;
///
/// Engine::shutdown();
/// # Ok::<(), kestrel_engine::kestrel::Error>(())
/// ```
pub struct Engine;

impl Engine {
    /// Log errors before returning them
    fn log_and_return_error(error: Error) -> Error {
        match &error {
            Error::InitializationFailed(msg) => {
                crate::engine_error!("kestrel::Engine", "Initialization failed: {}", msg);
            }
            _ => {
                crate::engine_error!("kestrel::Engine", "Engine error: {}", error);
            }
        }
        error
    }

    fn state() -> Result<&'static EngineState> {
        ENGINE_STATE.get().ok_or_else(|| {
            Self::log_and_return_error(Error::InitializationFailed(
                "Engine not initialized. Call Engine::initialize() first.".to_string(),
            ))
        })
    }

    /// Initialize the engine (idempotent)
    pub fn initialize() -> Result<()> {
        ENGINE_STATE.get_or_init(EngineState::new);
        Ok(())
    }

    /// Drop the renderer singleton
    ///
    /// Clones of the `Arc<Renderer>` held elsewhere stay valid until dropped.
    pub fn shutdown() {
        if let Some(state) = ENGINE_STATE.get() {
            if let Ok(mut renderer) = state.renderer.write() {
                *renderer = None;
            }
        }
    }

    /// Register `renderer` as the singleton and return a shared reference
    ///
    /// # Errors
    ///
    /// - The engine is not initialized
    /// - A renderer already exists
    pub fn create_renderer(renderer: Renderer) -> Result<Arc<Renderer>> {
        let state = Self::state()?;

        let mut lock = state.renderer.write().map_err(|_| {
            Self::log_and_return_error(Error::BackendError("Renderer lock poisoned".to_string()))
        })?;

        if lock.is_some() {
            return Err(Self::log_and_return_error(Error::InitializationFailed(
                "Renderer already exists. Call Engine::destroy_renderer() first.".to_string(),
            )));
        }

        let renderer = Arc::new(renderer);
        *lock = Some(Arc::clone(&renderer));

        crate::engine_info!("kestrel::Engine", "Renderer singleton created successfully");
        Ok(renderer)
    }

    /// Get the renderer singleton
    pub fn renderer() -> Result<Arc<Renderer>> {
        let state = Self::state()?;

        let lock = state.renderer.read().map_err(|_| {
            Self::log_and_return_error(Error::BackendError("Renderer lock poisoned".to_string()))
        })?;

        lock.clone().ok_or_else(|| {
            Self::log_and_return_error(Error::InitializationFailed(
                "Renderer not created. Call Engine::create_renderer() first.".to_string(),
            ))
        })
    }

    /// Destroy the renderer singleton
    pub fn destroy_renderer() -> Result<()> {
        let state = Self::state()?;

        let mut lock = state.renderer.write().map_err(|_| {
            Self::log_and_return_error(Error::BackendError("Renderer lock poisoned".to_string()))
        })?;

        *lock = None;

        crate::engine_info!("kestrel::Engine", "Renderer singleton destroyed");
        Ok(())
    }

    /// Reset all singletons for testing (only available in test builds)
    #[cfg(test)]
    pub fn reset_for_testing() {
        if let Some(state) = ENGINE_STATE.get() {
            if let Ok(mut renderer) = state.renderer.write() {
                *renderer = None;
            }
        }
    }

    // ===== LOGGING API =====

    /// Replace the default logger (file logger, capture logger, ...)
    ///
    /// ```no_run
    /// use kestrel_engine::kestrel::{Engine, log::{Logger, LogEntry}};
    ///
    /// struct FileLogger;
    /// impl Logger for FileLogger {
    ///     fn log(&self, entry: &LogEntry) {
    ///         // Write to file...
    ///     }
    /// }
    ///
    /// Engine::set_logger(FileLogger);
    /// ```
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(mut lock) = logger_lock.write() {
            *lock = Box::new(logger);
        }
    }

    /// Reset logger to DefaultLogger
    pub fn reset_logger() {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(mut lock) = logger_lock.write() {
            *lock = Box::new(DefaultLogger);
        }
    }

    /// Logging entry point of the engine_trace!..engine_warn! macros
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(lock) = logger_lock.read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: None,
                line: None,
            });
        }
    }

    /// Logging entry point with file:line, used by engine_error!
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(lock) = logger_lock.read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: Some(file),
                line: Some(line),
            });
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
