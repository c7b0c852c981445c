//! Error types for the Kestrel engine
//!
//! Three families share one enum:
//! - configuration errors, reported synchronously by the call that introduced them,
//! - native errors, reported by the render thread when an upload or a frame fails,
//! - usage errors, reported when the API is driven in a way it does not allow.

use std::fmt;

/// Result type for Kestrel engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Kestrel engine errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    // ===== CONFIGURATION =====

    /// An argument is out of range or inconsistent with the resource description
    InvalidArgument(String),

    /// Pixel format has no encoding for the active backend or is not usable here
    InvalidPixelFormat(String),

    /// Mip level count or mip level sizes are inconsistent
    InvalidMipLevels(String),

    // ===== NATIVE =====

    /// The native device was lost; every resource is recreated on the next frame
    DeviceLost,

    /// Out of GPU memory
    OutOfMemory,

    /// Render target attachments do not form a complete framebuffer
    IncompleteFramebuffer(String),

    /// Backend-specific error (Vulkan, etc.)
    BackendError(String),

    // ===== USAGE =====

    /// Data was supplied to a resource created without the DYNAMIC flag
    NotDynamic,

    /// Data payload is empty
    EmptyData,

    /// Resource has not been created on the device yet
    NotInitialized(String),

    /// Resource id does not refer to a live resource
    InvalidResource(String),

    // ===== SETUP =====

    /// Initialization failed (engine, renderer, device)
    InitializationFailed(String),
}

impl Error {
    /// True for errors raised by the native graphics API
    pub fn is_native(&self) -> bool {
        matches!(
            self,
            Error::DeviceLost
                | Error::OutOfMemory
                | Error::IncompleteFramebuffer(_)
                | Error::BackendError(_)
        )
    }

    /// True for errors caused by an invalid resource description
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument(_) | Error::InvalidPixelFormat(_) | Error::InvalidMipLevels(_)
        )
    }

    /// True for API contract violations
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Error::NotDynamic
                | Error::EmptyData
                | Error::NotInitialized(_)
                | Error::InvalidResource(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::InvalidPixelFormat(msg) => write!(f, "Invalid pixel format: {}", msg),
            Error::InvalidMipLevels(msg) => write!(f, "Invalid mip map count: {}", msg),
            Error::DeviceLost => write!(f, "Device lost"),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::IncompleteFramebuffer(msg) => write!(f, "Incomplete framebuffer: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::NotDynamic => write!(f, "Resource is not dynamic"),
            Error::EmptyData => write!(f, "Data is empty"),
            Error::NotInitialized(msg) => write!(f, "Resource not initialized: {}", msg),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
