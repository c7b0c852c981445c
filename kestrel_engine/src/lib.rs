/*!
# Kestrel Engine

Render resource lifecycle and command submission.

The game thread creates, mutates and drops logical resources (textures,
buffers, render targets, blend and depth-stencil states) and records frames.
The render thread calls `Renderer::process()` once per frame: it drains the
command queue, reconciles dirty resources with the native device, executes
the latest recorded frame and releases dropped resources.

## Architecture

- **Renderer**: Frontend shared by both threads
- **RenderDevice**: Render-thread side of a native graphics API
- **EmptyDevice**: Headless device that records every native call
- **ResourceTable**: Id-keyed storage of logical resource state
- **CommandQueue**: Upload/destroy commands from the game thread

Native backends (Vulkan, ...) register a device factory at startup.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod renderer;

// Main kestrel namespace module
pub mod kestrel {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton
    pub use crate::engine::Engine;

    // Renderer frontend
    pub use crate::renderer::Renderer;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // Render sub-module with all rendering types
    pub mod render {
        pub use crate::renderer::*;
    }
}

// Re-export math library at crate root
pub use glam;
