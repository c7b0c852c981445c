/// Pending-change categories and the per-resource lifecycle state

use bitflags::bitflags;

bitflags! {
    /// Categories of logical state not yet reflected in the native object
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DirtyFlags: u32 {
        /// Payload bytes (texture levels, buffer contents)
        const DATA = 0x01;
        /// Filter, addressing, anisotropy
        const SAMPLER = 0x02;
        /// Clear flags, clear color, clear depth
        const CLEAR = 0x04;
        /// Size or layout changed: the native object must be recreated
        const SIZE = 0x08;
    }
}

/// Lifecycle of a device-side resource
///
/// ```text
/// Uninitialized -> Creating -> Ready
///                     ^          |
///                     +- Reloading (device lost, swap-chain resize)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    /// No native object exists yet
    #[default]
    Uninitialized,
    /// First creation is in progress on the render thread
    Creating,
    /// Native object exists and can be referenced by draw commands
    Ready,
    /// Native object is being recreated from the logical state
    Reloading,
}

impl ResourceState {
    /// State entered when an upload starts
    pub fn begin_upload(self) -> ResourceState {
        match self {
            ResourceState::Uninitialized => ResourceState::Creating,
            other => other,
        }
    }

    /// State after a successful upload
    pub fn complete(self) -> ResourceState {
        ResourceState::Ready
    }

    /// State after a failed upload: never half-constructed
    pub fn fail(self) -> ResourceState {
        match self {
            ResourceState::Creating => ResourceState::Uninitialized,
            other => other,
        }
    }

    /// True when the native object may be referenced
    pub fn is_ready(self) -> bool {
        self == ResourceState::Ready
    }
}
