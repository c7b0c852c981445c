/// Resource table: stable ids mapped to shared logical resource slots
///
/// The table lock only guards insertion, lookup and removal. Each entry
/// carries its own lock that the game thread takes to mutate logical state
/// and the render thread takes for the whole duration of an upload.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use slotmap::SlotMap;

use crate::renderer::buffer::BufferState;
use crate::renderer::command_queue::{Command, CommandQueue};
use crate::renderer::dirty::{DirtyFlags, ResourceState};
use crate::renderer::render_state::{BlendStateDesc, DepthStencilStateDesc};
use crate::renderer::render_target::RenderTargetState;
use crate::renderer::texture::TextureState;

slotmap::new_key_type! {
    /// Stable identifier of a logical resource
    pub struct ResourceId;
}

/// Opaque native handle as exposed to callers
///
/// Only meaningful to the device that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub u64);

/// Resource kind, used for upload ordering and bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Texture,
    Buffer,
    RenderTarget,
    BlendState,
    DepthStencilState,
}

/// Logical description of a resource, mirrored on the device by uploads
#[derive(Debug, Clone)]
pub enum ResourceDesc {
    Texture(TextureState),
    Buffer(BufferState),
    RenderTarget(RenderTargetState),
    BlendState(BlendStateDesc),
    DepthStencilState(DepthStencilStateDesc),
}

impl ResourceDesc {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceDesc::Texture(_) => ResourceKind::Texture,
            ResourceDesc::Buffer(_) => ResourceKind::Buffer,
            ResourceDesc::RenderTarget(_) => ResourceKind::RenderTarget,
            ResourceDesc::BlendState(_) => ResourceKind::BlendState,
            ResourceDesc::DepthStencilState(_) => ResourceKind::DepthStencilState,
        }
    }

    /// Dirty bits that rebuild the native object from scratch
    pub fn full_dirty(&self) -> DirtyFlags {
        match self {
            ResourceDesc::Texture(_) | ResourceDesc::RenderTarget(_) => DirtyFlags::all(),
            ResourceDesc::Buffer(_)
            | ResourceDesc::BlendState(_)
            | ResourceDesc::DepthStencilState(_) => DirtyFlags::DATA | DirtyFlags::SIZE,
        }
    }

    pub fn as_texture(&self) -> Option<&TextureState> {
        match self {
            ResourceDesc::Texture(texture) => Some(texture),
            _ => None,
        }
    }

    pub fn as_texture_mut(&mut self) -> Option<&mut TextureState> {
        match self {
            ResourceDesc::Texture(texture) => Some(texture),
            _ => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&BufferState> {
        match self {
            ResourceDesc::Buffer(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn as_buffer_mut(&mut self) -> Option<&mut BufferState> {
        match self {
            ResourceDesc::Buffer(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn as_render_target(&self) -> Option<&RenderTargetState> {
        match self {
            ResourceDesc::RenderTarget(target) => Some(target),
            _ => None,
        }
    }

    pub fn as_render_target_mut(&mut self) -> Option<&mut RenderTargetState> {
        match self {
            ResourceDesc::RenderTarget(target) => Some(target),
            _ => None,
        }
    }
}

/// Logical state plus the bookkeeping shared by both threads
#[derive(Debug)]
pub struct ResourceSlot {
    pub desc: ResourceDesc,
    /// Changes not yet reflected in the native object
    pub dirty: DirtyFlags,
    pub state: ResourceState,
    /// Handle of the current native object, if any
    pub handle: Option<NativeHandle>,
    /// Set once the owning facade is dropped
    pub pending_destroy: bool,
}

impl ResourceSlot {
    fn new(desc: ResourceDesc) -> Self {
        let dirty = desc.full_dirty();
        Self {
            desc,
            dirty,
            state: ResourceState::Uninitialized,
            handle: None,
            pending_destroy: false,
        }
    }
}

/// One table entry: a kind tag and the lock around the slot
#[derive(Debug)]
pub struct ResourceEntry {
    id: ResourceId,
    kind: ResourceKind,
    slot: Mutex<ResourceSlot>,
}

impl ResourceEntry {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Take the per-resource lock
    ///
    /// A poisoned lock still holds consistent logical state: every mutator
    /// validates before writing, so the guard is recovered.
    pub fn lock(&self) -> MutexGuard<'_, ResourceSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Id-indexed storage of all live logical resources
#[derive(Debug, Default)]
pub struct ResourceTable {
    entries: Mutex<SlotMap<ResourceId, Arc<ResourceEntry>>>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, SlotMap<ResourceId, Arc<ResourceEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a new resource; its slot starts fully dirty
    pub fn insert(&self, desc: ResourceDesc) -> Arc<ResourceEntry> {
        let kind = desc.kind();
        let mut entries = self.entries();
        let id = entries.insert_with_key(|id| {
            Arc::new(ResourceEntry {
                id,
                kind,
                slot: Mutex::new(ResourceSlot::new(desc)),
            })
        });
        Arc::clone(&entries[id])
    }

    pub fn get(&self, id: ResourceId) -> Option<Arc<ResourceEntry>> {
        self.entries().get(id).cloned()
    }

    pub fn remove(&self, id: ResourceId) -> Option<Arc<ResourceEntry>> {
        self.entries().remove(id)
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.entries().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Number of live entries of one kind
    pub fn count_of(&self, kind: ResourceKind) -> usize {
        self.entries().values().filter(|entry| entry.kind == kind).count()
    }

    /// Snapshot of every entry, for whole-table passes
    pub fn snapshot(&self) -> Vec<Arc<ResourceEntry>> {
        self.entries().values().cloned().collect()
    }
}

/// Table and queue shared by the frontend and every facade
#[derive(Debug, Default)]
pub struct ResourceContext {
    pub table: ResourceTable,
    pub queue: CommandQueue,
}

impl ResourceContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a resource and queue its first upload
    pub(crate) fn register(self: &Arc<Self>, desc: ResourceDesc) -> ResourceHandle {
        let entry = self.table.insert(desc);
        let id = entry.id();
        self.queue.push(Command::Upload(id));
        ResourceHandle {
            id,
            entry,
            context: Arc::clone(self),
        }
    }
}

/// Ownership token held by a facade
///
/// Dropping it flags the slot and queues the deferred destroy.
#[derive(Debug)]
pub(crate) struct ResourceHandle {
    id: ResourceId,
    entry: Arc<ResourceEntry>,
    context: Arc<ResourceContext>,
}

impl ResourceHandle {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn lock(&self) -> MutexGuard<'_, ResourceSlot> {
        self.entry.lock()
    }

    pub fn native_handle(&self) -> Option<NativeHandle> {
        self.lock().handle
    }

    pub fn state(&self) -> ResourceState {
        self.lock().state
    }

    /// Apply `apply` to the logical state and commit `dirty` on success
    ///
    /// `apply` must validate before writing: an error leaves the slot and
    /// the queue untouched. Exactly one upload is queued per successful call.
    pub fn mutate<R>(
        &self,
        dirty: DirtyFlags,
        apply: impl FnOnce(&mut ResourceDesc) -> crate::error::Result<R>,
    ) -> crate::error::Result<R> {
        let result = {
            let mut slot = self.lock();
            let result = apply(&mut slot.desc)?;
            slot.dirty |= dirty;
            result
        };
        self.context.queue.push(Command::Upload(self.id));
        Ok(result)
    }

    /// Like `mutate`, but also flips the slot into `Reloading`
    pub fn reload<R>(
        &self,
        dirty: DirtyFlags,
        apply: impl FnOnce(&mut ResourceDesc) -> crate::error::Result<R>,
    ) -> crate::error::Result<R> {
        let result = {
            let mut slot = self.lock();
            let result = apply(&mut slot.desc)?;
            slot.dirty |= dirty;
            if slot.state == ResourceState::Ready {
                slot.state = ResourceState::Reloading;
            }
            result
        };
        self.context.queue.push(Command::Upload(self.id));
        Ok(result)
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        self.lock().pending_destroy = true;
        self.context.queue.push(Command::Destroy(self.id));
    }
}

#[cfg(test)]
#[path = "resource_table_tests.rs"]
mod tests;
