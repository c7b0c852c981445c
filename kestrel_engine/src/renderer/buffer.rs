/// Vertex/index buffer facade and logical buffer state

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::renderer::dirty::{DirtyFlags, ResourceState};
use crate::renderer::resource_table::{
    NativeHandle, ResourceContext, ResourceDesc, ResourceHandle, ResourceId,
};
use crate::renderer::types::{BufferFlags, BufferUsage};

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    pub usage: BufferUsage,
    pub flags: BufferFlags,
    /// Capacity hint in bytes; 0 uses the length of `data`
    pub size: u32,
    pub data: Vec<u8>,
}

/// Logical buffer state, owned by the resource slot
#[derive(Debug, Clone)]
pub struct BufferState {
    pub usage: BufferUsage,
    pub flags: BufferFlags,
    /// Requested capacity, never smaller than `data`
    pub size: u32,
    pub data: Vec<u8>,
}

impl BufferState {
    pub fn new(desc: BufferDesc) -> Result<Self> {
        let dynamic = desc.flags.contains(BufferFlags::DYNAMIC);
        if !dynamic && desc.data.is_empty() {
            return Err(Error::InvalidArgument(
                "Immutable buffers need initial data".to_string(),
            ));
        }

        let data_len = u32::try_from(desc.data.len()).map_err(|_| {
            Error::InvalidArgument(format!("Buffer data too large: {} bytes", desc.data.len()))
        })?;
        let size = desc.size.max(data_len);
        if size == 0 {
            return Err(Error::InvalidArgument("Buffer size is zero".to_string()));
        }

        Ok(Self {
            usage: desc.usage,
            flags: desc.flags,
            size,
            data: desc.data,
        })
    }

    pub fn is_dynamic(&self) -> bool {
        self.flags.contains(BufferFlags::DYNAMIC)
    }

    /// Replace the contents; capacity grows to fit
    pub fn set_data(&mut self, data: Vec<u8>) -> Result<()> {
        if !self.is_dynamic() {
            return Err(Error::NotDynamic);
        }
        if data.is_empty() {
            return Err(Error::EmptyData);
        }
        let data_len = u32::try_from(data.len()).map_err(|_| {
            Error::InvalidArgument(format!("Buffer data too large: {} bytes", data.len()))
        })?;
        self.size = self.size.max(data_len);
        self.data = data;
        Ok(())
    }
}

/// Game-thread handle to a vertex or index buffer
#[derive(Debug)]
pub struct Buffer {
    handle: ResourceHandle,
}

impl Buffer {
    pub fn id(&self) -> ResourceId {
        self.handle.id()
    }

    pub fn native_handle(&self) -> Option<NativeHandle> {
        self.handle.native_handle()
    }

    pub fn resource_state(&self) -> ResourceState {
        self.handle.state()
    }

    fn read<R>(&self, f: impl FnOnce(&BufferState) -> R) -> R {
        let slot = self.handle.lock();
        match slot.desc.as_buffer() {
            Some(buffer) => f(buffer),
            None => unreachable!("buffer facade bound to a non-buffer slot"),
        }
    }

    /// Copy of the logical state
    pub fn state(&self) -> BufferState {
        self.read(BufferState::clone)
    }

    pub fn usage(&self) -> BufferUsage {
        self.read(|b| b.usage)
    }

    pub fn flags(&self) -> BufferFlags {
        self.read(|b| b.flags)
    }

    /// Current capacity in bytes
    pub fn size(&self) -> u32 {
        self.read(|b| b.size)
    }

    pub fn data(&self) -> Vec<u8> {
        self.read(|b| b.data.clone())
    }

    /// Replace the contents of a dynamic buffer
    pub fn set_data(&self, data: Vec<u8>) -> Result<()> {
        self.handle.mutate(DirtyFlags::DATA, |desc| match desc.as_buffer_mut() {
            Some(buffer) => buffer.set_data(data),
            None => Err(Error::InvalidResource("Not a buffer".to_string())),
        })
    }

    /// Replace the contents from a slice of plain-old-data values
    pub fn set_data_from<T: bytemuck::Pod>(&self, values: &[T]) -> Result<()> {
        self.set_data(bytemuck::cast_slice(values).to_vec())
    }
}

pub(crate) fn register(context: &Arc<ResourceContext>, state: BufferState) -> Buffer {
    Buffer {
        handle: context.register(ResourceDesc::Buffer(state)),
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
