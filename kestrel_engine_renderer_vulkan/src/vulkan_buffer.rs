/// VulkanBuffer - host-visible vertex or index buffer

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use kestrel_engine::kestrel::render::{BufferState, BufferUsage};
use kestrel_engine::kestrel::{Error, Result};
use kestrel_engine::engine_error;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

pub(crate) struct VulkanBuffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    /// Bytes the native buffer can hold
    pub(crate) capacity: u64,
}

impl VulkanBuffer {
    /// Create a buffer of `state.size` bytes and write the current data
    pub fn new(ctx: Arc<GpuContext>, state: &BufferState) -> Result<Self> {
        let usage = match state.usage {
            BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
        };
        // Zero-sized buffers are invalid in Vulkan
        let capacity = (state.size as u64).max(state.data.len() as u64).max(4);
        let (buffer, allocation) = ctx.create_host_buffer(capacity, usage, "vertex_index_buffer")?;

        let native = Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            capacity,
        };
        native.write(&state.data)?;
        Ok(native)
    }

    /// True when `len` bytes fit without reallocating
    pub(crate) fn fits(&self, len: usize) -> bool {
        len as u64 <= self.capacity
    }

    /// Copy `data` to the start of the mapped memory
    pub(crate) fn write(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if !self.fits(data.len()) {
            return Err(Error::InvalidArgument(format!(
                "{} bytes do not fit in a {} byte buffer",
                data.len(),
                self.capacity
            )));
        }

        let allocation = self.allocation.as_ref().ok_or_else(|| {
            engine_error!("kestrel::vulkan", "Buffer write failed: no GPU allocation");
            Error::BackendError("Buffer has no allocation".to_string())
        })?;
        let mapped = allocation
            .mapped_ptr()
            .ok_or_else(|| Error::BackendError("Buffer is not CPU-accessible".to_string()))?
            .as_ptr() as *mut u8;

        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), mapped, data.len()) };
        Ok(())
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.ctx.allocator().free(allocation).ok();
        }
        unsafe { self.ctx.device.destroy_buffer(self.buffer, None) };
    }
}
