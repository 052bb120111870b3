//! Command buffer management.
//!
//! [`CommandSet`] holds one primary command buffer per swapchain image,
//! allocated from the device's graphics pool. Recorded commands reference
//! framebuffers and extents, so the whole set is freed and reallocated
//! whenever the swapchain resource set is rebuilt.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Thin recording wrapper over a `vk::CommandBuffer`.
///
/// Non-owning: the buffer is returned to its pool when the owning
/// [`CommandSet`] frees it.
pub struct CommandBuffer {
    device: Arc<Device>,
    buffer: vk::CommandBuffer,
}

impl CommandBuffer {
    /// Wrap an existing buffer handle for recording.
    #[inline]
    pub fn from_handle(device: Arc<Device>, buffer: vk::CommandBuffer) -> Self {
        Self { device, buffer }
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    /// Begin recording. The buffer may be submitted any number of times; it
    /// is only re-recorded after a swapchain rebuild.
    pub fn begin(&self) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default();
        unsafe {
            self.device
                .handle()
                .begin_command_buffer(self.buffer, &begin_info)?;
        }
        Ok(())
    }

    /// Finish recording.
    pub fn end(&self) -> RhiResult<()> {
        unsafe {
            self.device.handle().end_command_buffer(self.buffer)?;
        }
        Ok(())
    }

    /// Begin the render pass over the full framebuffer with a clear color.
    pub fn begin_render_pass(
        &self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) {
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear_color,
            },
        }];

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        unsafe {
            self.device.handle().cmd_begin_render_pass(
                self.buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
        }
    }

    /// End the current render pass.
    pub fn end_render_pass(&self) {
        unsafe {
            self.device.handle().cmd_end_render_pass(self.buffer);
        }
    }
}

/// One command buffer per swapchain image.
pub struct CommandSet {
    device: Arc<Device>,
    buffers: Vec<vk::CommandBuffer>,
}

impl CommandSet {
    /// Allocate `count` primary buffers from the device's graphics pool.
    pub fn allocate(device: Arc<Device>, count: u32) -> RhiResult<Self> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(device.graphics_pool())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        let buffers = unsafe { device.handle().allocate_command_buffers(&alloc_info)? };
        debug!("Allocated {} command buffer(s)", count);

        Ok(Self { device, buffers })
    }

    /// Return every buffer to the pool. Safe to call when already empty.
    ///
    /// All submissions using these buffers must have completed; the rebuild
    /// path guarantees that with a device-idle wait.
    pub fn free(&mut self) {
        if self.buffers.is_empty() {
            return;
        }
        unsafe {
            self.device
                .handle()
                .free_command_buffers(self.device.graphics_pool(), &self.buffers);
        }
        debug!("Freed {} command buffer(s)", self.buffers.len());
        self.buffers.clear();
    }

    /// Free and reallocate for a new swapchain image count.
    pub fn rebuild(&mut self, count: u32) -> RhiResult<()> {
        self.free();
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.device.graphics_pool())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        self.buffers = unsafe { self.device.handle().allocate_command_buffers(&alloc_info)? };
        debug!("Reallocated {} command buffer(s)", count);
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Raw handle for the buffer recorded against swapchain image `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn buffer(&self, index: usize) -> vk::CommandBuffer {
        self.buffers[index]
    }

    /// Recording wrapper for the buffer at `index`.
    #[inline]
    pub fn recorder(&self, index: usize) -> CommandBuffer {
        CommandBuffer::from_handle(self.device.clone(), self.buffers[index])
    }
}

impl Drop for CommandSet {
    fn drop(&mut self) {
        self.free();
    }
}
