//! The command recorder seam.
//!
//! What gets drawn is not this crate's business. The frame context hands a
//! command buffer plus its framebuffer/extent pair to a [`RecordCommands`]
//! implementation once per swapchain image at startup and again after every
//! rebuild, because recorded commands bake in framebuffer and extent
//! references that go stale with the swapchain.

use ash::vk;

use ember_rhi::RhiResult;
use ember_rhi::command::CommandBuffer;

/// Fills command buffers for the frame context.
pub trait RecordCommands {
    /// Record the full frame for one swapchain image.
    ///
    /// Called with recording not yet begun; implementations own the
    /// begin/end bracket.
    fn record(
        &mut self,
        cmd: &CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
    ) -> RhiResult<()>;
}

/// Minimal recorder: clears the target to a solid color.
///
/// Stands in for an application recorder and keeps the engine runnable
/// without any pipeline or shader machinery.
pub struct ClearPass {
    pub color: [f32; 4],
}

impl ClearPass {
    pub fn new(color: [f32; 4]) -> Self {
        Self { color }
    }
}

impl Default for ClearPass {
    fn default() -> Self {
        // Dark blue-gray.
        Self::new([0.1, 0.1, 0.15, 1.0])
    }
}

impl RecordCommands for ClearPass {
    fn record(
        &mut self,
        cmd: &CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
    ) -> RhiResult<()> {
        cmd.begin()?;
        cmd.begin_render_pass(render_pass, framebuffer, extent, self.color);
        cmd.end_render_pass();
        cmd.end()?;
        Ok(())
    }
}
