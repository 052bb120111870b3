//! The Vulkan frame context and the engine-facing renderer.
//!
//! [`FrameContext`] is the production [`FrameGpu`]: it owns the sync ring,
//! the swapchain resource set, the per-image command buffers, and the render
//! pass, and it performs the coordinated rebuild the scheduler requests.
//! [`Renderer`] couples a context with a [`FrameScheduler`] and owns the
//! objects that must outlive both (surface, device, instance).

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use ember_core::{EngineConfig, PresentPreference};
use ember_platform::{Surface, Window};
use ember_rhi::command::CommandSet;
use ember_rhi::device::Device;
use ember_rhi::instance::Instance;
use ember_rhi::physical_device::select_physical_device;
use ember_rhi::render_pass::RenderPass;
use ember_rhi::swapchain::{SurfaceSupport, SwapchainConfig, SwapchainResources};
use ember_rhi::sync::FrameSyncRing;
use ember_rhi::{RhiError, RhiResult};

use crate::recorder::RecordCommands;
use crate::scheduler::{
    AcquireOutcome, FrameGpu, FrameScheduler, PresentOutcome, TickOutcome,
};

/// The real GPU side of a frame: every resource the scheduler's tick touches.
///
/// Field order is teardown order: command buffers, then the swapchain
/// resource set, then the sync ring, then the render pass. The device and
/// the surface handle/loader are owned elsewhere and must outlive this.
pub struct FrameContext {
    commands: CommandSet,
    swapchain: SwapchainResources,
    sync: FrameSyncRing,
    render_pass: RenderPass,
    recorder: Box<dyn RecordCommands>,
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    prefer_low_latency: bool,
    device: Arc<Device>,
}

impl FrameContext {
    /// Build the frame context against the current window extent.
    ///
    /// Queries surface support, runs the selection policies, builds the
    /// render pass for the chosen format, the swapchain resource set, the
    /// sync ring (sized by `frames_in_flight`, fences signaled), and the
    /// per-image command buffers, then records them all.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: &Surface,
        window_extent: (u32, u32),
        config: &EngineConfig,
        recorder: Box<dyn RecordCommands>,
    ) -> RhiResult<Self> {
        let prefer_low_latency = config.present == PresentPreference::LowLatency;

        let support =
            SurfaceSupport::query(surface.loader(), device.physical_device(), surface.handle())?;
        if !support.is_adequate() {
            return Err(RhiError::Swapchain(
                "surface reports no formats or present modes".to_string(),
            ));
        }
        let swapchain_config = SwapchainConfig::select(&support, window_extent, prefer_low_latency);

        let render_pass =
            RenderPass::for_surface(device.clone(), swapchain_config.surface_format.format)?;

        let swapchain = SwapchainResources::build(
            instance,
            device.clone(),
            surface.handle(),
            render_pass.handle(),
            &swapchain_config,
            vk::SwapchainKHR::null(),
        )?;

        let sync = FrameSyncRing::new(&device, config.frames_in_flight)?;
        let commands = CommandSet::allocate(device.clone(), swapchain.image_count() as u32)?;

        let mut context = Self {
            commands,
            swapchain,
            sync,
            render_pass,
            recorder,
            surface: surface.handle(),
            surface_loader: surface.loader().clone(),
            prefer_low_latency,
            device,
        };
        context.record_all()?;

        info!(
            "Frame context ready: {} swapchain image(s), {} frame(s) in flight",
            context.swapchain.image_count(),
            context.sync.len()
        );

        Ok(context)
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Current swapchain extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Current swapchain surface format.
    #[inline]
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.swapchain.format()
    }

    /// Record every command buffer against its framebuffer/extent pair.
    fn record_all(&mut self) -> RhiResult<()> {
        let extent = self.swapchain.extent();
        for index in 0..self.swapchain.image_count() {
            let cmd = self.commands.recorder(index);
            self.recorder.record(
                &cmd,
                self.render_pass.handle(),
                self.swapchain.framebuffer(index),
                extent,
            )?;
        }
        debug!("Recorded {} command buffer(s)", self.commands.len());
        Ok(())
    }
}

impl FrameGpu for FrameContext {
    fn wait_slot_fence(&mut self, slot: usize) -> RhiResult<()> {
        self.sync.slot(slot).in_flight().wait(u64::MAX)
    }

    fn reset_slot_fence(&mut self, slot: usize) -> RhiResult<()> {
        self.sync.slot(slot).in_flight().reset()
    }

    fn acquire_image(&mut self, slot: usize) -> RhiResult<AcquireOutcome> {
        let semaphore = self.sync.slot(slot).image_available().handle();
        match self.swapchain.acquire_next_image(semaphore) {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
        let frame = self.sync.slot(slot);

        let wait_semaphores = [frame.image_available().handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.commands.buffer(image_index as usize)];
        let signal_semaphores = [frame.render_finished().handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the buffer was recorded at the last (re)build, the fence
        // was reset this tick after its wait, and the single-threaded tick
        // is the only submitter.
        unsafe {
            self.device
                .submit_graphics(&[submit_info], frame.in_flight().handle())
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome> {
        let wait = self.sync.slot(slot).render_finished().handle();
        match self
            .swapchain
            .present(self.device.present_queue(), image_index, wait)
        {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    fn rebuild_surface(&mut self, window_extent: (u32, u32)) -> RhiResult<()> {
        // Everything sized by the swapchain may still be referenced by
        // in-flight work; quiesce the device before touching it.
        self.device.wait_idle()?;

        self.commands.free();

        let support = SurfaceSupport::query(
            &self.surface_loader,
            self.device.physical_device(),
            self.surface,
        )?;
        if !support.is_adequate() {
            return Err(RhiError::Swapchain(
                "surface reports no formats or present modes".to_string(),
            ));
        }
        let config = SwapchainConfig::select(&support, window_extent, self.prefer_low_latency);

        self.swapchain
            .rebuild(self.surface, self.render_pass.handle(), &config)?;

        self.commands.rebuild(self.swapchain.image_count() as u32)?;
        self.record_all()?;

        Ok(())
    }
}

/// The engine's rendering front door.
///
/// Owns the whole GPU object graph. Declaration order doubles as teardown
/// order: the frame context (command buffers → swapchain set → sync ring →
/// render pass) goes first, then the surface, then the device (whose drop
/// destroys the command pools), and the instance last.
pub struct Renderer {
    scheduler: FrameScheduler,
    context: FrameContext,
    _surface: Surface,
    device: Arc<Device>,
    _instance: Instance,
}

impl Renderer {
    /// Bring up the full Vulkan stack for a window.
    pub fn new(
        window: &Window,
        config: &EngineConfig,
        recorder: Box<dyn RecordCommands>,
    ) -> RhiResult<Self> {
        let display_handle = window
            .raw_display_handle()
            .map_err(|e| RhiError::Surface(e.to_string()))?;
        let instance = Instance::new(cfg!(debug_assertions), display_handle)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::Surface(e.to_string()))?;

        let device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &device_info)?;

        let context = FrameContext::new(
            &instance,
            device.clone(),
            &surface,
            window.extent(),
            config,
            recorder,
        )?;

        let scheduler = FrameScheduler::new(config.frames_in_flight);

        info!("Renderer initialized on '{}'", device_info.device_name());

        Ok(Self {
            scheduler,
            context,
            _surface: surface,
            device,
            _instance: instance,
        })
    }

    /// Drive one frame. May rebuild the swapchain internally; errors are
    /// fatal and leave the renderer refusing further frames.
    pub fn render_frame(&mut self, window_extent: (u32, u32)) -> RhiResult<TickOutcome> {
        self.scheduler.tick(&mut self.context, window_extent)
    }

    /// Latch a window resize for the next frame.
    pub fn notify_resized(&mut self) {
        self.scheduler.notify_resized();
    }

    /// Stop ticking and drain the GPU. Destruction happens on drop, in
    /// reverse dependency order.
    pub fn shutdown(&mut self) -> RhiResult<()> {
        self.scheduler.close();
        self.device.wait_idle()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.scheduler.close();
        if let Err(e) = self.device.wait_idle() {
            error!("device_wait_idle failed during renderer drop: {:?}", e);
        }
        info!("Renderer shut down");
    }
}
