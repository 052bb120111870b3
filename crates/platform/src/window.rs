//! Window and Vulkan surface management.

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use std::sync::Arc;
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use ember_core::{Error, Result};

/// RAII wrapper for a `vk::SurfaceKHR`.
///
/// The surface is destroyed when this value is dropped. The Vulkan instance
/// it was created against must outlive it.
pub struct Surface {
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Raw surface handle; valid only while this `Surface` is alive.
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Surface extension loader, for capability/format/present-mode queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: the handle was created by ash_window::create_surface from
        // the same instance the loader was built on, and this is the only
        // place it is destroyed.
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Surface destroyed");
    }
}

/// Winit window wrapper tracking the current framebuffer extent.
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
}

impl Window {
    /// Create a resizable window with the given size and title.
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        tracing::info!("Window created: {}x{}", width, height);

        Ok(Self {
            window: Arc::new(window),
            width,
            height,
        })
    }

    /// Current extent as `(width, height)` in physical pixels.
    ///
    /// Either dimension may be zero while the window is minimized; the frame
    /// scheduler treats that as a tick to skip.
    #[inline]
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Record a new size. Call from the resize event handler.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        tracing::debug!("Window resized: {}x{}", width, height);
    }

    /// Ask the compositor for another redraw.
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Raw display handle, used to enumerate required instance extensions.
    pub fn raw_display_handle(&self) -> Result<RawDisplayHandle> {
        Ok(self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("display handle unavailable: {}", e)))?
            .as_raw())
    }

    /// Create a Vulkan surface for this window.
    ///
    /// The returned [`Surface`] destroys itself on drop; the caller must keep
    /// `instance` alive for at least as long.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("display handle unavailable: {}", e)))?;
        let window = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("window handle unavailable: {}", e)))?;

        // SAFETY: both handles come from a live winit window, and the caller
        // guarantees the instance outlives the returned Surface.
        let handle = unsafe {
            ash_window::create_surface(entry, instance, display.as_raw(), window.as_raw(), None)
                .map_err(|e| Error::Vulkan(format!("surface creation failed: {}", e)))?
        };

        let loader = ash::khr::surface::Instance::new(entry, instance);

        tracing::info!("Vulkan surface created");

        Ok(Surface { handle, loader })
    }
}
