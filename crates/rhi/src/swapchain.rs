//! Swapchain lifecycle.
//!
//! Three layers live here:
//! - [`SurfaceSupport`]: the capability query. Queried fresh before every
//!   build; capabilities (notably `current_extent` and the image-count
//!   bounds) change across resizes, and stale capability data is the classic
//!   source of recreation bugs, so nothing is cached between rebuilds.
//! - The selection policies (`choose_*`): deterministic mappings from the
//!   supported lists to a concrete format, present mode, extent, and image
//!   count.
//! - [`SwapchainResources`]: the swapchain plus everything sized by it —
//!   images, one view per image, one framebuffer per image. The set is torn
//!   down and rebuilt as a unit; image count and extent may both change, so
//!   partial reuse is never attempted. On rebuild the old swapchain handle
//!   is passed to the driver as a hint and destroyed only after the new one
//!   exists, so the surface never lacks a valid presentation target.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

/// What the surface supports, per the most recent query.
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// Query capabilities, formats, and present modes.
    ///
    /// Callers must re-query before every swapchain build; results from an
    /// earlier query may describe a surface that no longer exists in that
    /// shape.
    pub fn query(
        surface_loader: &ash::khr::surface::Instance,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> RhiResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };
        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Surface support: {} format(s), {} present mode(s), image count {}..{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            capabilities.max_image_count
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// True when a swapchain can be built at all.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Pick the surface format.
///
/// Preferred: `B8G8R8A8_UNORM` with the nonlinear sRGB color space. A list
/// consisting of a single `UNDEFINED` entry means the surface imposes no
/// constraint, so the preferred pair is used outright. Otherwise the first
/// supported entry is the fallback.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let preferred = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_UNORM,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };

    if formats.len() == 1 && formats[0].format == vk::Format::UNDEFINED {
        return preferred;
    }

    formats
        .iter()
        .copied()
        .find(|f| f.format == preferred.format && f.color_space == preferred.color_space)
        .unwrap_or_else(|| formats[0])
}

/// Pick the present mode.
///
/// With `prefer_low_latency`, MAILBOX is chosen when available. FIFO is the
/// fallback either way; the Vulkan spec guarantees its presence.
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    prefer_low_latency: bool,
) -> vk::PresentModeKHR {
    if prefer_low_latency && modes.contains(&vk::PresentModeKHR::MAILBOX) {
        return vk::PresentModeKHR::MAILBOX;
    }
    vk::PresentModeKHR::FIFO
}

/// Pick the swapchain extent.
///
/// When the surface reports a concrete `current_extent` it dictates the
/// size. The `u32::MAX` sentinel means the surface takes its size from the
/// swapchain, so the window size is clamped into the advertised bounds.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Pick the image count: one above the minimum, capped by the maximum when
/// the surface declares one (zero means unbounded).
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

/// The resolved parameters for one swapchain build.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainConfig {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainConfig {
    /// Run every selection policy against a fresh capability query.
    pub fn select(
        support: &SurfaceSupport,
        window_extent: (u32, u32),
        prefer_low_latency: bool,
    ) -> Self {
        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes, prefer_low_latency);
        let extent = choose_extent(&support.capabilities, window_extent.0, window_extent.1);
        let image_count = choose_image_count(&support.capabilities);

        debug!(
            "Swapchain config: {}x{}, {:?}/{:?}, {:?}, {} image(s)",
            extent.width,
            extent.height,
            surface_format.format,
            surface_format.color_space,
            present_mode,
            image_count
        );

        Self {
            surface_format,
            present_mode,
            extent,
            image_count,
            pre_transform: support.capabilities.current_transform,
        }
    }
}

/// The swapchain and everything sized by it, rebuilt as one unit.
///
/// Invariant: `image_views` and `framebuffers` are always exactly as long as
/// `images` and index-aligned with it.
pub struct SwapchainResources {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    surface_format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    framebuffers: Vec<vk::Framebuffer>,
}

impl SwapchainResources {
    /// Build the full resource set.
    ///
    /// `render_pass` must be compatible with `config.surface_format`; that
    /// is the caller's contract and is not re-validated here. Pass the
    /// previous swapchain handle on rebuild (null on first build) so the
    /// driver can migrate resources.
    pub fn build(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        render_pass: vk::RenderPass,
        config: &SwapchainConfig,
        old_swapchain: vk::SwapchainKHR,
    ) -> RhiResult<Self> {
        let loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        Self::build_with_loader(loader, device, surface, render_pass, config, old_swapchain)
    }

    fn build_with_loader(
        loader: ash::khr::swapchain::Device,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        render_pass: vk::RenderPass,
        config: &SwapchainConfig,
        old_swapchain: vk::SwapchainKHR,
    ) -> RhiResult<Self> {
        if config.extent.width == 0 || config.extent.height == 0 {
            // The scheduler skips zero-area ticks; reaching here is a bug.
            return Err(RhiError::Swapchain(
                "refusing to build a zero-area swapchain".to_string(),
            ));
        }

        let families = device.queue_families();
        let graphics = families.graphics_family.unwrap_or(0);
        let present = families.present_family.unwrap_or(0);
        let family_indices = [graphics, present];

        let (sharing_mode, family_slice): (_, &[u32]) = if graphics != present {
            (vk::SharingMode::CONCURRENT, &family_indices)
        } else {
            (vk::SharingMode::EXCLUSIVE, &[])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(config.image_count)
            .image_format(config.surface_format.format)
            .image_color_space(config.surface_format.color_space)
            .image_extent(config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(family_slice)
            .pre_transform(config.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(config.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };
        let images = unsafe { loader.get_swapchain_images(swapchain)? };

        info!(
            "Swapchain created: {}x{}, {} image(s), {:?}",
            config.extent.width,
            config.extent.height,
            images.len(),
            config.present_mode
        );

        let image_views =
            create_image_views(&device, &images, config.surface_format.format).inspect_err(|_| {
                unsafe { loader.destroy_swapchain(swapchain, None) };
            })?;

        let framebuffers =
            create_framebuffers(&device, render_pass, &image_views, config.extent).inspect_err(
                |_| {
                    destroy_views(&device, &image_views);
                    unsafe { loader.destroy_swapchain(swapchain, None) };
                },
            )?;

        Ok(Self {
            device,
            loader,
            swapchain,
            surface_format: config.surface_format,
            extent: config.extent,
            images,
            image_views,
            framebuffers,
        })
    }

    /// Replace the whole set for a new configuration.
    ///
    /// The caller must have made the device idle first. The old swapchain is
    /// handed to the new build as a hint and destroyed only once the new set
    /// exists.
    pub fn rebuild(
        &mut self,
        surface: vk::SurfaceKHR,
        render_pass: vk::RenderPass,
        config: &SwapchainConfig,
    ) -> RhiResult<()> {
        // Views and framebuffers are not needed for presentation continuity;
        // only the swapchain handle is kept alive across the build.
        destroy_framebuffers(&self.device, &mut self.framebuffers);
        destroy_image_views(&self.device, &mut self.image_views);

        let old = self.swapchain;
        let mut fresh = Self::build_with_loader(
            self.loader.clone(),
            self.device.clone(),
            surface,
            render_pass,
            config,
            old,
        )?;

        unsafe {
            self.loader.destroy_swapchain(old, None);
        }

        self.swapchain = fresh.swapchain;
        self.surface_format = fresh.surface_format;
        self.extent = fresh.extent;
        self.images = std::mem::take(&mut fresh.images);
        self.image_views = std::mem::take(&mut fresh.image_views);
        self.framebuffers = std::mem::take(&mut fresh.framebuffers);

        // Defuse `fresh` so its Drop does not free what we just adopted.
        fresh.swapchain = vk::SwapchainKHR::null();

        info!(
            "Swapchain rebuilt: {}x{}, {} image(s)",
            self.extent.width,
            self.extent.height,
            self.images.len()
        );
        Ok(())
    }

    /// Acquire the next presentable image, signaling `semaphore` when it is
    /// ready. Returns `(image_index, suboptimal)`.
    ///
    /// `ERROR_OUT_OF_DATE_KHR` passes through for the scheduler to map to a
    /// rebuild.
    pub fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
    ) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    /// Present `image_index` on `queue` after `wait_semaphore` signals.
    /// Returns true when the swapchain is suboptimal.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.loader.queue_present(queue, &present_info) }
    }

    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    #[inline]
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Framebuffer for swapchain image `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn framebuffer(&self, index: usize) -> vk::Framebuffer {
        self.framebuffers[index]
    }
}

impl Drop for SwapchainResources {
    fn drop(&mut self) {
        destroy_framebuffers(&self.device, &mut self.framebuffers);
        destroy_image_views(&self.device, &mut self.image_views);
        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe {
                self.loader.destroy_swapchain(self.swapchain, None);
            }
            debug!(
                "Swapchain destroyed ({}x{})",
                self.extent.width, self.extent.height
            );
        }
    }
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RhiResult<Vec<vk::ImageView>> {
    let mut views = Vec::with_capacity(images.len());

    for &image in images {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let view = match unsafe { device.handle().create_image_view(&create_info, None) } {
            Ok(view) => view,
            Err(e) => {
                destroy_views(device, &views);
                return Err(e.into());
            }
        };
        views.push(view);
    }

    Ok(views)
}

fn create_framebuffers(
    device: &Device,
    render_pass: vk::RenderPass,
    image_views: &[vk::ImageView],
    extent: vk::Extent2D,
) -> RhiResult<Vec<vk::Framebuffer>> {
    let mut framebuffers = Vec::with_capacity(image_views.len());

    for &view in image_views {
        let attachments = [view];
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = match unsafe { device.handle().create_framebuffer(&create_info, None) } {
            Ok(fb) => fb,
            Err(e) => {
                for &fb in &framebuffers {
                    unsafe { device.handle().destroy_framebuffer(fb, None) };
                }
                return Err(e.into());
            }
        };
        framebuffers.push(framebuffer);
    }

    Ok(framebuffers)
}

fn destroy_views(device: &Device, views: &[vk::ImageView]) {
    for &view in views {
        unsafe { device.handle().destroy_image_view(view, None) };
    }
}

fn destroy_image_views(device: &Device, views: &mut Vec<vk::ImageView>) {
    destroy_views(device, views);
    views.clear();
}

fn destroy_framebuffers(device: &Device, framebuffers: &mut Vec<vk::Framebuffer>) {
    for &fb in framebuffers.iter() {
        unsafe { device.handle().destroy_framebuffer(fb, None) };
    }
    framebuffers.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_selection_prefers_bgra_unorm_srgb() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn format_selection_falls_back_to_first_entry() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];

        assert_eq!(
            choose_surface_format(&formats).format,
            vk::Format::R8G8B8A8_SRGB
        );
    }

    #[test]
    fn undefined_sentinel_yields_preferred_format() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::UNDEFINED,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];

        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn present_mode_prefers_mailbox() {
        let modes = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(
            choose_present_mode(&modes, true),
            vk::PresentModeKHR::MAILBOX
        );
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn vsync_preference_ignores_mailbox() {
        let modes = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn extent_uses_surface_dictated_size() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        };
        let extent = choose_extent(&capabilities, 640, 480);
        assert_eq!((extent.width, extent.height), (1920, 1080));
    }

    #[test]
    fn extent_clamps_window_size_componentwise() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 64,
                height: 64,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, 50, 5000);
        assert_eq!((extent.width, extent.height), (64, 4096));
    }

    #[test]
    fn image_count_is_min_plus_one_clamped() {
        let mut capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 3,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&capabilities), 3);

        capabilities.max_image_count = 0; // unbounded
        assert_eq!(choose_image_count(&capabilities), 3);

        capabilities.min_image_count = 3;
        capabilities.max_image_count = 3;
        assert_eq!(choose_image_count(&capabilities), 3);
    }

    #[test]
    fn config_selection_is_deterministic() {
        let support = SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 0,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D { width: 1, height: 1 },
                max_image_extent: vk::Extent2D {
                    width: 8192,
                    height: 8192,
                },
                ..Default::default()
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };

        let a = SwapchainConfig::select(&support, (800, 600), true);
        let b = SwapchainConfig::select(&support, (800, 600), true);
        assert_eq!(a.extent, b.extent);
        assert_eq!(a.image_count, b.image_count);
        assert_eq!(a.surface_format.format, b.surface_format.format);
        assert_eq!(a.surface_format.color_space, b.surface_format.color_space);
        assert_eq!(a.present_mode, vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn adequacy_requires_formats_and_modes() {
        let adequate = SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(adequate.is_adequate());

        let no_formats = SurfaceSupport {
            formats: vec![],
            ..adequate.clone()
        };
        assert!(!no_formats.is_adequate());

        let no_modes = SurfaceSupport {
            present_modes: vec![],
            ..adequate
        };
        assert!(!no_modes.is_adequate());
    }
}
