//! Logical device, queues, and command pools.
//!
//! [`Device`] owns the `VkDevice`, the resolved queue handles, and one
//! command pool per distinct queue family that records commands (graphics
//! always, plus a transient pool for a dedicated transfer family when one
//! exists). It is created once at startup and shared by `Arc`; everything
//! else in the engine borrows it.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::error::RhiError;
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilyIndices};

const DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[ash::khr::swapchain::NAME];

/// Owned logical device with resolved queues and command pools.
pub struct Device {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    transfer_queue: Option<vk::Queue>,
    queue_families: QueueFamilyIndices,
    graphics_pool: vk::CommandPool,
    transfer_pool: Option<vk::CommandPool>,
}

impl Device {
    /// Create the logical device for the selected GPU.
    ///
    /// One queue is created per distinct family; the swapchain extension is
    /// the only one enabled. Command pools are created here so the pool-per-
    /// family invariant lives with the owner of the queues.
    ///
    /// # Errors
    ///
    /// Fails when device or command pool creation is refused by the driver.
    pub fn new(
        instance: &Instance,
        gpu: &PhysicalDeviceInfo,
    ) -> Result<Arc<Self>, RhiError> {
        let queue_families = gpu.queue_families;
        let unique_families = queue_families.unique_families();
        let priorities = [1.0f32];

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
            })
            .collect();

        debug!(
            "Creating device with {} queue(s) for families {:?}",
            queue_create_infos.len(),
            unique_families
        );

        let extension_names: Vec<*const std::ffi::c_char> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names);

        let device = unsafe {
            instance
                .handle()
                .create_device(gpu.device, &create_info, None)?
        };

        // Selection guarantees both families; a miss here is a selection bug.
        let graphics_family = queue_families
            .graphics_family
            .ok_or(RhiError::NoSuitableGpu)?;
        let present_family = queue_families
            .present_family
            .ok_or(RhiError::NoSuitableGpu)?;

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        let transfer_queue = queue_families
            .transfer_family
            .map(|family| unsafe { device.get_device_queue(family, 0) });

        let graphics_pool = create_pool(
            &device,
            graphics_family,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )?;
        let transfer_pool = match queue_families.transfer_family {
            Some(family) if family != graphics_family => Some(create_pool(
                &device,
                family,
                vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER
                    | vk::CommandPoolCreateFlags::TRANSIENT,
            )?),
            _ => None,
        };

        info!(
            "Logical device created (graphics family {}, present family {}, dedicated transfer: {})",
            graphics_family,
            present_family,
            transfer_pool.is_some()
        );

        Ok(Arc::new(Self {
            device,
            physical_device: gpu.device,
            graphics_queue,
            present_queue,
            transfer_queue,
            queue_families,
            graphics_pool,
            transfer_pool,
        }))
    }

    /// The `ash` device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Dedicated transfer queue, when the GPU exposes one.
    #[inline]
    pub fn transfer_queue(&self) -> Option<vk::Queue> {
        self.transfer_queue
    }

    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    /// Command pool for the graphics family.
    #[inline]
    pub fn graphics_pool(&self) -> vk::CommandPool {
        self.graphics_pool
    }

    /// Transient pool for the dedicated transfer family, when present.
    #[inline]
    pub fn transfer_pool(&self) -> Option<vk::CommandPool> {
        self.transfer_pool
    }

    /// Block until every queue on the device is idle.
    pub fn wait_idle(&self) -> Result<(), RhiError> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submit recorded work to the graphics queue.
    ///
    /// # Safety
    ///
    /// Command buffers in `submits` must be fully recorded and not in use,
    /// and `fence` must be unsignaled and unowned by any pending submission.
    pub unsafe fn submit_graphics(
        &self,
        submits: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> Result<(), RhiError> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submits, fence)?;
        }
        Ok(())
    }
}

fn create_pool(
    device: &ash::Device,
    family: u32,
    flags: vk::CommandPoolCreateFlags,
) -> Result<vk::CommandPool, RhiError> {
    let create_info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(family)
        .flags(flags);
    let pool = unsafe { device.create_command_pool(&create_info, None)? };
    debug!("Command pool created for family {}", family);
    Ok(pool)
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("device_wait_idle failed during drop: {:?}", e);
            }
            if let Some(pool) = self.transfer_pool {
                self.device.destroy_command_pool(pool, None);
            }
            self.device.destroy_command_pool(self.graphics_pool, None);
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: ash::Device is Send+Sync and the remaining fields are plain
// Vulkan handles (Copy). External synchronization requirements on queues and
// pools are upheld by the engine's single-threaded frame loop.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swapchain_extension_is_requested() {
        assert!(DEVICE_EXTENSIONS.contains(&ash::khr::swapchain::NAME));
    }

    #[test]
    fn device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
