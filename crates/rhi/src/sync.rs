//! Synchronization primitives and the per-frame sync ring.
//!
//! [`Semaphore`] orders queue operations on the GPU; [`Fence`] lets the CPU
//! wait for GPU completion. [`FrameSyncRing`] groups them into one
//! [`FrameSlot`] per frame in flight.
//!
//! The ring is sized by the frames-in-flight count, not by the swapchain
//! image count, and is created once at startup. Swapchain recreation never
//! touches it; it is destroyed only at shutdown, after the device is idle.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// GPU-side queue ordering primitive.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create an unsignaled binary semaphore.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };
        Ok(Self { device, semaphore })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// CPU-waitable completion primitive.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled.
    ///
    /// In-flight fences start signaled so the very first frame's wait
    /// returns immediately.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { device.handle().create_fence(&create_info, None)? };
        Ok(Self { device, fence })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Block until signaled or until `timeout` nanoseconds elapse.
    ///
    /// The frame loop passes `u64::MAX`; a timeout there means the GPU has
    /// hung, which is fatal rather than retriable.
    pub fn wait(&self, timeout: u64) -> Result<(), RhiError> {
        let fences = [self.fence];
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&fences, true, timeout)?;
        }
        Ok(())
    }

    /// Return the fence to the unsignaled state.
    ///
    /// Must not be called while a pending submission still owns the fence.
    pub fn reset(&self) -> Result<(), RhiError> {
        let fences = [self.fence];
        unsafe { self.device.handle().reset_fences(&fences)? };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization objects for one frame in flight.
///
/// Per-tick usage:
/// 1. wait on `in_flight` (bounds CPU run-ahead)
/// 2. acquire signals `image_available`
/// 3. submit waits `image_available`, signals `render_finished` + `in_flight`
/// 4. present waits `render_finished`
pub struct FrameSlot {
    image_available: Semaphore,
    render_finished: Semaphore,
    in_flight: Fence,
}

impl FrameSlot {
    fn new(device: Arc<Device>) -> RhiResult<Self> {
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        // Signaled so the first wait on this slot does not block.
        let in_flight = Fence::new(device, true)?;
        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }

    #[inline]
    pub fn image_available(&self) -> &Semaphore {
        &self.image_available
    }

    #[inline]
    pub fn render_finished(&self) -> &Semaphore {
        &self.render_finished
    }

    #[inline]
    pub fn in_flight(&self) -> &Fence {
        &self.in_flight
    }
}

/// Fixed ring of [`FrameSlot`]s, one per frame in flight.
pub struct FrameSyncRing {
    slots: Vec<FrameSlot>,
}

impl FrameSyncRing {
    /// Create `frames_in_flight` slots.
    ///
    /// # Panics
    ///
    /// Panics if `frames_in_flight` is zero; the config layer validates this
    /// before the ring is built.
    pub fn new(device: &Arc<Device>, frames_in_flight: usize) -> RhiResult<Self> {
        assert!(frames_in_flight > 0, "sync ring needs at least one slot");

        let mut slots = Vec::with_capacity(frames_in_flight);
        for i in 0..frames_in_flight {
            slots.push(FrameSlot::new(device.clone())?);
            debug!("Created sync slot {}", i);
        }

        info!("Frame sync ring created with {} slot(s)", frames_in_flight);
        Ok(Self { slots })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The slot for a given frame cursor.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    #[inline]
    pub fn slot(&self, index: usize) -> &FrameSlot {
        &self.slots[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
        assert_send_sync::<Fence>();
        assert_send_sync::<FrameSlot>();
        assert_send_sync::<FrameSyncRing>();
    }
}
