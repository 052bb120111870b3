//! The frame scheduler state machine.
//!
//! One `tick` drives one frame: wait on the current slot's fence, acquire a
//! swapchain image, submit, present, and — when the surface has gone stale —
//! coordinate a rebuild of everything sized by the swapchain. The scheduler
//! is deliberately free of Vulkan types on its control path; it talks to the
//! GPU through [`FrameGpu`], which lets the tests script every outcome.
//!
//! Ordering rationale: the fence wait happens *before* acquisition, which
//! bounds how far the CPU can race ahead without serializing acquisition
//! behind an unrelated prior frame's presentation. "Out of date" aborts the
//! tick before submit; "suboptimal" tolerates the current frame and rebuilds
//! after its present has been issued, matching the API's distinction between
//! "must not present" and "may present, but rebuild soon".

use tracing::{debug, warn};

use ember_rhi::{RhiError, RhiResult};

/// Result of an image acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is available for rendering. `suboptimal` means the frame may
    /// proceed but the swapchain should be rebuilt before the next one.
    Acquired { image_index: u32, suboptimal: bool },
    /// The swapchain can no longer present; it must be rebuilt before any
    /// further acquisition.
    OutOfDate,
}

/// Result of a presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// The frame reached the screen but the swapchain no longer matches the
    /// surface well.
    Suboptimal,
    /// The frame may not have reached the screen; rebuild required.
    OutOfDate,
}

/// The per-tick GPU operations the scheduler drives.
///
/// `slot` is the frame-ring index selected by the scheduler's cursor. The
/// production implementation is `FrameContext`; tests substitute a scripted
/// fake to exercise the state machine without a device.
pub trait FrameGpu {
    /// Block until the slot's previous submission has retired.
    fn wait_slot_fence(&mut self, slot: usize) -> RhiResult<()>;

    /// Unsignal the slot's fence. Called only once a submission is certain.
    fn reset_slot_fence(&mut self, slot: usize) -> RhiResult<()>;

    /// Acquire the next presentable image, signaling the slot's
    /// image-available semaphore.
    fn acquire_image(&mut self, slot: usize) -> RhiResult<AcquireOutcome>;

    /// Submit the command buffer recorded for `image_index`, waiting on the
    /// slot's image-available semaphore and signaling its render-finished
    /// semaphore and in-flight fence.
    fn submit(&mut self, slot: usize, image_index: u32) -> RhiResult<()>;

    /// Present `image_index`, waiting on the slot's render-finished
    /// semaphore.
    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome>;

    /// Tear down and rebuild everything sized by the swapchain, against a
    /// fresh capability query at the given window extent.
    fn rebuild_surface(&mut self, window_extent: (u32, u32)) -> RhiResult<()>;
}

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No frame has been submitted yet.
    Idle,
    /// Normal frame pacing.
    Steady,
    /// Mid-rebuild. Only observable from within a tick.
    Recreating,
    /// Fatal error or shutdown; all further ticks are refused.
    Closed,
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Zero-area window or closed scheduler: no GPU calls, cursor unchanged.
    Skipped,
    /// A frame was submitted and presented. `rebuilt` reports whether the
    /// swapchain was rebuilt after the present.
    Presented { rebuilt: bool },
    /// Acquisition found the surface stale; the swapchain was rebuilt and
    /// this frame was dropped without submit or present.
    Rebuilt,
}

/// Drives acquisition, submission, presentation, and swapchain recreation.
///
/// Single-threaded by design: a tick blocks on a fence internally, so at
/// most one tick is ever in flight and no locking is needed. The cursor is a
/// monotonically increasing counter taken modulo the slot count; it advances
/// exactly once per consumed tick, including ticks dropped to a rebuild.
pub struct FrameScheduler {
    frames_in_flight: usize,
    /// Monotonic tick counter; `cursor()` is this modulo the slot count.
    frame_counter: u64,
    state: SchedulerState,
    resize_latched: bool,
}

impl FrameScheduler {
    /// Create a scheduler for `frames_in_flight` ring slots.
    ///
    /// # Panics
    ///
    /// Panics if `frames_in_flight` is zero.
    pub fn new(frames_in_flight: usize) -> Self {
        assert!(frames_in_flight > 0, "at least one frame slot is required");
        Self {
            frames_in_flight,
            frame_counter: 0,
            state: SchedulerState::Idle,
            resize_latched: false,
        }
    }

    /// The ring slot the next tick will use.
    #[inline]
    pub fn cursor(&self) -> usize {
        (self.frame_counter % self.frames_in_flight as u64) as usize
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    #[inline]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Latch a resize. Consumed by the next consumed tick, which rebuilds
    /// after that frame's present.
    pub fn notify_resized(&mut self) {
        self.resize_latched = true;
    }

    /// Refuse all further ticks. Idempotent.
    pub fn close(&mut self) {
        self.state = SchedulerState::Closed;
    }

    /// Drive one frame.
    ///
    /// `window_extent` is the window's current framebuffer size; a zero
    /// dimension makes the tick a no-op (no GPU calls, cursor unchanged),
    /// which keeps zero-area swapchain builds impossible.
    ///
    /// # Errors
    ///
    /// Any error other than the out-of-date/suboptimal statuses already
    /// absorbed here is fatal: the scheduler closes itself and the error
    /// propagates to the caller, whose only remaining move is shutdown.
    pub fn tick(
        &mut self,
        gpu: &mut dyn FrameGpu,
        window_extent: (u32, u32),
    ) -> RhiResult<TickOutcome> {
        if self.state == SchedulerState::Closed {
            warn!("tick on a closed scheduler ignored");
            return Ok(TickOutcome::Skipped);
        }

        if window_extent.0 == 0 || window_extent.1 == 0 {
            debug!("Zero-area window, skipping tick");
            return Ok(TickOutcome::Skipped);
        }

        let slot = self.cursor();

        // Bounds CPU run-ahead: the slot cannot be reused until the GPU has
        // retired its previous frame.
        self.guard(gpu.wait_slot_fence(slot))?;

        if self.state == SchedulerState::Idle {
            self.state = SchedulerState::Steady;
        }

        let (image_index, acquire_suboptimal) = match self.guard(gpu.acquire_image(slot))? {
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                debug!("Acquire reported out-of-date, rebuilding");
                self.recreate(gpu, window_extent)?;
                self.advance();
                return Ok(TickOutcome::Rebuilt);
            }
        };

        // The fence stays signaled until a submission is certain; resetting
        // it earlier would deadlock the next wait on this slot if the tick
        // aborted above.
        self.guard(gpu.reset_slot_fence(slot))?;
        self.guard(gpu.submit(slot, image_index))?;

        let present = self.guard(gpu.present(slot, image_index))?;

        let resized = std::mem::take(&mut self.resize_latched);
        let needs_rebuild =
            acquire_suboptimal || resized || !matches!(present, PresentOutcome::Presented);

        if needs_rebuild {
            debug!(
                "Rebuilding after present (acquire_suboptimal: {}, resized: {}, present: {:?})",
                acquire_suboptimal, resized, present
            );
            self.recreate(gpu, window_extent)?;
        }

        self.advance();
        Ok(TickOutcome::Presented {
            rebuilt: needs_rebuild,
        })
    }

    /// Run the coordinated rebuild, passing through `Recreating`.
    fn recreate(&mut self, gpu: &mut dyn FrameGpu, window_extent: (u32, u32)) -> RhiResult<()> {
        self.state = SchedulerState::Recreating;
        self.guard(gpu.rebuild_surface(window_extent))?;
        // A rebuild satisfies any pending resize notification.
        self.resize_latched = false;
        self.state = SchedulerState::Steady;
        Ok(())
    }

    fn advance(&mut self) {
        self.frame_counter += 1;
    }

    /// Close the scheduler on any error before propagating it.
    fn guard<T>(&mut self, result: Result<T, RhiError>) -> Result<T, RhiError> {
        if result.is_err() {
            self.state = SchedulerState::Closed;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle_at_slot_zero() {
        let scheduler = FrameScheduler::new(2);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.cursor(), 0);
        assert_eq!(scheduler.frames_in_flight(), 2);
    }

    #[test]
    #[should_panic(expected = "at least one frame slot")]
    fn rejects_zero_slots() {
        let _ = FrameScheduler::new(0);
    }

    #[test]
    fn close_is_idempotent() {
        let mut scheduler = FrameScheduler::new(2);
        scheduler.close();
        scheduler.close();
        assert_eq!(scheduler.state(), SchedulerState::Closed);
    }
}
