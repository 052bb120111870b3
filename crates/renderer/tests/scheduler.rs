//! Frame scheduler behavior against a scripted fake GPU.
//!
//! The fake models the only GPU state the scheduler depends on: per-slot
//! fence signaling and the status codes of acquire/present. Submitted work
//! "completes" when the scheduler waits on an unsignaled fence, mimicking a
//! GPU that retires frames in submission order.

use std::collections::VecDeque;

use ember_renderer::scheduler::{
    AcquireOutcome, FrameGpu, FrameScheduler, PresentOutcome, SchedulerState, TickOutcome,
};
use ember_rhi::{RhiError, RhiResult, vk};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    WaitFence(usize),
    ResetFence(usize),
    Acquire(usize),
    Submit(usize, u32),
    Present(usize, u32),
    Rebuild,
}

struct FakeGpu {
    frames_in_flight: usize,
    image_count: u32,
    /// Signaled state per slot fence; starts all-signaled like the real ring.
    fence_signaled: Vec<bool>,
    /// Slots with submitted-but-unretired work, oldest first.
    pending: VecDeque<usize>,
    /// Scripted acquire outcomes; empty means clean acquires.
    acquire_script: VecDeque<AcquireOutcome>,
    /// Scripted present outcomes; empty means clean presents.
    present_script: VecDeque<PresentOutcome>,
    /// Every call in order, for sequence assertions.
    calls: Vec<Call>,
    next_image: u32,
    rebuilds: usize,
    /// Highest number of simultaneously unsignaled fences ever observed.
    max_in_flight: usize,
    fail_acquire: bool,
}

impl FakeGpu {
    fn new(frames_in_flight: usize) -> Self {
        Self {
            frames_in_flight,
            image_count: 3,
            fence_signaled: vec![true; frames_in_flight],
            pending: VecDeque::new(),
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            calls: Vec::new(),
            next_image: 0,
            rebuilds: 0,
            max_in_flight: 0,
            fail_acquire: false,
        }
    }

    fn in_flight(&self) -> usize {
        self.fence_signaled.iter().filter(|s| !**s).count()
    }

    fn submits(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Submit(..)))
            .count()
    }

    fn presents(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Present(..)))
            .count()
    }

    /// Retire the oldest pending frame, signaling its fence.
    fn retire_oldest(&mut self) -> bool {
        match self.pending.pop_front() {
            Some(slot) => {
                self.fence_signaled[slot] = true;
                true
            }
            None => false,
        }
    }
}

impl FrameGpu for FakeGpu {
    fn wait_slot_fence(&mut self, slot: usize) -> RhiResult<()> {
        self.calls.push(Call::WaitFence(slot));
        // The real wait blocks until the GPU signals; here the fake GPU
        // retires pending frames in order until the waited slot is done. A
        // wait with nothing pending would block forever in production.
        while !self.fence_signaled[slot] {
            assert!(
                self.retire_oldest(),
                "wait on slot {slot} would deadlock: fence unsignaled with no pending work"
            );
        }
        Ok(())
    }

    fn reset_slot_fence(&mut self, slot: usize) -> RhiResult<()> {
        self.calls.push(Call::ResetFence(slot));
        assert!(
            self.fence_signaled[slot],
            "reset of slot {slot} while its fence is still in flight"
        );
        self.fence_signaled[slot] = false;
        let in_flight = self.in_flight();
        self.max_in_flight = self.max_in_flight.max(in_flight);
        assert!(
            in_flight <= self.frames_in_flight,
            "{in_flight} frames in flight exceeds the ring size {}",
            self.frames_in_flight
        );
        Ok(())
    }

    fn acquire_image(&mut self, slot: usize) -> RhiResult<AcquireOutcome> {
        self.calls.push(Call::Acquire(slot));
        if self.fail_acquire {
            return Err(RhiError::Vulkan(vk::Result::ERROR_DEVICE_LOST));
        }
        if let Some(outcome) = self.acquire_script.pop_front() {
            return Ok(outcome);
        }
        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal: false,
        })
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
        self.calls.push(Call::Submit(slot, image_index));
        self.pending.push_back(slot);
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome> {
        self.calls.push(Call::Present(slot, image_index));
        Ok(self
            .present_script
            .pop_front()
            .unwrap_or(PresentOutcome::Presented))
    }

    fn rebuild_surface(&mut self, window_extent: (u32, u32)) -> RhiResult<()> {
        self.calls.push(Call::Rebuild);
        assert!(
            window_extent.0 > 0 && window_extent.1 > 0,
            "rebuild requested at zero extent"
        );
        self.rebuilds += 1;
        Ok(())
    }
}

const EXTENT: (u32, u32) = (800, 600);

#[test]
fn three_clean_ticks_cycle_the_cursor() {
    let mut gpu = FakeGpu::new(2);
    let mut scheduler = FrameScheduler::new(2);

    let mut cursors = Vec::new();
    for _ in 0..3 {
        cursors.push(scheduler.cursor());
        let outcome = scheduler.tick(&mut gpu, EXTENT).unwrap();
        assert_eq!(outcome, TickOutcome::Presented { rebuilt: false });
    }

    assert_eq!(cursors, vec![0, 1, 0]);
    assert_eq!(scheduler.state(), SchedulerState::Steady);
    assert_eq!(gpu.rebuilds, 0);
    assert_eq!(gpu.submits(), 3);
    assert_eq!(gpu.presents(), 3);
}

#[test]
fn in_flight_frames_never_exceed_ring_size() {
    let mut gpu = FakeGpu::new(2);
    let mut scheduler = FrameScheduler::new(2);

    for _ in 0..16 {
        scheduler.tick(&mut gpu, EXTENT).unwrap();
    }

    assert!(gpu.max_in_flight <= 2, "max in flight was {}", gpu.max_in_flight);
    // With the GPU lagging behind the CPU, the bound must actually be hit.
    assert_eq!(gpu.max_in_flight, 2);
}

#[test]
fn out_of_date_acquire_rebuilds_without_submitting() {
    let mut gpu = FakeGpu::new(2);
    gpu.acquire_script.push_back(AcquireOutcome::OutOfDate);
    let mut scheduler = FrameScheduler::new(2);

    let outcome = scheduler.tick(&mut gpu, EXTENT).unwrap();

    assert_eq!(outcome, TickOutcome::Rebuilt);
    assert_eq!(gpu.rebuilds, 1);
    assert_eq!(gpu.submits(), 0);
    assert_eq!(gpu.presents(), 0);
    // The slot was consumed: the cursor still advances by exactly one.
    assert_eq!(scheduler.cursor(), 1);
    // The fence was never reset, so the slot's next wait cannot deadlock.
    assert!(gpu.fence_signaled[0]);

    // The very next tick proceeds normally on the fresh swapchain.
    let outcome = scheduler.tick(&mut gpu, EXTENT).unwrap();
    assert_eq!(outcome, TickOutcome::Presented { rebuilt: false });
    assert_eq!(scheduler.cursor(), 0);
}

#[test]
fn zero_extent_tick_is_a_complete_no_op() {
    let mut gpu = FakeGpu::new(2);
    let mut scheduler = FrameScheduler::new(2);

    let outcome = scheduler.tick(&mut gpu, (0, 600)).unwrap();
    assert_eq!(outcome, TickOutcome::Skipped);
    let outcome = scheduler.tick(&mut gpu, (800, 0)).unwrap();
    assert_eq!(outcome, TickOutcome::Skipped);

    assert!(gpu.calls.is_empty(), "minimized tick touched the GPU");
    assert_eq!(scheduler.cursor(), 0);
    assert_eq!(scheduler.state(), SchedulerState::Idle);
}

#[test]
fn suboptimal_acquire_presents_then_rebuilds() {
    let mut gpu = FakeGpu::new(2);
    gpu.acquire_script.push_back(AcquireOutcome::Acquired {
        image_index: 0,
        suboptimal: true,
    });
    let mut scheduler = FrameScheduler::new(2);

    let outcome = scheduler.tick(&mut gpu, EXTENT).unwrap();

    assert_eq!(outcome, TickOutcome::Presented { rebuilt: true });
    assert_eq!(gpu.submits(), 1);
    assert_eq!(gpu.presents(), 1);
    assert_eq!(gpu.rebuilds, 1);
    // The rebuild came after the present was issued.
    let present_pos = gpu.calls.iter().position(|c| matches!(c, Call::Present(..)));
    let rebuild_pos = gpu.calls.iter().position(|c| *c == Call::Rebuild);
    assert!(present_pos.unwrap() < rebuild_pos.unwrap());
}

#[test]
fn out_of_date_present_rebuilds_after_presenting() {
    let mut gpu = FakeGpu::new(2);
    gpu.present_script.push_back(PresentOutcome::OutOfDate);
    let mut scheduler = FrameScheduler::new(2);

    let outcome = scheduler.tick(&mut gpu, EXTENT).unwrap();
    assert_eq!(outcome, TickOutcome::Presented { rebuilt: true });
    assert_eq!(gpu.rebuilds, 1);
    assert_eq!(scheduler.cursor(), 1);
}

#[test]
fn resize_notification_forces_one_rebuild() {
    let mut gpu = FakeGpu::new(2);
    let mut scheduler = FrameScheduler::new(2);

    scheduler.notify_resized();
    let outcome = scheduler.tick(&mut gpu, EXTENT).unwrap();
    assert_eq!(outcome, TickOutcome::Presented { rebuilt: true });
    assert_eq!(gpu.rebuilds, 1);

    // The latch was consumed: the next tick does not rebuild again.
    let outcome = scheduler.tick(&mut gpu, EXTENT).unwrap();
    assert_eq!(outcome, TickOutcome::Presented { rebuilt: false });
    assert_eq!(gpu.rebuilds, 1);
}

#[test]
fn resize_latched_during_minimize_survives_skipped_ticks() {
    let mut gpu = FakeGpu::new(2);
    let mut scheduler = FrameScheduler::new(2);

    scheduler.notify_resized();
    // Minimized: the latch must not be consumed by skipped ticks.
    assert_eq!(
        scheduler.tick(&mut gpu, (0, 0)).unwrap(),
        TickOutcome::Skipped
    );

    let outcome = scheduler.tick(&mut gpu, EXTENT).unwrap();
    assert_eq!(outcome, TickOutcome::Presented { rebuilt: true });
    assert_eq!(gpu.rebuilds, 1);
}

#[test]
fn fatal_acquire_error_closes_the_scheduler() {
    let mut gpu = FakeGpu::new(2);
    gpu.fail_acquire = true;
    let mut scheduler = FrameScheduler::new(2);

    let err = scheduler.tick(&mut gpu, EXTENT).unwrap_err();
    assert!(matches!(err, RhiError::Vulkan(vk::Result::ERROR_DEVICE_LOST)));
    assert_eq!(scheduler.state(), SchedulerState::Closed);

    // A closed scheduler refuses to touch the GPU again.
    let calls_before = gpu.calls.len();
    let outcome = scheduler.tick(&mut gpu, EXTENT).unwrap();
    assert_eq!(outcome, TickOutcome::Skipped);
    assert_eq!(gpu.calls.len(), calls_before);
}

#[test]
fn fence_wait_precedes_acquire_each_tick() {
    let mut gpu = FakeGpu::new(2);
    let mut scheduler = FrameScheduler::new(2);

    scheduler.tick(&mut gpu, EXTENT).unwrap();

    assert_eq!(
        gpu.calls[..3],
        [Call::WaitFence(0), Call::Acquire(0), Call::ResetFence(0)]
    );
}
