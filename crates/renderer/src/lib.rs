//! Frame scheduling and swapchain lifecycle for the Ember engine.
//!
//! The pieces:
//! - [`scheduler::FrameScheduler`]: the per-tick state machine. It paces the
//!   CPU against the GPU, maps acquire/present status codes to rebuilds, and
//!   owns the frame cursor.
//! - [`scheduler::FrameGpu`]: the seam between the state machine and the
//!   GPU, so tests drive the scheduler with a scripted fake.
//! - [`context::FrameContext`]: the real implementation of that seam over
//!   the rhi layer, owning the swapchain-dependent resource cluster.
//! - [`context::Renderer`]: scheduler + context + ordered teardown.

pub mod context;
pub mod recorder;
pub mod scheduler;

pub use context::{FrameContext, Renderer};
pub use recorder::{ClearPass, RecordCommands};
pub use scheduler::{
    AcquireOutcome, FrameGpu, FrameScheduler, PresentOutcome, SchedulerState, TickOutcome,
};

/// Default number of frames the CPU may run ahead of the GPU.
///
/// Two slots let the CPU record frame N+1 while the GPU draws frame N; the
/// in-flight fences stop it from getting further ahead. This is independent
/// of (and normally smaller than) the swapchain image count.
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;
