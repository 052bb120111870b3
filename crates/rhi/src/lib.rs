//! Vulkan abstraction layer for the Ember engine.
//!
//! This crate wraps `ash` with owned resource handles:
//! - Instance creation with optional validation layers
//! - Physical device selection
//! - Logical device, queues, and command pools
//! - Surface capability queries and the swapchain resource set
//! - Render pass and command buffer management
//! - Synchronization primitives and the per-frame sync ring
//!
//! Every create/destroy pair is tied to a single owning type, released in
//! reverse construction order on drop.

mod error;

pub mod command;
pub mod device;
pub mod instance;
pub mod physical_device;
pub mod render_pass;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

// Re-export ash types that callers need for handles and create-infos.
pub use ash::vk;
