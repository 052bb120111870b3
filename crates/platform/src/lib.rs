//! Platform glue for the Ember engine.
//!
//! This crate wraps the windowing system behind the two interfaces the
//! engine core actually consumes:
//! - [`Window`] / [`Surface`]: a winit window plus its Vulkan surface
//! - [`WindowSignals`]: latched "resized" / "close requested" flags

mod signals;
mod window;

pub use signals::WindowSignals;
pub use window::{Surface, Window};
