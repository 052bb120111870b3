//! Core utilities for the Ember engine.
//!
//! This crate provides the foundational pieces shared by every other crate:
//! - Error types and result aliases
//! - Logging initialization
//! - Engine configuration
//! - Frame timing

mod config;
mod error;
mod logging;
mod timer;

pub use config::{EngineConfig, PresentPreference, WindowConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::Timer;
