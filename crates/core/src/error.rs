//! Engine-level error types.

use thiserror::Error;

/// Top-level error type for the engine.
///
/// GPU-layer failures carry their own error type (`ember_rhi::RhiError`); this
/// enum covers everything above that layer.
#[derive(Error, Debug)]
pub enum Error {
    /// Vulkan failures surfaced through non-rhi code paths
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window creation or surface plumbing errors
    #[error("window error: {0}")]
    Window(String),

    /// Configuration file or validation errors
    #[error("config error: {0}")]
    Config(String),

    /// IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything that indicates a bug rather than an environment problem
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias using the engine's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
