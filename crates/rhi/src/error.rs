//! RHI error types.

use thiserror::Error;

/// Errors produced by the Vulkan layer.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Raw Vulkan API error
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] ash::vk::Result),

    /// Vulkan library could not be loaded
    #[error("failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    /// No physical device satisfied the engine's requirements
    #[error("no suitable GPU found")]
    NoSuitableGpu,

    /// Surface creation or query failure
    #[error("surface error: {0}")]
    Surface(String),

    /// Swapchain construction or presentation failure
    #[error("swapchain error: {0}")]
    Swapchain(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
