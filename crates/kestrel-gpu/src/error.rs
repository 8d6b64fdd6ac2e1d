//! GPU error types.

use ash::vk;
use kestrel_frame::FrameError;
use thiserror::Error;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// No suitable GPU found.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// The selected queue family cannot present to the window surface.
    #[error("Graphics queue family {0} cannot present to the surface")]
    PresentationUnsupported(u32),

    /// Memory allocation failed.
    #[error("Memory allocation failed: {0}")]
    AllocationFailed(String),

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// Shader module creation failed.
    #[error("Shader compilation failed: {0}")]
    ShaderCompilation(String),

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// Frame-level failure raised while building presentation resources.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl From<GpuError> for FrameError {
    fn from(e: GpuError) -> Self {
        match e {
            GpuError::Frame(inner) => inner,
            other => Self::Backend(other.to_string()),
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
