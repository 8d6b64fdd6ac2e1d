//! Frame core error types.

use thiserror::Error;

/// Errors surfaced by the frame driver.
///
/// An out-of-date surface is not an error: it is absorbed by the driver and
/// turned into a swapchain rebuild. Everything that reaches the caller as a
/// `FrameError` is fatal for the GPU context.
#[derive(Error, Debug)]
pub enum FrameError {
    /// Failure reported by the GPU backend.
    #[error("Backend error: {0}")]
    Backend(String),

    /// The surface reported the undefined extent and no fallback was given.
    #[error("Surface extent is undefined")]
    UndefinedExtent,

    /// A driver was requested with zero frames in flight.
    #[error("At least one frame slot is required")]
    NoFrameSlots,

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, FrameError>;
