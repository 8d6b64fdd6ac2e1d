//! Frame pacing core for the Kestrel renderer.
//!
//! This crate owns the state machine that drives a bounded number of frames
//! in flight through acquire, record, submit and present, and rebuilds the
//! swapchain when the surface goes stale. It knows nothing about a concrete
//! GPU API; backends plug in through [`FrameBackend`].
//!
//! - [`FrameDriver`] runs one tick per call and owns all loop state
//! - [`FrameSlotPool`] holds the per-slot command context and sync objects
//! - [`ImageFenceMap`] tracks which slot last rendered each swapchain image
//! - [`swapchain`] holds the format/present-mode/extent selection policy

pub mod backend;
pub mod driver;
pub mod error;
pub mod image_fences;
pub mod slot;
pub mod swapchain;
pub mod sync;

pub use backend::{
    AcquireOutcome, FrameBackend, FrameRecorder, FrameTarget, PresentOutcome, SurfaceProvider,
};
pub use driver::{FrameDriver, FrameDriverState, TickOutcome};
pub use error::{FrameError, Result};
pub use image_fences::ImageFenceMap;
pub use slot::{FrameSlot, FrameSlotPool};
pub use swapchain::{Extent, SwapchainTarget};
pub use sync::{GpuFence, GpuSemaphore, SlotSync};

/// Default number of frames the CPU may record ahead of the GPU.
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;
