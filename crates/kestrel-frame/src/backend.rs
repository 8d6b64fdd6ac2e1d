//! Collaborator interfaces consumed by the frame driver.

use crate::error::Result;
use crate::swapchain::{Extent, SwapchainTarget};
use crate::sync::{GpuFence, GpuSemaphore, SlotSync};

/// Result of asking the swapchain for the next image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired; its availability is signaled on the GPU.
    Acquired { image_index: u32, suboptimal: bool },
    /// The surface no longer matches the swapchain. Nothing was acquired.
    OutOfDate,
}

/// Result of queueing an image for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented { suboptimal: bool },
    /// The surface no longer matches the swapchain. Submitted work still
    /// completes normally.
    OutOfDate,
}

/// GPU device/queue context as seen by the frame driver.
///
/// Every call returns immediately except [`FrameBackend::wait_idle`] and the
/// fence waits exposed through [`GpuFence`].
pub trait FrameBackend {
    type Fence: GpuFence;
    type Semaphore: GpuSemaphore;
    /// Reusable command recording context owned by one frame slot.
    type CommandContext;
    type Swapchain: SwapchainTarget;

    /// Build a swapchain against the surface's current capabilities.
    ///
    /// `framebuffer_extent` is only used when the surface leaves the extent
    /// up to the swapchain.
    fn create_swapchain(&mut self, framebuffer_extent: Extent) -> Result<Self::Swapchain>;

    /// Create a slot's sync objects with the fence already signaled.
    fn create_slot_sync(&mut self) -> Result<SlotSync<Self::Fence, Self::Semaphore>>;

    fn create_command_context(&mut self) -> Result<Self::CommandContext>;

    /// Make a command context recordable again. Only legal once the slot's
    /// fence has been observed signaled.
    fn reset_command_context(&mut self, context: &mut Self::CommandContext) -> Result<()>;

    fn acquire_next_image(
        &mut self,
        swapchain: &Self::Swapchain,
        image_acquired: &Self::Semaphore,
    ) -> Result<AcquireOutcome>;

    /// Submit recorded work. The GPU waits on `wait` before color output and
    /// signals both `signal` and `fence` on completion.
    fn submit(
        &mut self,
        context: &Self::CommandContext,
        wait: &Self::Semaphore,
        signal: &Self::Semaphore,
        fence: &Self::Fence,
    ) -> Result<()>;

    fn present(
        &mut self,
        swapchain: &Self::Swapchain,
        image_index: u32,
        wait: &Self::Semaphore,
    ) -> Result<PresentOutcome>;

    /// Block until the GPU has finished all submitted work.
    fn wait_idle(&mut self) -> Result<()>;
}

/// OS-backed drawable surface.
pub trait SurfaceProvider {
    /// Live framebuffer size in pixels.
    fn framebuffer_extent(&self) -> Extent;

    /// Process pending window events without blocking.
    fn poll_events(&mut self);

    /// Block until at least one window event arrives.
    fn wait_events(&mut self) {
        self.poll_events();
    }

    fn should_close(&self) -> bool;
}

/// Everything a recorder needs to target the acquired image.
pub struct FrameTarget<'a, S> {
    /// Swapchain the image belongs to; per-image resources are fetched from
    /// it by `image_index`.
    pub swapchain: &'a S,
    pub image_index: u32,
    pub slot_index: usize,
    pub frame_number: u64,
}

impl<S: SwapchainTarget> FrameTarget<'_, S> {
    pub fn extent(&self) -> Extent {
        self.swapchain.extent()
    }
}

/// Records draw commands for one frame.
pub trait FrameRecorder<B: FrameBackend> {
    fn record(
        &mut self,
        context: &mut B::CommandContext,
        target: FrameTarget<'_, B::Swapchain>,
    ) -> Result<()>;
}
