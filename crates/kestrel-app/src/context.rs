//! Application context.

use std::sync::Arc;

use kestrel_frame::Extent;
use kestrel_gpu::{GpuContext, RenderPass};
use winit::window::Window;

/// Application context shared across all app methods.
pub struct AppContext {
    /// The window handle.
    pub window: Arc<Window>,
    /// GPU context with device and queue.
    pub gpu: Arc<GpuContext>,
    /// Render pass every frame is recorded into.
    pub render_pass: Arc<RenderPass>,
    /// Current swapchain extent.
    pub(crate) extent: Extent,
    /// Number of frames in flight.
    pub(crate) frames_in_flight: usize,
    /// Total frames submitted.
    pub frame_count: u64,
}

impl AppContext {
    pub(crate) fn new(
        window: Arc<Window>,
        gpu: Arc<GpuContext>,
        render_pass: Arc<RenderPass>,
        extent: Extent,
        frames_in_flight: usize,
    ) -> Self {
        Self {
            window,
            gpu,
            render_pass,
            extent,
            frames_in_flight,
            frame_count: 0,
        }
    }

    /// Get the current swapchain extent.
    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Get the swapchain width.
    pub fn width(&self) -> u32 {
        self.extent.width
    }

    /// Get the swapchain height.
    pub fn height(&self) -> u32 {
        self.extent.height
    }

    /// Get the aspect ratio (width / height).
    #[allow(clippy::cast_precision_loss)]
    pub fn aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height.max(1) as f32
    }

    /// Get the number of frames in flight.
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }
}
