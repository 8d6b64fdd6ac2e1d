//! `KestrelApp` trait definition.

use kestrel_frame::Extent;
use winit::event::WindowEvent;

use crate::context::AppContext;
use crate::frame::FrameContext;

/// Trait for applications driven by the Kestrel runner.
///
/// The runner owns the window, the GPU context and the frame driver. An
/// application only creates its own GPU resources and records draw commands.
pub trait KestrelApp: Sized {
    /// Initialize the application.
    ///
    /// Called once after the window, GPU context and initial swapchain exist.
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self>;

    /// Update application state.
    ///
    /// Called once per redraw before the frame is ticked.
    ///
    /// # Arguments
    /// * `ctx` - Application context with GPU and window access
    /// * `dt` - Delta time in seconds since last frame
    fn update(&mut self, ctx: &AppContext, dt: f32);

    /// Record draw commands for one frame.
    ///
    /// The command buffer is begun and the render pass is begun on the
    /// acquired image's framebuffer with viewport and scissor covering the
    /// swapchain. The runner ends both afterwards. Only called for frames
    /// that will be submitted.
    fn record(&mut self, ctx: &AppContext, frame: &FrameContext) -> anyhow::Result<()>;

    /// Called after the swapchain was rebuilt with a new extent.
    ///
    /// Default implementation does nothing.
    #[allow(unused_variables)]
    fn on_resize(&mut self, ctx: &mut AppContext, extent: Extent) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handle window events.
    ///
    /// Return `true` if the event was handled and should not be processed
    /// further.
    ///
    /// Default implementation does nothing and returns `false`.
    #[allow(unused_variables)]
    fn on_event(&mut self, event: &WindowEvent) -> bool {
        false
    }

    /// Cleanup resources before shutdown.
    ///
    /// The GPU is idle when this is called.
    ///
    /// Default implementation does nothing.
    #[allow(unused_variables)]
    fn cleanup(&mut self, ctx: &mut AppContext) {}
}
