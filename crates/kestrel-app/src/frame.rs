//! Per-frame context for recording.

use ash::vk;

/// Context for the frame being recorded.
pub struct FrameContext {
    /// Command buffer with the render pass already begun.
    pub command_buffer: vk::CommandBuffer,
    /// Index of the acquired swapchain image.
    pub image_index: u32,
    /// Frame slot the command buffer belongs to.
    pub slot_index: usize,
    /// Current frame number.
    pub frame_number: u64,
    /// Swapchain extent.
    pub extent: vk::Extent2D,
    /// Delta time since last frame in seconds.
    pub dt: f32,
}
