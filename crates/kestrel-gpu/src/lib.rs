//! Vulkan layer for the Kestrel renderer.
//!
//! This crate provides:
//! - Vulkan instance, debug messenger and device management
//! - GPU capability detection
//! - Surface and swapchain handling
//! - Fences, semaphores and command pools
//! - Render pass, framebuffers and the graphics pipeline
//! - Buffer allocation via gpu-allocator
//! - [`VulkanFrameBackend`], the Vulkan implementation of the frame driver's backend
//!
//! Every device-child object holds an `Arc<GpuContext>` and releases itself on
//! drop, so the device always outlives what was created from it.

pub mod capabilities;
pub mod command;
pub mod context;
pub mod debug;
pub mod error;
pub mod frame_backend;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod render_pass;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use capabilities::{GpuCapabilities, GpuVendor};
pub use command::CommandPool;
pub use context::{GpuContext, GpuContextBuilder};
pub use error::{GpuError, Result};
pub use frame_backend::{PresentTarget, VulkanFrameBackend};
pub use memory::{GpuAllocator, GpuBuffer};
pub use pipeline::{GraphicsPipeline, GraphicsPipelineConfig};
pub use render_pass::{Framebuffer, RenderPass};
pub use surface::{SurfaceCapabilities, SurfaceContext};
pub use swapchain::{Swapchain, SwapchainConfig};
pub use sync::{Fence, Semaphore};
