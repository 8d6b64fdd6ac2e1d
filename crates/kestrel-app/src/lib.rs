//! Application framework for the Kestrel renderer.
//!
//! This crate handles the boilerplate around the frame driver:
//! - Logging setup
//! - Window creation and management
//! - GPU context, surface and frame backend initialization
//! - One frame driver tick per redraw, with resize-triggered rebuilds
//! - Frame statistics and orderly shutdown
//!
//! # Example
//!
//! ```no_run
//! use kestrel_app::{run_app, AppConfig, AppContext, FrameContext, KestrelApp};
//!
//! struct MyApp;
//!
//! impl KestrelApp for MyApp {
//!     fn init(_ctx: &mut AppContext) -> anyhow::Result<Self> {
//!         Ok(MyApp)
//!     }
//!
//!     fn update(&mut self, _ctx: &AppContext, _dt: f32) {}
//!
//!     fn record(&mut self, _ctx: &AppContext, _frame: &FrameContext) -> anyhow::Result<()> {
//!         // Draw calls go here; the render pass is already begun
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app::<MyApp>(AppConfig::default())
//! }
//! ```

mod app;
mod context;
mod frame;
mod runner;
mod stats;

pub use app::KestrelApp;
pub use context::AppContext;
pub use frame::FrameContext;
pub use runner::{run_app, AppConfig};
pub use stats::FrameStats;

// Re-export commonly used types for convenience
pub use kestrel_frame::Extent;
pub use kestrel_gpu::{GpuContext, RenderPass};
pub use winit::event::WindowEvent;
