//! Test harness for the Kestrel frame driver.
//!
//! Provides a deterministic stand-in for the GPU and the window so the frame
//! driver can be exercised without a device:
//! - [`SimGpu`] implements the frame backend on a simulated queue timeline
//!   that only completes work when a fence wait or idle wait forces it, and
//!   records every protocol violation it sees
//! - [`ScriptedSurface`] reports a scripted framebuffer size
//! - [`RecordingProbe`] records what the driver asked to be recorded

pub mod probe;
pub mod sim;
pub mod surface;

pub use probe::{RecordedFrame, RecordingProbe};
pub use sim::{SimConfig, SimEvent, SimFormat, SimGpu, SimHandle, SimPresentMode};
pub use surface::ScriptedSurface;

use thiserror::Error;

/// Harness-level failures, reported when a run is checked.
#[derive(Error, Debug)]
pub enum TestError {
    #[error("{count} protocol violation(s), first: {first}")]
    Violations { count: usize, first: String },
}

pub type Result<T> = std::result::Result<T, TestError>;
