//! Synchronization primitive interfaces.

use crate::error::Result;

/// GPU-to-CPU completion signal.
pub trait GpuFence {
    /// Block until the fence is signaled. No timeout.
    fn wait(&self) -> Result<()>;

    /// Return the fence to the unsignaled state.
    fn reset(&self) -> Result<()>;

    /// Poll the fence without blocking.
    fn is_signaled(&self) -> Result<bool>;
}

/// GPU-to-GPU ordering signal.
///
/// Semaphores are never inspected on the CPU; they are only handed to
/// acquire, submit and present.
pub trait GpuSemaphore {}

/// The three sync objects owned by one frame slot.
///
/// Dropping a `SlotSync` releases the objects, so the GPU must be idle (or
/// at least finished with this slot) first.
pub struct SlotSync<F, S> {
    /// Signaled when the slot's last submission completes. Created signaled.
    pub in_flight: F,
    /// Signaled by acquire, waited on by submit.
    pub image_acquired: S,
    /// Signaled by submit, waited on by present.
    pub render_finished: S,
}
