//! Fences and semaphores.
//!
//! Both destroy themselves on drop. The frame driver only drops them once the
//! device is idle (after a rebuild's wait or at teardown).

use std::sync::Arc;

use ash::vk;
use kestrel_frame::{GpuFence, GpuSemaphore};

use crate::context::GpuContext;
use crate::error::Result;

/// CPU-waitable completion signal.
pub struct Fence {
    ctx: Arc<GpuContext>,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled.
    pub fn new(ctx: Arc<GpuContext>, signaled: bool) -> Result<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { ctx.device().create_fence(&create_info, None)? };

        Ok(Self { ctx, fence })
    }

    /// Get the raw fence handle.
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Block until signaled or until `timeout_ns` elapses.
    pub fn wait_timeout(&self, timeout_ns: u64) -> Result<()> {
        unsafe {
            self.ctx
                .device()
                .wait_for_fences(&[self.fence], true, timeout_ns)?;
        }
        Ok(())
    }
}

impl GpuFence for Fence {
    fn wait(&self) -> kestrel_frame::Result<()> {
        Ok(self.wait_timeout(u64::MAX)?)
    }

    fn reset(&self) -> kestrel_frame::Result<()> {
        unsafe {
            self.ctx
                .device()
                .reset_fences(&[self.fence])
                .map_err(crate::GpuError::from)?;
        }
        Ok(())
    }

    fn is_signaled(&self) -> kestrel_frame::Result<bool> {
        let status = unsafe { self.ctx.device().get_fence_status(self.fence) }
            .map_err(crate::GpuError::from)?;
        Ok(status)
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device().destroy_fence(self.fence, None);
        }
    }
}

/// GPU-to-GPU ordering signal.
pub struct Semaphore {
    ctx: Arc<GpuContext>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a binary semaphore.
    pub fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { ctx.device().create_semaphore(&create_info, None)? };

        Ok(Self { ctx, semaphore })
    }

    /// Get the raw semaphore handle.
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl GpuSemaphore for Semaphore {}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device().destroy_semaphore(self.semaphore, None);
        }
    }
}
