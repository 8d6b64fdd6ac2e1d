//! The frame driver state machine.
//!
//! One call to [`FrameDriver::tick`] moves one frame through:
//!
//! 1. swapchain rebuild while the recreate flag is set
//! 2. slot selection (`frame_counter mod N`)
//! 3. wait on the slot's completion fence
//! 4. command context reset
//! 5. image acquisition (out-of-date ends the tick, counter unchanged)
//! 6. recording through the [`FrameRecorder`]
//! 7. wait on whichever slot last wrote the acquired image
//! 8. fence rearm and image ownership claim
//! 9. submission
//! 10. presentation (out-of-date defers the rebuild to the next tick)
//! 11. counter advance
//!
//! Steps 3 and 7 are the only CPU-side blocking waits in steady state.

use tracing::{debug, info, trace_span, warn};

use crate::backend::{
    AcquireOutcome, FrameBackend, FrameRecorder, FrameTarget, PresentOutcome, SurfaceProvider,
};
use crate::error::{FrameError, Result};
use crate::image_fences::ImageFenceMap;
use crate::slot::FrameSlotPool;
use crate::swapchain::{Extent, SwapchainTarget};
use crate::sync::GpuFence;

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The frame was submitted and presented.
    Presented { slot_index: usize, image_index: u32 },
    /// The frame was submitted, but presentation reported the surface out of
    /// date. The rebuild happens at the start of the next tick.
    PresentOutOfDate { slot_index: usize, image_index: u32 },
    /// Acquisition reported the surface out of date. Nothing was submitted
    /// and the frame counter did not advance.
    AcquireOutOfDate { slot_index: usize },
    /// The surface has no drawable area (minimized); the rebuild is pending.
    Suspended,
}

impl TickOutcome {
    /// True if GPU work was submitted during this tick.
    pub const fn submitted(&self) -> bool {
        matches!(
            self,
            Self::Presented { .. } | Self::PresentOutOfDate { .. }
        )
    }
}

/// Mutable loop state, written only by the driver.
#[derive(Debug, Clone)]
pub struct FrameDriverState {
    frame_counter: u64,
    must_recreate: bool,
    image_fences: ImageFenceMap,
    recreations: u64,
}

impl FrameDriverState {
    fn new(image_count: usize) -> Self {
        Self {
            frame_counter: 0,
            must_recreate: false,
            image_fences: ImageFenceMap::new(image_count),
            recreations: 0,
        }
    }

    /// Number of frames submitted so far. Never reset.
    pub const fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// True if the swapchain will be rebuilt at the start of the next tick.
    pub const fn must_recreate(&self) -> bool {
        self.must_recreate
    }

    pub const fn image_fences(&self) -> &ImageFenceMap {
        &self.image_fences
    }

    /// Number of swapchain rebuilds performed.
    pub const fn recreations(&self) -> u64 {
        self.recreations
    }
}

/// Drives frames in flight against a backend.
///
/// Field order matters for teardown: slots and the swapchain are released
/// before the backend that created them.
pub struct FrameDriver<B: FrameBackend> {
    state: FrameDriverState,
    slots: FrameSlotPool<B>,
    swapchain: Option<B::Swapchain>,
    backend: B,
}

impl<B: FrameBackend> FrameDriver<B> {
    /// Build the initial swapchain and `frames_in_flight` frame slots.
    pub fn new(mut backend: B, frames_in_flight: usize, initial_extent: Extent) -> Result<Self> {
        let slots = FrameSlotPool::new(&mut backend, frames_in_flight)?;
        let swapchain = backend.create_swapchain(initial_extent)?;

        info!(
            "Frame driver ready: {} frames in flight, swapchain {} ({} images, {:?}, {:?})",
            frames_in_flight,
            swapchain.extent(),
            swapchain.image_count(),
            swapchain.format(),
            swapchain.present_mode(),
        );

        Ok(Self {
            state: FrameDriverState::new(swapchain.image_count()),
            slots,
            swapchain: Some(swapchain),
            backend,
        })
    }

    pub const fn state(&self) -> &FrameDriverState {
        &self.state
    }

    pub const fn swapchain(&self) -> Option<&B::Swapchain> {
        self.swapchain.as_ref()
    }

    pub const fn slots(&self) -> &FrameSlotPool<B> {
        &self.slots
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Schedule a swapchain rebuild for the next tick (e.g. on a resize
    /// notification from the window system).
    pub fn request_recreate(&mut self) {
        self.state.must_recreate = true;
    }

    /// Run one frame.
    pub fn tick<S, R>(&mut self, surface: &S, recorder: &mut R) -> Result<TickOutcome>
    where
        S: SurfaceProvider + ?Sized,
        R: FrameRecorder<B> + ?Sized,
    {
        while self.state.must_recreate {
            if surface.framebuffer_extent().is_empty() {
                return Ok(TickOutcome::Suspended);
            }
            self.recreate_swapchain(surface)?;
        }

        let Self {
            state,
            slots,
            swapchain,
            backend,
        } = self;
        let swapchain = swapchain
            .as_ref()
            .ok_or_else(|| FrameError::InvalidState("Swapchain missing".to_string()))?;

        let frame_number = state.frame_counter;
        let slot_index = slots.select(frame_number);

        {
            let _span = trace_span!("frame.wait_slot", slot_index).entered();
            slots.fence(slot_index).wait()?;
        }

        let slot = slots.get_mut(slot_index);
        backend.reset_command_context(&mut slot.command)?;

        let image_index = {
            let _span = trace_span!("frame.acquire").entered();
            match backend.acquire_next_image(swapchain, &slot.sync.image_acquired)? {
                AcquireOutcome::Acquired {
                    image_index,
                    suboptimal,
                } => {
                    if suboptimal {
                        debug!(frame_number, image_index, "Acquired suboptimal image");
                    }
                    image_index
                }
                AcquireOutcome::OutOfDate => {
                    debug!(frame_number, "Swapchain out of date at acquire");
                    state.must_recreate = true;
                    return Ok(TickOutcome::AcquireOutOfDate { slot_index });
                }
            }
        };

        {
            let _span = trace_span!("frame.record", slot_index, image_index).entered();
            recorder.record(
                &mut slot.command,
                FrameTarget {
                    swapchain,
                    image_index,
                    slot_index,
                    frame_number,
                },
            )?;
        }

        if let Some(owner) = state.image_fences.owner(image_index) {
            let _span = trace_span!("frame.wait_image", image_index, owner).entered();
            slots.fence(owner).wait()?;
        }

        let slot = slots.get(slot_index);
        slot.sync.in_flight.reset()?;
        state.image_fences.claim(image_index, slot_index);

        {
            let _span = trace_span!("frame.submit").entered();
            backend.submit(
                &slot.command,
                &slot.sync.image_acquired,
                &slot.sync.render_finished,
                &slot.sync.in_flight,
            )?;
        }

        let presented = {
            let _span = trace_span!("frame.present").entered();
            backend.present(swapchain, image_index, &slot.sync.render_finished)?
        };

        let outcome = match presented {
            PresentOutcome::Presented { suboptimal } => {
                if suboptimal {
                    debug!(frame_number, image_index, "Presented to suboptimal swapchain");
                }
                TickOutcome::Presented {
                    slot_index,
                    image_index,
                }
            }
            PresentOutcome::OutOfDate => {
                debug!(frame_number, "Swapchain out of date at present");
                state.must_recreate = true;
                TickOutcome::PresentOutOfDate {
                    slot_index,
                    image_index,
                }
            }
        };

        state.frame_counter += 1;
        Ok(outcome)
    }

    /// Tick until the surface asks to close, then idle the GPU.
    pub fn run<S, R>(&mut self, surface: &mut S, recorder: &mut R) -> Result<()>
    where
        S: SurfaceProvider + ?Sized,
        R: FrameRecorder<B> + ?Sized,
    {
        while !surface.should_close() {
            match self.tick(&*surface, recorder)? {
                TickOutcome::Suspended => surface.wait_events(),
                _ => surface.poll_events(),
            }
        }
        self.shutdown()
    }

    /// Wait for the GPU to finish everything submitted so far.
    pub fn shutdown(&mut self) -> Result<()> {
        self.backend.wait_idle()
    }

    fn recreate_swapchain<S>(&mut self, surface: &S) -> Result<()>
    where
        S: SurfaceProvider + ?Sized,
    {
        let _span = trace_span!("frame.recreate").entered();
        self.state.must_recreate = false;
        self.backend.wait_idle()?;

        let previous = self
            .swapchain
            .take()
            .map(|old| (old.format(), old.image_count()));

        let requested = surface.framebuffer_extent();
        let swapchain = self.backend.create_swapchain(requested)?;

        if let Some((format, image_count)) = previous {
            assert_eq!(
                swapchain.format(),
                format,
                "swapchain format changed across recreation"
            );
            assert_eq!(
                swapchain.image_count(),
                image_count,
                "swapchain image count changed across recreation"
            );
        }

        self.slots.recreate_sync(&mut self.backend)?;
        self.state.image_fences.reset(swapchain.image_count());
        self.state.recreations += 1;

        // A clamped swapchain is final while the window keeps the size it
        // was built from
        let live = surface.framebuffer_extent();
        let settled =
            live == swapchain.extent() || (swapchain.is_clamped() && live == requested);
        if !settled {
            debug!(
                "Surface is {live} but swapchain is {}, rebuilding again",
                swapchain.extent()
            );
            self.state.must_recreate = true;
        }

        info!(
            "Swapchain recreated: {} ({} images)",
            swapchain.extent(),
            swapchain.image_count()
        );

        self.swapchain = Some(swapchain);
        Ok(())
    }
}

impl<B: FrameBackend> Drop for FrameDriver<B> {
    fn drop(&mut self) {
        if let Err(e) = self.backend.wait_idle() {
            warn!("Failed to wait for GPU idle during teardown: {e}");
        }
    }
}
