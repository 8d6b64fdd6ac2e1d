//! Frame slots: the fixed ring of recording contexts and their sync objects.

use crate::backend::FrameBackend;
use crate::error::{FrameError, Result};
use crate::sync::{GpuFence, SlotSync};

/// One frame in flight.
///
/// The command context is only touched by the frame driver, and only after
/// `sync.in_flight` has been observed signaled.
pub struct FrameSlot<B: FrameBackend> {
    pub(crate) command: B::CommandContext,
    pub(crate) sync: SlotSync<B::Fence, B::Semaphore>,
}

impl<B: FrameBackend> FrameSlot<B> {
    pub const fn command(&self) -> &B::CommandContext {
        &self.command
    }

    pub const fn sync(&self) -> &SlotSync<B::Fence, B::Semaphore> {
        &self.sync
    }
}

/// Fixed-size ring of frame slots.
pub struct FrameSlotPool<B: FrameBackend> {
    slots: Vec<FrameSlot<B>>,
}

impl<B: FrameBackend> FrameSlotPool<B> {
    /// Create `count` slots, each with a fresh command context and signaled
    /// fence.
    pub fn new(backend: &mut B, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(FrameError::NoFrameSlots);
        }

        let mut slots = Vec::with_capacity(count);
        for _ in 0..count {
            slots.push(FrameSlot {
                command: backend.create_command_context()?,
                sync: backend.create_slot_sync()?,
            });
        }

        Ok(Self { slots })
    }

    /// Number of slots (frames in flight).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot index used for the given frame counter.
    pub fn select(&self, frame_counter: u64) -> usize {
        (frame_counter % self.slots.len() as u64) as usize
    }

    pub fn get(&self, index: usize) -> &FrameSlot<B> {
        &self.slots[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut FrameSlot<B> {
        &mut self.slots[index]
    }

    /// Completion fence of a slot.
    pub fn fence(&self, index: usize) -> &B::Fence {
        &self.slots[index].sync.in_flight
    }

    /// Replace every slot's sync objects with fresh ones.
    ///
    /// Semaphores from before a swapchain rebuild may still carry a pending
    /// signal, so they are never carried across. The GPU must be idle.
    pub fn recreate_sync(&mut self, backend: &mut B) -> Result<()> {
        for slot in &mut self.slots {
            slot.sync = backend.create_slot_sync()?;
        }
        Ok(())
    }

    /// Number of slots whose fence is currently unsignaled.
    pub fn in_flight_count(&self) -> Result<usize> {
        let mut count = 0;
        for slot in &self.slots {
            if !slot.sync.in_flight.is_signaled()? {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameSlot<B>> {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::backend::{AcquireOutcome, PresentOutcome};
    use crate::swapchain::{Extent, SwapchainTarget};
    use crate::sync::GpuSemaphore;

    struct FlagFence(Cell<bool>);

    impl GpuFence for FlagFence {
        fn wait(&self) -> Result<()> {
            self.0.set(true);
            Ok(())
        }

        fn reset(&self) -> Result<()> {
            self.0.set(false);
            Ok(())
        }

        fn is_signaled(&self) -> Result<bool> {
            Ok(self.0.get())
        }
    }

    struct Token(u32);

    impl GpuSemaphore for Token {}

    struct NoSwapchain;

    impl SwapchainTarget for NoSwapchain {
        type Format = ();
        type PresentMode = ();

        fn format(&self) {}
        fn present_mode(&self) {}

        fn extent(&self) -> Extent {
            Extent::default()
        }

        fn image_count(&self) -> usize {
            0
        }

        fn is_clamped(&self) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct CountingBackend {
        created: u32,
    }

    impl FrameBackend for CountingBackend {
        type Fence = FlagFence;
        type Semaphore = Token;
        type CommandContext = u32;
        type Swapchain = NoSwapchain;

        fn create_swapchain(&mut self, _extent: Extent) -> Result<NoSwapchain> {
            Ok(NoSwapchain)
        }

        fn create_slot_sync(&mut self) -> Result<SlotSync<FlagFence, Token>> {
            self.created += 1;
            Ok(SlotSync {
                in_flight: FlagFence(Cell::new(true)),
                image_acquired: Token(self.created),
                render_finished: Token(self.created),
            })
        }

        fn create_command_context(&mut self) -> Result<u32> {
            Ok(0)
        }

        fn reset_command_context(&mut self, _context: &mut u32) -> Result<()> {
            Ok(())
        }

        fn acquire_next_image(&mut self, _: &NoSwapchain, _: &Token) -> Result<AcquireOutcome> {
            Ok(AcquireOutcome::OutOfDate)
        }

        fn submit(&mut self, _: &u32, _: &Token, _: &Token, _: &FlagFence) -> Result<()> {
            Ok(())
        }

        fn present(&mut self, _: &NoSwapchain, _: u32, _: &Token) -> Result<PresentOutcome> {
            Ok(PresentOutcome::OutOfDate)
        }

        fn wait_idle(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn zero_slots_rejected() {
        let mut backend = CountingBackend::default();
        assert!(matches!(
            FrameSlotPool::new(&mut backend, 0),
            Err(FrameError::NoFrameSlots)
        ));
    }

    #[test]
    fn selection_wraps_by_counter() {
        let mut backend = CountingBackend::default();
        let pool = FrameSlotPool::new(&mut backend, 3).unwrap();
        let picks: Vec<_> = (0..7).map(|k| pool.select(k)).collect();
        assert_eq!(picks, [0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn fences_start_signaled() {
        let mut backend = CountingBackend::default();
        let pool = FrameSlotPool::new(&mut backend, 4).unwrap();
        assert_eq!(pool.in_flight_count().unwrap(), 0);
    }

    #[test]
    fn recreate_sync_replaces_objects() {
        let mut backend = CountingBackend::default();
        let mut pool = FrameSlotPool::new(&mut backend, 2).unwrap();
        pool.fence(0).reset().unwrap();
        assert_eq!(pool.in_flight_count().unwrap(), 1);

        pool.recreate_sync(&mut backend).unwrap();
        assert_eq!(backend.created, 4);
        assert_eq!(pool.get(0).sync().image_acquired.0, 3);
        assert_eq!(pool.in_flight_count().unwrap(), 0);
    }
}
