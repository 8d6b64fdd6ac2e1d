//! Simulated GPU timeline.
//!
//! The simulated queue is maximally lazy: a submission only completes when a
//! fence wait needs it or the device is idled, and then every earlier
//! submission completes with it (queue order). That makes the CPU run as far
//! ahead as the frame driver allows, which is exactly what the in-flight and
//! image-ownership checks need to observe.
//!
//! Protocol violations do not fail the call that caused them (unless the
//! call could never return on real hardware); they are collected and checked
//! through [`SimHandle`].

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use kestrel_frame::swapchain::{choose_extent, choose_image_count, pick_preferred};
use kestrel_frame::{
    AcquireOutcome, Extent, FrameBackend, FrameError, GpuFence, GpuSemaphore, PresentOutcome,
    Result, SlotSync, SwapchainTarget,
};
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::surface::{ScriptedSurface, SurfaceState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFormat {
    Bgra8Srgb,
    Bgra8Unorm,
    Rgba8Unorm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimPresentMode {
    Immediate,
    Mailbox,
    Fifo,
}

/// What the simulated surface supports.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub formats: Vec<SimFormat>,
    pub preferred_format: SimFormat,
    pub present_modes: Vec<SimPresentMode>,
    pub preferred_present_mode: SimPresentMode,
    pub min_image_count: u32,
    /// Zero means no maximum.
    pub max_image_count: u32,
    /// Report the undefined extent sentinel, leaving the size to the caller.
    pub undefined_extent: bool,
    pub min_extent: Extent,
    pub max_extent: Extent,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            formats: vec![SimFormat::Bgra8Unorm, SimFormat::Bgra8Srgb],
            preferred_format: SimFormat::Bgra8Srgb,
            present_modes: vec![SimPresentMode::Fifo, SimPresentMode::Immediate],
            preferred_present_mode: SimPresentMode::Immediate,
            min_image_count: 2,
            max_image_count: 3,
            undefined_extent: false,
            min_extent: Extent::new(1, 1),
            max_extent: Extent::new(4096, 4096),
        }
    }
}

impl SimConfig {
    /// Surface with exactly `count` images.
    pub fn with_image_count(mut self, count: u32) -> Self {
        self.min_image_count = count;
        self.max_image_count = count;
        self
    }

    /// Surface that leaves the extent to the swapchain, clamped to `max`.
    pub fn with_undefined_extent(mut self, max: Extent) -> Self {
        self.undefined_extent = true;
        self.max_extent = max;
        self
    }
}

/// Everything the simulated device observed, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    SwapchainCreated {
        generation: u64,
        extent: Extent,
        image_count: usize,
    },
    SwapchainDestroyed {
        generation: u64,
    },
    /// `blocked` is true if the fence was unsignaled when the wait began.
    FenceWait {
        fence: usize,
        blocked: bool,
    },
    FenceReset {
        fence: usize,
    },
    CommandReset {
        command: usize,
    },
    Acquired {
        generation: u64,
        image_index: u32,
    },
    AcquireOutOfDate {
        generation: u64,
    },
    Submitted {
        seq: u64,
        command: usize,
        fence: usize,
        image_index: u32,
    },
    Completed {
        seq: u64,
        fence: usize,
    },
    Presented {
        generation: u64,
        image_index: u32,
    },
    PresentOutOfDate {
        generation: u64,
    },
    WaitIdle,
}

#[derive(Debug)]
struct Submission {
    seq: u64,
    fence: usize,
    image_index: u32,
}

#[derive(Debug, Default)]
struct Timeline {
    /// Signaled state per fence id.
    fences: Vec<bool>,
    /// Pending signal per semaphore id, carrying the image it refers to.
    semaphores: Vec<Option<u32>>,
    /// Last submission per command context id.
    commands: Vec<Option<u64>>,
    pending: VecDeque<Submission>,
    last_seq: u64,
    completed_seq: u64,
    max_in_flight: usize,

    generation: u64,
    live_swapchains: usize,
    stale: bool,
    next_image: usize,
    image_count_override: Option<u32>,

    acquire_calls: u64,
    present_calls: u64,
    acquire_out_of_date: BTreeSet<u64>,
    present_out_of_date: BTreeSet<u64>,
    suboptimal_presents: BTreeSet<u64>,
    acquire_order: Vec<u32>,

    events: Vec<SimEvent>,
    violations: Vec<String>,
}

impl Timeline {
    fn violation(&mut self, message: String) {
        warn!("Simulated GPU: {message}");
        self.violations.push(message);
    }

    fn fence_in_flight(&self, fence: usize) -> bool {
        self.pending.iter().any(|s| s.fence == fence)
    }

    fn complete_through(&mut self, seq: u64) {
        while self.pending.front().is_some_and(|s| s.seq <= seq) {
            let Some(done) = self.pending.pop_front() else {
                break;
            };
            self.fences[done.fence] = true;
            self.completed_seq = done.seq;
            self.events.push(SimEvent::Completed {
                seq: done.seq,
                fence: done.fence,
            });
        }
    }

    fn wait_fence(&mut self, fence: usize) -> Result<()> {
        if self.fences[fence] {
            self.events.push(SimEvent::FenceWait {
                fence,
                blocked: false,
            });
            return Ok(());
        }

        let Some(seq) = self
            .pending
            .iter()
            .find(|s| s.fence == fence)
            .map(|s| s.seq)
        else {
            self.violation(format!("wait on fence {fence} that no submission will signal"));
            return Err(FrameError::Backend(format!("Fence {fence} would never signal")));
        };

        self.events.push(SimEvent::FenceWait {
            fence,
            blocked: true,
        });
        self.complete_through(seq);
        Ok(())
    }

    fn reset_fence(&mut self, fence: usize) {
        if self.fence_in_flight(fence) {
            self.violation(format!("fence {fence} reset while its submission is in flight"));
        }
        self.fences[fence] = false;
        self.events.push(SimEvent::FenceReset { fence });
    }

    fn destroy_fence(&mut self, fence: usize) {
        if self.fence_in_flight(fence) {
            self.violation(format!("fence {fence} destroyed while in flight"));
        }
    }

    fn wait_idle(&mut self) {
        self.complete_through(self.last_seq);
        self.events.push(SimEvent::WaitIdle);
    }
}

/// Simulated fence.
pub struct SimFence {
    id: usize,
    timeline: Arc<Mutex<Timeline>>,
}

impl SimFence {
    pub const fn id(&self) -> usize {
        self.id
    }
}

impl GpuFence for SimFence {
    fn wait(&self) -> Result<()> {
        self.timeline.lock().wait_fence(self.id)
    }

    fn reset(&self) -> Result<()> {
        self.timeline.lock().reset_fence(self.id);
        Ok(())
    }

    fn is_signaled(&self) -> Result<bool> {
        Ok(self.timeline.lock().fences[self.id])
    }
}

impl Drop for SimFence {
    fn drop(&mut self) {
        self.timeline.lock().destroy_fence(self.id);
    }
}

/// Simulated binary semaphore.
#[derive(Debug)]
pub struct SimSemaphore {
    id: usize,
}

impl GpuSemaphore for SimSemaphore {}

/// Simulated command buffer.
#[derive(Debug)]
pub struct SimCommand {
    id: usize,
    /// Times a recorder wrote into this context.
    pub recordings: u64,
}

impl SimCommand {
    pub const fn id(&self) -> usize {
        self.id
    }
}

/// Simulated swapchain.
pub struct SimSwapchain {
    generation: u64,
    format: SimFormat,
    present_mode: SimPresentMode,
    extent: Extent,
    clamped: bool,
    image_count: usize,
    timeline: Arc<Mutex<Timeline>>,
}

impl SimSwapchain {
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

impl SwapchainTarget for SimSwapchain {
    type Format = SimFormat;
    type PresentMode = SimPresentMode;

    fn format(&self) -> SimFormat {
        self.format
    }

    fn present_mode(&self) -> SimPresentMode {
        self.present_mode
    }

    fn extent(&self) -> Extent {
        self.extent
    }

    fn image_count(&self) -> usize {
        self.image_count
    }

    fn is_clamped(&self) -> bool {
        self.clamped
    }
}

impl Drop for SimSwapchain {
    fn drop(&mut self) {
        let mut timeline = self.timeline.lock();
        if !timeline.pending.is_empty() {
            let count = timeline.pending.len();
            timeline.violation(format!(
                "swapchain {} destroyed with {count} submission(s) in flight",
                self.generation
            ));
        }
        timeline.live_swapchains -= 1;
        timeline.events.push(SimEvent::SwapchainDestroyed {
            generation: self.generation,
        });
    }
}

/// Frame backend over the simulated timeline.
pub struct SimGpu {
    config: SimConfig,
    timeline: Arc<Mutex<Timeline>>,
    surface: Arc<Mutex<SurfaceState>>,
}

impl SimGpu {
    /// Create a simulated device presenting to `surface`.
    pub fn new(config: SimConfig, surface: &ScriptedSurface) -> Self {
        Self {
            config,
            timeline: Arc::new(Mutex::new(Timeline::default())),
            surface: surface.shared(),
        }
    }

    /// Handle for scripting and inspecting the timeline after the backend
    /// has been moved into a driver.
    pub fn handle(&self) -> SimHandle {
        SimHandle {
            timeline: Arc::clone(&self.timeline),
        }
    }
}

impl FrameBackend for SimGpu {
    type Fence = SimFence;
    type Semaphore = SimSemaphore;
    type CommandContext = SimCommand;
    type Swapchain = SimSwapchain;

    fn create_swapchain(&mut self, framebuffer_extent: Extent) -> Result<SimSwapchain> {
        let current = if self.config.undefined_extent {
            Extent::new(Extent::UNDEFINED, Extent::UNDEFINED)
        } else {
            self.surface.lock().extent
        };
        let extent = choose_extent(
            current,
            self.config.min_extent,
            self.config.max_extent,
            Some(framebuffer_extent),
        )?;

        let format = pick_preferred(&self.config.formats, |f| *f == self.config.preferred_format)
            .ok_or_else(|| FrameError::Backend("Surface reports no formats".to_string()))?;
        let present_mode = pick_preferred(&self.config.present_modes, |m| {
            *m == self.config.preferred_present_mode
        })
        .ok_or_else(|| FrameError::Backend("Surface reports no present modes".to_string()))?;

        let mut timeline = self.timeline.lock();
        let image_count = timeline.image_count_override.unwrap_or_else(|| {
            choose_image_count(self.config.min_image_count, self.config.max_image_count)
        }) as usize;

        if extent.is_empty() {
            timeline.violation(format!("swapchain created with empty extent {extent}"));
        }
        if timeline.live_swapchains > 0 {
            timeline.violation("swapchain created while the previous one is alive".to_string());
        }

        timeline.live_swapchains += 1;
        timeline.generation += 1;
        timeline.stale = false;
        timeline.next_image = 0;
        let generation = timeline.generation;
        timeline.events.push(SimEvent::SwapchainCreated {
            generation,
            extent,
            image_count,
        });
        trace!(generation, %extent, image_count, "Simulated swapchain created");
        drop(timeline);

        self.surface.lock().swapchain_created();

        Ok(SimSwapchain {
            generation,
            format,
            present_mode,
            extent,
            clamped: current.is_undefined(),
            image_count,
            timeline: Arc::clone(&self.timeline),
        })
    }

    fn create_slot_sync(&mut self) -> Result<SlotSync<SimFence, SimSemaphore>> {
        let mut timeline = self.timeline.lock();
        let fence = timeline.fences.len();
        timeline.fences.push(true);
        let acquired = timeline.semaphores.len();
        timeline.semaphores.push(None);
        timeline.semaphores.push(None);

        Ok(SlotSync {
            in_flight: SimFence {
                id: fence,
                timeline: Arc::clone(&self.timeline),
            },
            image_acquired: SimSemaphore { id: acquired },
            render_finished: SimSemaphore { id: acquired + 1 },
        })
    }

    fn create_command_context(&mut self) -> Result<SimCommand> {
        let mut timeline = self.timeline.lock();
        let id = timeline.commands.len();
        timeline.commands.push(None);
        Ok(SimCommand { id, recordings: 0 })
    }

    fn reset_command_context(&mut self, context: &mut SimCommand) -> Result<()> {
        let mut timeline = self.timeline.lock();
        let last = timeline.commands[context.id];
        if let Some(seq) = last {
            if seq > timeline.completed_seq {
                timeline.violation(format!(
                    "command context {} reset while submission {seq} is in flight",
                    context.id
                ));
            }
        }
        timeline.events.push(SimEvent::CommandReset {
            command: context.id,
        });
        Ok(())
    }

    fn acquire_next_image(
        &mut self,
        swapchain: &SimSwapchain,
        image_acquired: &SimSemaphore,
    ) -> Result<AcquireOutcome> {
        let mut timeline = self.timeline.lock();
        let call = timeline.acquire_calls;
        timeline.acquire_calls += 1;

        if swapchain.generation != timeline.generation {
            timeline.violation(format!(
                "acquire on retired swapchain {}",
                swapchain.generation
            ));
        }

        if timeline.stale || timeline.acquire_out_of_date.contains(&call) {
            timeline.stale = true;
            timeline.events.push(SimEvent::AcquireOutOfDate {
                generation: swapchain.generation,
            });
            return Ok(AcquireOutcome::OutOfDate);
        }

        if timeline.semaphores[image_acquired.id].is_some() {
            timeline.violation(format!(
                "acquire signals semaphore {} that is already pending",
                image_acquired.id
            ));
        }

        let turn = timeline.next_image;
        timeline.next_image += 1;
        let image = if timeline.acquire_order.is_empty() {
            turn
        } else {
            let order = &timeline.acquire_order;
            order[turn % order.len()] as usize
        };
        let image_index = (image % swapchain.image_count) as u32;

        timeline.semaphores[image_acquired.id] = Some(image_index);
        timeline.events.push(SimEvent::Acquired {
            generation: swapchain.generation,
            image_index,
        });

        Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal: false,
        })
    }

    fn submit(
        &mut self,
        context: &SimCommand,
        wait: &SimSemaphore,
        signal: &SimSemaphore,
        fence: &SimFence,
    ) -> Result<()> {
        let mut timeline = self.timeline.lock();

        let Some(image_index) = timeline.semaphores[wait.id].take() else {
            timeline.violation(format!("submit waits on unsignaled semaphore {}", wait.id));
            return Err(FrameError::Backend(
                "Submission would never start".to_string(),
            ));
        };

        if timeline.fences[fence.id] {
            timeline.violation(format!("submit with fence {} still signaled", fence.id));
        }
        if timeline.fence_in_flight(fence.id) {
            timeline.violation(format!("submit reuses in-flight fence {}", fence.id));
        }
        let writer = timeline
            .pending
            .iter()
            .find(|s| s.image_index == image_index)
            .map(|s| s.seq);
        if let Some(writer) = writer {
            timeline.violation(format!(
                "image {image_index} submitted while submission {writer} still writes it"
            ));
        }
        if timeline.semaphores[signal.id].is_some() {
            timeline.violation(format!(
                "submit signals semaphore {} that is already pending",
                signal.id
            ));
        }

        timeline.last_seq += 1;
        let seq = timeline.last_seq;
        timeline.semaphores[signal.id] = Some(image_index);
        timeline.commands[context.id] = Some(seq);
        timeline.pending.push_back(Submission {
            seq,
            fence: fence.id,
            image_index,
        });
        timeline.max_in_flight = timeline.max_in_flight.max(timeline.pending.len());
        timeline.events.push(SimEvent::Submitted {
            seq,
            command: context.id,
            fence: fence.id,
            image_index,
        });

        Ok(())
    }

    fn present(
        &mut self,
        swapchain: &SimSwapchain,
        image_index: u32,
        wait: &SimSemaphore,
    ) -> Result<PresentOutcome> {
        let mut timeline = self.timeline.lock();
        let call = timeline.present_calls;
        timeline.present_calls += 1;

        match timeline.semaphores[wait.id].take() {
            Some(rendered) if rendered == image_index => {}
            Some(rendered) => timeline.violation(format!(
                "present of image {image_index} waits on the render of image {rendered}"
            )),
            None => timeline.violation(format!("present waits on unsignaled semaphore {}", wait.id)),
        }

        if timeline.stale || timeline.present_out_of_date.contains(&call) {
            timeline.stale = true;
            timeline.events.push(SimEvent::PresentOutOfDate {
                generation: swapchain.generation,
            });
            return Ok(PresentOutcome::OutOfDate);
        }

        timeline.events.push(SimEvent::Presented {
            generation: swapchain.generation,
            image_index,
        });

        Ok(PresentOutcome::Presented {
            suboptimal: timeline.suboptimal_presents.contains(&call),
        })
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.timeline.lock().wait_idle();
        Ok(())
    }
}

/// Scripting and inspection handle for a [`SimGpu`].
///
/// Call indices are zero-based and count every acquire (or present) call the
/// backend receives, including ones that reported out-of-date.
#[derive(Clone)]
pub struct SimHandle {
    timeline: Arc<Mutex<Timeline>>,
}

impl SimHandle {
    /// Report out-of-date from the given acquire call.
    pub fn fail_acquire_at(&self, call: u64) {
        self.timeline.lock().acquire_out_of_date.insert(call);
    }

    /// Report out-of-date from the given present call.
    pub fn fail_present_at(&self, call: u64) {
        self.timeline.lock().present_out_of_date.insert(call);
    }

    /// Report the given present call as suboptimal.
    pub fn suboptimal_present_at(&self, call: u64) {
        self.timeline.lock().suboptimal_presents.insert(call);
    }

    /// Hand out images in this order (cycled) instead of round-robin.
    pub fn set_acquire_order(&self, order: Vec<u32>) {
        self.timeline.lock().acquire_order = order;
    }

    /// Force the image count of swapchains created from now on.
    pub fn force_image_count(&self, count: u32) {
        self.timeline.lock().image_count_override = Some(count);
    }

    /// Mark the current swapchain out of date, as a window-system change would.
    pub fn invalidate_swapchain(&self) {
        self.timeline.lock().stale = true;
    }

    /// Let the GPU finish everything submitted so far.
    pub fn complete_all(&self) {
        let mut timeline = self.timeline.lock();
        let last = timeline.last_seq;
        timeline.complete_through(last);
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.timeline.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.timeline.lock().events.clear();
    }

    pub fn violations(&self) -> Vec<String> {
        self.timeline.lock().violations.clone()
    }

    /// Fail if any protocol violation was observed.
    pub fn check(&self) -> crate::Result<()> {
        let timeline = self.timeline.lock();
        match timeline.violations.first() {
            Some(first) => Err(crate::TestError::Violations {
                count: timeline.violations.len(),
                first: first.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Most submissions ever simultaneously incomplete.
    pub fn max_in_flight(&self) -> usize {
        self.timeline.lock().max_in_flight
    }

    /// Submissions currently incomplete.
    pub fn in_flight(&self) -> usize {
        self.timeline.lock().pending.len()
    }

    pub fn submissions(&self) -> u64 {
        self.timeline.lock().last_seq
    }

    /// Swapchains created so far, including the initial one.
    pub fn swapchains_created(&self) -> u64 {
        self.timeline.lock().generation
    }

    pub fn live_swapchains(&self) -> usize {
        self.timeline.lock().live_swapchains
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> (SimGpu, SimHandle) {
        let surface = ScriptedSurface::new(Extent::new(640, 480));
        let gpu = SimGpu::new(SimConfig::default(), &surface);
        let handle = gpu.handle();
        (gpu, handle)
    }

    fn acquire(gpu: &mut SimGpu, swapchain: &SimSwapchain, semaphore: &SimSemaphore) -> u32 {
        match gpu.acquire_next_image(swapchain, semaphore).unwrap() {
            AcquireOutcome::Acquired { image_index, .. } => image_index,
            AcquireOutcome::OutOfDate => panic!("unexpected out-of-date"),
        }
    }

    #[test]
    fn selection_policy_applies_to_surface_lists() {
        let (mut gpu, _) = backend();
        let swapchain = gpu.create_swapchain(Extent::new(1, 1)).unwrap();
        assert_eq!(swapchain.format(), SimFormat::Bgra8Srgb);
        assert_eq!(swapchain.present_mode(), SimPresentMode::Immediate);
        assert_eq!(swapchain.image_count(), 3);
        assert_eq!(swapchain.extent(), Extent::new(640, 480));
    }

    #[test]
    fn undefined_extent_clamps_framebuffer_size() {
        let surface = ScriptedSurface::new(Extent::new(640, 480));
        let config = SimConfig::default().with_undefined_extent(Extent::new(500, 500));
        let mut gpu = SimGpu::new(config, &surface);
        let swapchain = gpu.create_swapchain(Extent::new(640, 480)).unwrap();
        assert_eq!(swapchain.extent(), Extent::new(500, 480));
    }

    #[test]
    fn fence_wait_completes_queue_in_order() {
        let (mut gpu, handle) = backend();
        let swapchain = gpu.create_swapchain(Extent::new(1, 1)).unwrap();
        let command = gpu.create_command_context().unwrap();
        let first = gpu.create_slot_sync().unwrap();
        let second = gpu.create_slot_sync().unwrap();

        for sync in [&first, &second] {
            acquire(&mut gpu, &swapchain, &sync.image_acquired);
            sync.in_flight.reset().unwrap();
            gpu.submit(
                &command,
                &sync.image_acquired,
                &sync.render_finished,
                &sync.in_flight,
            )
            .unwrap();
        }
        assert_eq!(handle.in_flight(), 2);

        second.in_flight.wait().unwrap();
        assert!(first.in_flight.is_signaled().unwrap());
        assert_eq!(handle.in_flight(), 0);
        assert!(handle.check().is_ok());
    }

    #[test]
    fn double_write_is_reported() {
        let (mut gpu, handle) = backend();
        handle.set_acquire_order(vec![0]);
        let swapchain = gpu.create_swapchain(Extent::new(1, 1)).unwrap();
        let command = gpu.create_command_context().unwrap();
        let first = gpu.create_slot_sync().unwrap();
        let second = gpu.create_slot_sync().unwrap();

        for sync in [&first, &second] {
            assert_eq!(acquire(&mut gpu, &swapchain, &sync.image_acquired), 0);
            sync.in_flight.reset().unwrap();
            gpu.submit(
                &command,
                &sync.image_acquired,
                &sync.render_finished,
                &sync.in_flight,
            )
            .unwrap();
        }

        let violations = handle.violations();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("image 0"));
        gpu.wait_idle().unwrap();
    }

    #[test]
    fn waiting_on_an_orphan_fence_fails() {
        let (mut gpu, handle) = backend();
        let sync = gpu.create_slot_sync().unwrap();
        sync.in_flight.reset().unwrap();
        assert!(sync.in_flight.wait().is_err());
        assert!(handle.check().is_err());
    }

    #[test]
    fn stale_swapchain_stays_out_of_date() {
        let (mut gpu, handle) = backend();
        let swapchain = gpu.create_swapchain(Extent::new(1, 1)).unwrap();
        let sync = gpu.create_slot_sync().unwrap();
        handle.fail_acquire_at(0);

        for _ in 0..2 {
            assert_eq!(
                gpu.acquire_next_image(&swapchain, &sync.image_acquired)
                    .unwrap(),
                AcquireOutcome::OutOfDate
            );
        }

        drop(swapchain);
        let swapchain = gpu.create_swapchain(Extent::new(1, 1)).unwrap();
        assert_eq!(acquire(&mut gpu, &swapchain, &sync.image_acquired), 0);
        assert!(handle.check().is_ok());
    }
}
