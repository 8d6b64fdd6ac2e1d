//! Frame driver behavior against the simulated GPU.

use kestrel_frame::{
    Extent, FrameDriver, FrameError, GpuFence, SurfaceProvider, SwapchainTarget, TickOutcome,
};
use kestrel_test::{
    RecordingProbe, ScriptedSurface, SimConfig, SimEvent, SimGpu, SimHandle,
};

const WINDOW: Extent = Extent::new(800, 600);

struct Rig {
    driver: FrameDriver<SimGpu>,
    gpu: SimHandle,
    surface: ScriptedSurface,
    probe: RecordingProbe,
}

impl Rig {
    fn new(config: SimConfig, frames_in_flight: usize) -> Self {
        let surface = ScriptedSurface::new(WINDOW);
        let backend = SimGpu::new(config, &surface);
        let gpu = backend.handle();
        let driver = FrameDriver::new(backend, frames_in_flight, surface.framebuffer_extent())
            .expect("driver creation");
        Self {
            driver,
            gpu,
            surface,
            probe: RecordingProbe::new(),
        }
    }

    fn tick(&mut self) -> TickOutcome {
        self.driver
            .tick(&self.surface, &mut self.probe)
            .expect("tick")
    }

    fn ticks(&mut self, count: usize) -> Vec<TickOutcome> {
        (0..count).map(|_| self.tick()).collect()
    }
}

fn position(events: &[SimEvent], predicate: impl Fn(&SimEvent) -> bool) -> Option<usize> {
    events.iter().position(predicate)
}

#[test]
fn slots_rotate_by_frame_counter() {
    let mut rig = Rig::new(SimConfig::default().with_image_count(5), 3);

    let outcomes = rig.ticks(10);

    assert!(outcomes
        .iter()
        .all(|o| matches!(o, TickOutcome::Presented { .. })));
    assert_eq!(rig.probe.slots(), [0, 1, 2, 0, 1, 2, 0, 1, 2, 0]);
    assert_eq!(rig.driver.state().frame_counter(), 10);
    assert_eq!(rig.gpu.submissions(), 10);
    rig.gpu.check().unwrap();
}

#[test]
fn in_flight_work_is_bounded_by_slot_count() {
    let mut rig = Rig::new(SimConfig::default().with_image_count(5), 3);
    rig.ticks(12);

    assert_eq!(rig.gpu.max_in_flight(), 3);
    rig.gpu.check().unwrap();
}

#[test]
fn single_slot_serializes_frames() {
    let mut rig = Rig::new(SimConfig::default(), 1);
    rig.ticks(5);

    assert_eq!(rig.gpu.max_in_flight(), 1);
    assert_eq!(rig.probe.slots(), [0, 0, 0, 0, 0]);
    rig.gpu.check().unwrap();
}

#[test]
fn fence_is_waited_then_reset_before_each_submit() {
    let mut rig = Rig::new(SimConfig::default(), 2);
    rig.ticks(6);

    let events = rig.gpu.events();
    for (index, event) in events.iter().enumerate() {
        let SimEvent::Submitted { fence, .. } = *event else {
            continue;
        };
        let before = &events[..index];
        let reset = before
            .iter()
            .rposition(|e| *e == SimEvent::FenceReset { fence })
            .expect("fence reset before submit");
        let wait = before[..reset]
            .iter()
            .rposition(|e| matches!(e, SimEvent::FenceWait { fence: f, .. } if *f == fence))
            .expect("fence wait before reset");
        assert!(!before[wait..].iter().any(
            |e| matches!(e, SimEvent::Submitted { fence: f, .. } if *f == fence)
        ));
    }
    rig.gpu.check().unwrap();
}

#[test]
fn command_context_reset_only_after_completion() {
    let mut rig = Rig::new(SimConfig::default(), 3);
    rig.ticks(9);

    // The simulated GPU reports any reset of a pending context
    rig.gpu.check().unwrap();
    let resets = rig
        .gpu
        .events()
        .iter()
        .filter(|e| matches!(e, SimEvent::CommandReset { .. }))
        .count();
    assert_eq!(resets, 9);
}

#[test]
fn fewer_images_than_slots_never_double_writes() {
    let mut rig = Rig::new(SimConfig::default().with_image_count(2), 3);
    rig.ticks(10);

    assert_eq!(rig.probe.images(), [0, 1, 0, 1, 0, 1, 0, 1, 0, 1]);
    assert_eq!(rig.gpu.max_in_flight(), 2);
    rig.gpu.check().unwrap();
}

#[test]
fn out_of_order_acquisition_waits_on_previous_owner() {
    let mut rig = Rig::new(SimConfig::default(), 2);
    rig.gpu.set_acquire_order(vec![2, 2, 0, 1, 1]);
    rig.ticks(10);

    assert_eq!(rig.probe.images()[..5], [2, 2, 0, 1, 1]);
    rig.gpu.check().unwrap();
}

#[test]
fn image_owner_tracks_last_writer() {
    let mut rig = Rig::new(SimConfig::default().with_image_count(2), 3);
    rig.ticks(3);

    // Frame 2 (slot 2) rendered image 0 after frame 0 (slot 0)
    let owners = rig.driver.state().image_fences();
    assert_eq!(owners.owner(0), Some(2));
    assert_eq!(owners.owner(1), Some(1));
}

#[test]
fn acquire_out_of_date_skips_frame_and_rebuilds() {
    let mut rig = Rig::new(SimConfig::default(), 4);
    rig.gpu.fail_acquire_at(5);

    rig.ticks(5);
    let outcome = rig.tick();

    assert_eq!(outcome, TickOutcome::AcquireOutOfDate { slot_index: 1 });
    assert_eq!(rig.driver.state().frame_counter(), 5);
    assert!(rig.driver.state().must_recreate());
    assert_eq!(rig.gpu.submissions(), 5);
    // The slot's fence was never reset, so the next tick cannot deadlock on it
    assert!(rig.driver.slots().fence(1).is_signaled().unwrap());

    rig.gpu.clear_events();
    let outcome = rig.tick();

    assert!(matches!(
        outcome,
        TickOutcome::Presented { slot_index: 1, .. }
    ));
    assert_eq!(rig.driver.state().recreations(), 1);
    assert_eq!(rig.gpu.swapchains_created(), 2);

    let events = rig.gpu.events();
    let created = position(&events, |e| matches!(e, SimEvent::SwapchainCreated { .. }))
        .expect("swapchain rebuilt");
    let first_wait = position(&events, |e| matches!(e, SimEvent::FenceWait { .. }))
        .expect("slot fence waited");
    assert!(created < first_wait);
    assert!(matches!(
        events[first_wait],
        SimEvent::FenceWait { blocked: false, .. }
    ));
    rig.gpu.check().unwrap();
}

#[test]
fn present_out_of_date_rebuilds_before_next_acquire() {
    let mut rig = Rig::new(SimConfig::default(), 2);
    rig.gpu.fail_present_at(3);

    let outcomes = rig.ticks(5);

    assert!(matches!(outcomes[3], TickOutcome::PresentOutOfDate { .. }));
    assert!(outcomes[3].submitted());
    assert!(matches!(outcomes[4], TickOutcome::Presented { .. }));
    assert_eq!(rig.driver.state().frame_counter(), 5);

    let events = rig.gpu.events();
    let rebuilt = position(&events, |e| {
        matches!(e, SimEvent::SwapchainCreated { generation: 2, .. })
    })
    .expect("swapchain rebuilt");
    let next_acquire = position(&events, |e| {
        matches!(e, SimEvent::Acquired { generation: 2, .. })
    })
    .expect("acquired from new swapchain");
    assert!(rebuilt < next_acquire);

    // No frame was submitted twice
    let frames: Vec<u64> = rig.probe.frames.iter().map(|f| f.frame_number).collect();
    assert_eq!(frames, [0, 1, 2, 3, 4]);
    assert_eq!(rig.gpu.submissions(), 5);
    rig.gpu.check().unwrap();
}

#[test]
fn suboptimal_present_is_success() {
    let mut rig = Rig::new(SimConfig::default(), 2);
    rig.gpu.suboptimal_present_at(1);

    let outcomes = rig.ticks(3);

    assert!(outcomes
        .iter()
        .all(|o| matches!(o, TickOutcome::Presented { .. })));
    assert!(!rig.driver.state().must_recreate());
    assert_eq!(rig.driver.state().recreations(), 0);
}

#[test]
fn window_system_invalidation_is_absorbed() {
    let mut rig = Rig::new(SimConfig::default(), 2);
    rig.ticks(2);
    rig.gpu.invalidate_swapchain();

    let outcome = rig.tick();
    assert_eq!(outcome, TickOutcome::AcquireOutOfDate { slot_index: 0 });

    let outcome = rig.tick();
    assert!(outcome.submitted());
    assert_eq!(rig.gpu.live_swapchains(), 1);
    rig.gpu.check().unwrap();
}

#[test]
fn resize_during_rebuild_converges() {
    let mut rig = Rig::new(SimConfig::default(), 2);
    rig.tick();

    rig.surface.resize(Extent::new(900, 700));
    rig.surface.resize_during_create(Extent::new(1024, 768));
    rig.driver.request_recreate();

    let outcome = rig.tick();

    assert!(outcome.submitted());
    assert_eq!(rig.driver.state().recreations(), 2);
    assert!(!rig.driver.state().must_recreate());
    let swapchain = rig.driver.swapchain().expect("swapchain");
    assert_eq!(swapchain.extent(), Extent::new(1024, 768));
    rig.gpu.check().unwrap();
}

#[test]
fn clamped_extent_does_not_loop() {
    let config = SimConfig::default().with_undefined_extent(Extent::new(1024, 1024));
    let surface = ScriptedSurface::new(Extent::new(1600, 900));
    let backend = SimGpu::new(config, &surface);
    let gpu = backend.handle();
    let mut driver = FrameDriver::new(backend, 2, surface.framebuffer_extent()).unwrap();
    let mut probe = RecordingProbe::new();

    driver.request_recreate();
    let outcome = driver.tick(&surface, &mut probe).unwrap();

    assert!(outcome.submitted());
    assert_eq!(driver.state().recreations(), 1);
    assert_eq!(
        driver.swapchain().map(SwapchainTarget::extent),
        Some(Extent::new(1024, 900))
    );
    gpu.check().unwrap();
}

#[test]
fn swapchain_matching_the_request_but_not_the_window_is_rebuilt() {
    // The surface reports its own size, which disagrees with the window
    // until it catches up during the first rebuild
    let window = ScriptedSurface::new(WINDOW);
    let presented = ScriptedSurface::new(Extent::new(1024, 768));
    let backend = SimGpu::new(SimConfig::default(), &presented);
    let gpu = backend.handle();
    let mut driver = FrameDriver::new(backend, 2, window.framebuffer_extent()).unwrap();
    let mut probe = RecordingProbe::new();
    presented.resize_during_create(WINDOW);

    driver.request_recreate();
    let outcome = driver.tick(&window, &mut probe).unwrap();

    assert!(outcome.submitted());
    assert_eq!(driver.state().recreations(), 2);
    assert!(!driver.state().must_recreate());
    assert_eq!(driver.swapchain().map(SwapchainTarget::extent), Some(WINDOW));
    gpu.check().unwrap();
}

#[test]
fn clamped_swapchain_follows_resize_during_rebuild() {
    let config = SimConfig::default().with_undefined_extent(Extent::new(1024, 1024));
    let surface = ScriptedSurface::new(Extent::new(1600, 900));
    let backend = SimGpu::new(config, &surface);
    let gpu = backend.handle();
    let mut driver = FrameDriver::new(backend, 2, surface.framebuffer_extent()).unwrap();
    let mut probe = RecordingProbe::new();
    surface.resize_during_create(Extent::new(1200, 800));

    driver.request_recreate();
    let outcome = driver.tick(&surface, &mut probe).unwrap();

    assert!(outcome.submitted());
    assert_eq!(driver.state().recreations(), 2);
    let swapchain = driver.swapchain().expect("swapchain");
    assert!(swapchain.is_clamped());
    assert_eq!(swapchain.extent(), Extent::new(1024, 800));
    gpu.check().unwrap();
}

#[test]
fn rebuild_replaces_slot_sync_objects() {
    let mut rig = Rig::new(SimConfig::default(), 2);
    rig.ticks(2);
    let fence_ids = |driver: &FrameDriver<SimGpu>| -> Vec<usize> {
        driver
            .slots()
            .iter()
            .map(|slot| slot.sync().in_flight.id())
            .collect()
    };
    let before = fence_ids(&rig.driver);

    rig.driver.request_recreate();
    rig.tick();

    let after = fence_ids(&rig.driver);
    assert_eq!(after.len(), 2);
    assert!(after.iter().all(|id| !before.contains(id)));
    rig.gpu.check().unwrap();
}

#[test]
fn recreation_is_idempotent() {
    let mut rig = Rig::new(SimConfig::default(), 2);
    rig.tick();
    let (format, image_count) = {
        let swapchain = rig.driver.swapchain().unwrap();
        (swapchain.format(), swapchain.image_count())
    };

    for _ in 0..2 {
        rig.driver.request_recreate();
        rig.tick();
        let swapchain = rig.driver.swapchain().unwrap();
        assert_eq!(swapchain.format(), format);
        assert_eq!(swapchain.image_count(), image_count);
    }

    assert_eq!(rig.driver.state().recreations(), 2);
    assert_eq!(rig.gpu.swapchains_created(), 3);
    assert_eq!(rig.gpu.live_swapchains(), 1);
    rig.gpu.check().unwrap();
}

#[test]
fn rebuild_clears_image_ownership() {
    let mut rig = Rig::new(SimConfig::default(), 2);
    rig.ticks(3);
    rig.driver.request_recreate();

    let outcome = rig.tick();

    let TickOutcome::Presented { image_index, .. } = outcome else {
        panic!("expected a presented frame, got {outcome:?}");
    };
    let owners: Vec<_> = rig.driver.state().image_fences().iter().collect();
    assert_eq!(owners.len(), 3);
    for (image, owner) in owners {
        assert_eq!(owner.is_some(), image == image_index);
    }
}

#[test]
#[should_panic(expected = "image count changed")]
fn image_count_change_on_rebuild_panics() {
    let mut rig = Rig::new(SimConfig::default(), 2);
    rig.tick();
    rig.gpu.force_image_count(2);
    rig.driver.request_recreate();
    rig.tick();
}

#[test]
fn minimized_surface_suspends_until_restored() {
    let mut rig = Rig::new(SimConfig::default(), 2);
    rig.tick();

    rig.surface.resize(Extent::new(0, 0));
    rig.driver.request_recreate();

    assert_eq!(rig.tick(), TickOutcome::Suspended);
    assert_eq!(rig.tick(), TickOutcome::Suspended);
    assert!(rig.driver.state().must_recreate());
    assert_eq!(rig.gpu.swapchains_created(), 1);

    rig.surface.resize(Extent::new(640, 480));
    assert!(rig.tick().submitted());
    assert_eq!(
        rig.driver.swapchain().map(SwapchainTarget::extent),
        Some(Extent::new(640, 480))
    );
    rig.gpu.check().unwrap();
}

#[test]
fn run_waits_for_events_while_minimized() {
    let mut rig = Rig::new(SimConfig::default(), 2);
    rig.surface.resize(Extent::new(0, 0));
    rig.surface.restore_on_wait(WINDOW);
    rig.surface.close_after(3);
    rig.driver.request_recreate();

    let mut host = rig.surface.clone();
    rig.driver.run(&mut host, &mut rig.probe).unwrap();

    assert_eq!(rig.surface.waits(), 1);
    assert_eq!(rig.surface.polls(), 2);
    assert_eq!(rig.gpu.submissions(), 2);
    assert_eq!(rig.driver.state().recreations(), 1);
}

#[test]
fn run_stops_when_surface_closes() {
    let mut rig = Rig::new(SimConfig::default(), 2);
    rig.surface.close_after(4);

    let mut host = rig.surface.clone();
    rig.driver.run(&mut host, &mut rig.probe).unwrap();

    assert_eq!(rig.gpu.submissions(), 4);
    assert_eq!(rig.surface.polls(), 4);
    assert_eq!(rig.gpu.in_flight(), 0);
    assert_eq!(rig.gpu.events().last(), Some(&SimEvent::WaitIdle));
    rig.gpu.check().unwrap();
}

#[test]
fn recorder_failure_is_fatal() {
    let mut rig = Rig::new(SimConfig::default(), 2);
    rig.probe = RecordingProbe::failing_on(2);
    rig.ticks(2);

    let result = rig.driver.tick(&rig.surface, &mut rig.probe);

    assert!(matches!(result, Err(FrameError::Backend(_))));
    assert_eq!(rig.driver.state().frame_counter(), 2);
    assert_eq!(rig.gpu.submissions(), 2);
}

#[test]
fn zero_frames_in_flight_rejected() {
    let surface = ScriptedSurface::new(WINDOW);
    let backend = SimGpu::new(SimConfig::default(), &surface);
    let result = FrameDriver::new(backend, 0, WINDOW);
    assert!(matches!(result, Err(FrameError::NoFrameSlots)));
}

#[test]
fn dropping_driver_idles_gpu() {
    let mut rig = Rig::new(SimConfig::default(), 3);
    rig.ticks(3);
    assert!(rig.gpu.in_flight() > 0);

    let Rig { driver, gpu, .. } = rig;
    drop(driver);

    assert_eq!(gpu.in_flight(), 0);
    assert_eq!(gpu.live_swapchains(), 0);
    gpu.check().unwrap();
}
