//! Per-tick overhead of the frame driver with the GPU taken out of the loop.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kestrel_frame::{Extent, FrameDriver};
use kestrel_test::{RecordingProbe, ScriptedSurface, SimConfig, SimGpu};

fn steady_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for frames_in_flight in [1, 2, 3] {
        group.bench_with_input(
            BenchmarkId::from_parameter(frames_in_flight),
            &frames_in_flight,
            |b, &frames_in_flight| {
                let surface = ScriptedSurface::new(Extent::new(1280, 720));
                let backend = SimGpu::new(SimConfig::default(), &surface);
                let gpu = backend.handle();
                let mut driver =
                    FrameDriver::new(backend, frames_in_flight, Extent::new(1280, 720)).unwrap();
                let mut probe = RecordingProbe::new();

                b.iter(|| {
                    let outcome = driver.tick(&surface, &mut probe).unwrap();
                    probe.frames.clear();
                    gpu.clear_events();
                    black_box(outcome)
                });
            },
        );
    }

    group.finish();
}

fn recreation(c: &mut Criterion) {
    let surface = ScriptedSurface::new(Extent::new(1280, 720));
    let backend = SimGpu::new(SimConfig::default(), &surface);
    let gpu = backend.handle();
    let mut driver = FrameDriver::new(backend, 2, Extent::new(1280, 720)).unwrap();
    let mut probe = RecordingProbe::new();

    c.bench_function("tick_with_rebuild", |b| {
        b.iter(|| {
            driver.request_recreate();
            let outcome = driver.tick(&surface, &mut probe).unwrap();
            probe.frames.clear();
            gpu.clear_events();
            black_box(outcome)
        });
    });
}

criterion_group!(benches, steady_state, recreation);
criterion_main!(benches);
