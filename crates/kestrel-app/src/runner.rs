//! Application runner and event loop.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ash::vk;
use kestrel_frame::{
    Extent, FrameDriver, FrameError, FrameRecorder, FrameTarget, SurfaceProvider, SwapchainTarget,
    TickOutcome, DEFAULT_FRAMES_IN_FLIGHT,
};
use kestrel_gpu::command::{begin_command_buffer, end_command_buffer};
use kestrel_gpu::{
    GpuContextBuilder, PresentTarget, SurfaceContext, SwapchainConfig, VulkanFrameBackend,
};
use raw_window_handle::HasDisplayHandle;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::app::KestrelApp;
use crate::context::AppContext;
use crate::frame::FrameContext;
use crate::stats::FrameStats;

/// Application configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Frames the CPU may record ahead of the GPU.
    pub frames_in_flight: usize,
    /// Target frames per second (None for unlimited).
    pub target_fps: Option<u32>,
    /// Enable vsync. Overrides the preferred present mode with FIFO.
    pub vsync: bool,
    /// Present mode to ask for when vsync is off.
    pub present_mode: vk::PresentModeKHR,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Color the render pass clears to.
    pub clear_color: [f32; 4],
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Kestrel".to_string(),
            width: 1280,
            height: 720,
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            target_fps: None,
            vsync: false,
            present_mode: vk::PresentModeKHR::IMMEDIATE,
            validation: cfg!(debug_assertions),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the number of frames in flight.
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Set the target FPS.
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = Some(fps);
        self
    }

    /// Enable or disable vsync.
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Set the preferred present mode.
    pub fn with_present_mode(mut self, mode: vk::PresentModeKHR) -> Self {
        self.present_mode = mode;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Set the clear color.
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Swapchain preferences derived from this config.
    pub fn swapchain_config(&self) -> SwapchainConfig {
        let mode = if self.vsync {
            vk::PresentModeKHR::FIFO
        } else {
            self.present_mode
        };
        SwapchainConfig::default().present_mode(mode)
    }
}

/// Run a `KestrelApp` with the given configuration.
///
/// Initializes logging, creates the window and GPU context, and runs the
/// event loop until the window closes or a frame fails. A failed frame is
/// returned as the error.
pub fn run_app<A: KestrelApp + 'static>(config: AppConfig) -> anyhow::Result<()> {
    // A second call (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner::<A> {
        config,
        state: None,
        fatal: None,
    };

    event_loop.run_app(&mut runner)?;

    match runner.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Internal application runner that implements winit's `ApplicationHandler`.
struct AppRunner<A: KestrelApp> {
    config: AppConfig,
    state: Option<AppState<A>>,
    fatal: Option<anyhow::Error>,
}

/// Internal application state.
///
/// Field order matters: the driver idles the GPU and releases the swapchain
/// and frame slots before the app's resources and the context go.
struct AppState<A: KestrelApp> {
    driver: FrameDriver<VulkanFrameBackend>,
    app: A,
    ctx: AppContext,
    surface: WinitSurface,
    clear_color: [f32; 4],
    target_frame_time: Option<Duration>,
    last_frame_time: Instant,
    stats: FrameStats,
    suspended: bool,
}

impl<A: KestrelApp + 'static> ApplicationHandler for AppRunner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Creating application state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => {
                error!("Failed to initialize application: {e:#}");
                self.fatal = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        // Let the app handle the event first
        if let Some(state) = &mut self.state {
            if state.app.on_event(&event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                if let Some(mut state) = self.state.take() {
                    state.cleanup();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let Some(state) = &mut self.state else {
                    return;
                };
                match state.render_frame() {
                    Ok(()) => {
                        if state.suspended {
                            event_loop.set_control_flow(ControlFlow::Wait);
                        } else {
                            event_loop.set_control_flow(ControlFlow::Poll);
                            state.ctx.window.request_redraw();
                        }
                    }
                    Err(e) => {
                        error!("Frame failed: {e:#}");
                        if let Some(mut state) = self.state.take() {
                            state.cleanup();
                        }
                        self.fatal = Some(e);
                        event_loop.exit();
                    }
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    debug!("Window resized to {}x{}", size.width, size.height);
                    state.driver.request_recreate();
                    state.suspended = false;
                    state.ctx.window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            if !state.suspended {
                state.ctx.window.request_redraw();
            }
        }
    }
}

impl<A: KestrelApp + 'static> AppRunner<A> {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState<A>> {
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));

        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let gpu = GpuContextBuilder::new()
            .app_name(&self.config.title)
            .validation(self.config.validation)
            .display(window.display_handle()?.as_raw())
            .build()?;

        // SAFETY: the window is kept alive by the app context, which outlives
        // the driver and therefore the surface
        let surface = unsafe { SurfaceContext::from_window(gpu.clone(), window.as_ref())? };
        let backend = VulkanFrameBackend::new(surface, self.config.swapchain_config())?;
        let render_pass = backend.render_pass().clone();

        let winit_surface = WinitSurface {
            window: window.clone(),
        };
        let driver = FrameDriver::new(
            backend,
            self.config.frames_in_flight,
            winit_surface.framebuffer_extent(),
        )?;

        let extent = driver
            .swapchain()
            .map(SwapchainTarget::extent)
            .unwrap_or_default();

        let mut ctx = AppContext::new(
            window,
            gpu,
            render_pass,
            extent,
            driver.frames_in_flight(),
        );

        let app = A::init(&mut ctx)?;

        let target_frame_time = self
            .config
            .target_fps
            .filter(|fps| *fps > 0)
            .map(|fps| Duration::from_nanos(1_000_000_000 / u64::from(fps)));

        Ok(AppState {
            driver,
            app,
            ctx,
            surface: winit_surface,
            clear_color: self.config.clear_color,
            target_frame_time,
            last_frame_time: Instant::now(),
            stats: FrameStats::default(),
            suspended: false,
        })
    }
}

impl<A: KestrelApp> AppState<A> {
    fn render_frame(&mut self) -> anyhow::Result<()> {
        let frame_start = Instant::now();

        let now = Instant::now();
        let dt = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;

        self.app.update(&self.ctx, dt);

        let mut recorder = AppRecorder {
            app: &mut self.app,
            ctx: &self.ctx,
            clear_color: self.clear_color,
            dt,
        };
        let outcome = self.driver.tick(&self.surface, &mut recorder)?;

        self.suspended = outcome == TickOutcome::Suspended;
        if outcome.submitted() {
            self.stats.record(dt);
            self.ctx.frame_count = self.driver.state().frame_counter();
        }

        // Pick up a rebuilt swapchain
        if let Some(extent) = self.driver.swapchain().map(SwapchainTarget::extent) {
            if extent != self.ctx.extent {
                info!("Resized to {extent}");
                self.ctx.extent = extent;
                self.app.on_resize(&mut self.ctx, extent)?;
            }
        }

        if let Some(target) = self.target_frame_time {
            let elapsed = frame_start.elapsed();
            if elapsed < target {
                thread::sleep(target - elapsed);
            }
        }

        Ok(())
    }

    fn cleanup(&mut self) {
        self.stats.log_summary(self.driver.state().frame_counter());

        info!("Starting cleanup...");
        if let Err(e) = self.driver.shutdown() {
            error!("Failed to wait idle: {e}");
        }

        self.app.cleanup(&mut self.ctx);

        info!(
            "Cleanup complete ({} swapchain rebuilds)",
            self.driver.state().recreations()
        );
    }
}

/// The window as seen by the frame driver.
///
/// winit drives the event loop, so polling and waiting are handled by the
/// runner through the control flow rather than here.
struct WinitSurface {
    window: Arc<Window>,
}

impl SurfaceProvider for WinitSurface {
    fn framebuffer_extent(&self) -> Extent {
        let size = self.window.inner_size();
        Extent::new(size.width, size.height)
    }

    /// winit's control flow dispatches events; the runner never calls this.
    fn poll_events(&mut self) {}

    /// Closing arrives as `WindowEvent::CloseRequested` and exits the event
    /// loop, so the driver never sees a closing surface.
    fn should_close(&self) -> bool {
        false
    }
}

/// Wraps the app's `record` in command buffer and render pass setup.
struct AppRecorder<'a, A> {
    app: &'a mut A,
    ctx: &'a AppContext,
    clear_color: [f32; 4],
    dt: f32,
}

impl<A: KestrelApp> FrameRecorder<VulkanFrameBackend> for AppRecorder<'_, A> {
    fn record(
        &mut self,
        context: &mut vk::CommandBuffer,
        target: FrameTarget<'_, PresentTarget>,
    ) -> kestrel_frame::Result<()> {
        let cmd = *context;
        let device = self.ctx.gpu.device();
        let framebuffer = target
            .swapchain
            .framebuffer(target.image_index)
            .ok_or_else(|| {
                FrameError::InvalidState(format!("No framebuffer for image {}", target.image_index))
            })?;
        let extent = framebuffer.extent();

        unsafe {
            begin_command_buffer(device, cmd, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        }

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.clear_color,
            },
        }];
        let render_area = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        };
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.ctx.render_pass.handle())
            .framebuffer(framebuffer.handle())
            .render_area(render_area)
            .clear_values(&clear_values);

        #[allow(clippy::cast_precision_loss)]
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        unsafe {
            device.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(cmd, 0, &[render_area]);
        }

        let frame = FrameContext {
            command_buffer: cmd,
            image_index: target.image_index,
            slot_index: target.slot_index,
            frame_number: target.frame_number,
            extent,
            dt: self.dt,
        };
        let recorded = self.app.record(self.ctx, &frame);

        unsafe {
            device.cmd_end_render_pass(cmd);
            end_command_buffer(device, cmd)?;
        }

        recorded.map_err(|e| FrameError::Backend(format!("Recording failed: {e:#}")))
    }
}
