//! Vulkan implementation of the frame driver's backend.

use std::sync::Arc;

use ash::vk;
use kestrel_frame::{
    AcquireOutcome, Extent, FrameBackend, PresentOutcome, SlotSync, SwapchainTarget,
};

use crate::command::CommandPool;
use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::render_pass::{Framebuffer, RenderPass};
use crate::surface::SurfaceContext;
use crate::swapchain::{select_surface_format, Swapchain, SwapchainConfig};
use crate::sync::{Fence, Semaphore};

/// A swapchain plus one framebuffer per image.
pub struct PresentTarget {
    // Framebuffers reference the swapchain's image views and go first
    framebuffers: Vec<Framebuffer>,
    swapchain: Swapchain,
}

impl PresentTarget {
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Framebuffer for a swapchain image index.
    pub fn framebuffer(&self, image_index: u32) -> Option<&Framebuffer> {
        self.framebuffers.get(image_index as usize)
    }
}

impl SwapchainTarget for PresentTarget {
    type Format = vk::Format;
    type PresentMode = vk::PresentModeKHR;

    fn format(&self) -> vk::Format {
        self.swapchain.format()
    }

    fn present_mode(&self) -> vk::PresentModeKHR {
        self.swapchain.present_mode()
    }

    fn extent(&self) -> Extent {
        self.swapchain.extent()
    }

    fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    fn is_clamped(&self) -> bool {
        self.swapchain.is_clamped()
    }
}

/// Frame backend over one window surface and the graphics queue.
pub struct VulkanFrameBackend {
    swapchain_config: SwapchainConfig,
    render_pass: Arc<RenderPass>,
    command_pool: CommandPool,
    surface: SurfaceContext,
    ctx: Arc<GpuContext>,
}

impl VulkanFrameBackend {
    /// Create the backend for `surface`.
    ///
    /// The render pass is built for the format the swapchain will use, which
    /// stays fixed for the lifetime of the surface.
    pub fn new(surface: SurfaceContext, swapchain_config: SwapchainConfig) -> Result<Self> {
        let ctx = surface.context().clone();
        let caps = surface.capabilities()?;
        let format = select_surface_format(&caps.formats, swapchain_config.preferred_format)?;

        let render_pass = Arc::new(RenderPass::color(ctx.clone(), format.format)?);
        let command_pool = CommandPool::new(ctx.clone(), ctx.graphics_queue_family())?;

        Ok(Self {
            swapchain_config,
            render_pass,
            command_pool,
            surface,
            ctx,
        })
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    pub fn render_pass(&self) -> &Arc<RenderPass> {
        &self.render_pass
    }

    pub fn surface(&self) -> &SurfaceContext {
        &self.surface
    }

    pub fn swapchain_config(&self) -> &SwapchainConfig {
        &self.swapchain_config
    }
}

impl FrameBackend for VulkanFrameBackend {
    type Fence = Fence;
    type Semaphore = Semaphore;
    type CommandContext = vk::CommandBuffer;
    type Swapchain = PresentTarget;

    fn create_swapchain(&mut self, framebuffer_extent: Extent) -> kestrel_frame::Result<PresentTarget> {
        let swapchain = Swapchain::new(&self.surface, &self.swapchain_config, framebuffer_extent)?;

        let framebuffers = swapchain
            .image_views()
            .iter()
            .map(|&view| {
                Framebuffer::new(
                    self.ctx.clone(),
                    &self.render_pass,
                    view,
                    swapchain.vk_extent(),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PresentTarget {
            framebuffers,
            swapchain,
        })
    }

    fn create_slot_sync(&mut self) -> kestrel_frame::Result<SlotSync<Fence, Semaphore>> {
        Ok(SlotSync {
            in_flight: Fence::new(self.ctx.clone(), true)?,
            image_acquired: Semaphore::new(self.ctx.clone())?,
            render_finished: Semaphore::new(self.ctx.clone())?,
        })
    }

    fn create_command_context(&mut self) -> kestrel_frame::Result<vk::CommandBuffer> {
        Ok(self.command_pool.allocate_command_buffer()?)
    }

    fn reset_command_context(&mut self, context: &mut vk::CommandBuffer) -> kestrel_frame::Result<()> {
        // The driver only resets after the slot's fence has been waited on
        unsafe { self.command_pool.reset_command_buffer(*context)? };
        Ok(())
    }

    fn acquire_next_image(
        &mut self,
        swapchain: &PresentTarget,
        image_acquired: &Semaphore,
    ) -> kestrel_frame::Result<AcquireOutcome> {
        let result = unsafe {
            swapchain.swapchain.loader().acquire_next_image(
                swapchain.swapchain.handle(),
                u64::MAX,
                image_acquired.handle(),
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(GpuError::from(e).into()),
        }
    }

    fn submit(
        &mut self,
        context: &vk::CommandBuffer,
        wait: &Semaphore,
        signal: &Semaphore,
        fence: &Fence,
    ) -> kestrel_frame::Result<()> {
        let command_buffers = [*context];
        let wait_semaphores = [wait.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [signal.handle()];

        let submit_info = vk::SubmitInfo::default()
            .command_buffers(&command_buffers)
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.ctx
                .device()
                .queue_submit(self.ctx.graphics_queue(), &[submit_info], fence.handle())
                .map_err(GpuError::from)?;
        }
        Ok(())
    }

    fn present(
        &mut self,
        swapchain: &PresentTarget,
        image_index: u32,
        wait: &Semaphore,
    ) -> kestrel_frame::Result<PresentOutcome> {
        let wait_semaphores = [wait.handle()];
        let swapchains = [swapchain.swapchain.handle()];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            swapchain
                .swapchain
                .loader()
                .queue_present(self.ctx.graphics_queue(), &present_info)
        };

        match result {
            Ok(suboptimal) => Ok(PresentOutcome::Presented { suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(GpuError::from(e).into()),
        }
    }

    fn wait_idle(&mut self) -> kestrel_frame::Result<()> {
        Ok(self.ctx.wait_idle()?)
    }
}
