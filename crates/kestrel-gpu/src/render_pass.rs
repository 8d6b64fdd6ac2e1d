//! Render pass and framebuffers for presenting to the swapchain.

use std::sync::Arc;

use ash::vk;

use crate::context::GpuContext;
use crate::error::Result;

/// Single-subpass render pass with one color attachment that ends in the
/// present layout.
pub struct RenderPass {
    ctx: Arc<GpuContext>,
    render_pass: vk::RenderPass,
    format: vk::Format,
}

impl RenderPass {
    /// Create a render pass that clears and stores one color attachment of
    /// `format`.
    pub fn color(ctx: Arc<GpuContext>, format: vk::Format) -> Result<Self> {
        let attachments = [vk::AttachmentDescription::default()
            .format(format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)];

        let color_refs = [vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)];

        // The layout transition must wait for the acquire semaphore, which
        // the submit waits on at the color output stage
        let dependencies = [vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { ctx.device().create_render_pass(&create_info, None)? };

        Ok(Self {
            ctx,
            render_pass,
            format,
        })
    }

    /// Get the raw render pass handle.
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Color attachment format.
    pub fn format(&self) -> vk::Format {
        self.format
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device().destroy_render_pass(self.render_pass, None);
        }
    }
}

/// Framebuffer binding one swapchain image view to a render pass.
pub struct Framebuffer {
    ctx: Arc<GpuContext>,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
}

impl Framebuffer {
    /// Create a framebuffer for `view`. The view must outlive the framebuffer.
    pub fn new(
        ctx: Arc<GpuContext>,
        render_pass: &RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<Self> {
        let attachments = [view];
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.handle())
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { ctx.device().create_framebuffer(&create_info, None)? };

        Ok(Self {
            ctx,
            framebuffer,
            extent,
        })
    }

    /// Get the raw framebuffer handle.
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device().destroy_framebuffer(self.framebuffer, None);
        }
    }
}
