//! Swapchain management.

use std::sync::Arc;

use ash::vk;
use kestrel_frame::swapchain::{choose_extent, choose_image_count, pick_preferred};
use kestrel_frame::{Extent, SwapchainTarget};

use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::surface::SurfaceContext;

/// What to ask the surface for. Anything unsupported falls back to the first
/// entry the surface reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainConfig {
    pub preferred_format: vk::SurfaceFormatKHR,
    pub preferred_present_mode: vk::PresentModeKHR,
}

impl Default for SwapchainConfig {
    fn default() -> Self {
        Self {
            preferred_format: vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            preferred_present_mode: vk::PresentModeKHR::IMMEDIATE,
        }
    }
}

impl SwapchainConfig {
    /// Set the preferred present mode.
    pub fn present_mode(mut self, mode: vk::PresentModeKHR) -> Self {
        self.preferred_present_mode = mode;
        self
    }
}

/// Swapchain wrapper. Destroys its image views and the swapchain on drop.
pub struct Swapchain {
    ctx: Arc<GpuContext>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: Extent,
    clamped: bool,
}

impl Swapchain {
    /// Create a swapchain from the surface's current capabilities.
    ///
    /// `framebuffer_extent` is used only when the surface leaves the extent
    /// undefined; if it is empty as well the window is not mapped yet and
    /// creation fails with
    /// [`kestrel_frame::FrameError::UndefinedExtent`]. Any previous
    /// swapchain for the surface must already be destroyed.
    pub fn new(
        surface: &SurfaceContext,
        config: &SwapchainConfig,
        framebuffer_extent: Extent,
    ) -> Result<Self> {
        let ctx = surface.context().clone();
        let caps = surface.capabilities()?;

        let surface_format = select_surface_format(&caps.formats, config.preferred_format)?;
        let present_mode =
            select_present_mode(&caps.present_modes, config.preferred_present_mode)?;
        let extent = surface_extent(&caps.capabilities, framebuffer_extent)?;
        let clamped = to_extent(caps.capabilities.current_extent).is_undefined();
        let image_count = choose_image_count(
            caps.capabilities.min_image_count,
            caps.capabilities.max_image_count,
        );

        let queue_families = [ctx.graphics_queue_family()];
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(vk::Extent2D {
                width: extent.width,
                height: extent.height,
            })
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .queue_family_indices(&queue_families)
            .pre_transform(caps.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let loader = surface.swapchain_loader().clone();
        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;

        let mut this = Self {
            ctx,
            loader,
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            surface_format,
            present_mode,
            extent,
            clamped,
        };

        // Anything created so far is released by Drop if a later step fails
        this.images = unsafe { this.loader.get_swapchain_images(this.swapchain)? };
        for &image in &this.images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(surface_format.format)
                .components(vk::ComponentMapping::default())
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );

            let view = unsafe { this.ctx.device().create_image_view(&view_info, None)? };
            this.image_views.push(view);
        }

        tracing::debug!(
            "Created swapchain {} with {} images ({:?}, {:?})",
            extent,
            this.images.len(),
            surface_format.format,
            present_mode
        );

        Ok(this)
    }

    /// Get the raw swapchain handle.
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Swapchain extension loader.
    pub fn loader(&self) -> &ash::khr::swapchain::Device {
        &self.loader
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    /// Extent as a Vulkan struct.
    pub fn vk_extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.extent.width,
            height: self.extent.height,
        }
    }
}

impl SwapchainTarget for Swapchain {
    type Format = vk::Format;
    type PresentMode = vk::PresentModeKHR;

    fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    fn extent(&self) -> Extent {
        self.extent
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn is_clamped(&self) -> bool {
        self.clamped
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.ctx.device().destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// Select the preferred surface format, or the first one the surface offers.
pub fn select_surface_format(
    available: &[vk::SurfaceFormatKHR],
    preferred: vk::SurfaceFormatKHR,
) -> Result<vk::SurfaceFormatKHR> {
    pick_preferred(available, |format| {
        format.format == preferred.format && format.color_space == preferred.color_space
    })
    .ok_or_else(|| GpuError::SwapchainCreation("Surface reports no formats".to_string()))
}

/// Select the preferred present mode, or the first one the surface offers.
pub fn select_present_mode(
    available: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> Result<vk::PresentModeKHR> {
    pick_preferred(available, |mode| *mode == preferred)
        .ok_or_else(|| GpuError::SwapchainCreation("Surface reports no present modes".to_string()))
}

/// Extent to build the swapchain at. An empty framebuffer is no fallback.
fn surface_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer_extent: Extent,
) -> Result<Extent> {
    let fallback = (!framebuffer_extent.is_empty()).then_some(framebuffer_extent);
    let extent = choose_extent(
        to_extent(capabilities.current_extent),
        to_extent(capabilities.min_image_extent),
        to_extent(capabilities.max_image_extent),
        fallback,
    )?;
    Ok(extent)
}

const fn to_extent(extent: vk::Extent2D) -> Extent {
    Extent::new(extent.width, extent.height)
}

#[cfg(test)]
mod tests {
    use kestrel_frame::FrameError;

    use super::*;

    fn format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn srgb_format_preferred() {
        let available = [
            format(vk::Format::B8G8R8A8_UNORM),
            format(vk::Format::B8G8R8A8_SRGB),
        ];
        let picked =
            select_surface_format(&available, SwapchainConfig::default().preferred_format)
                .unwrap();
        assert_eq!(picked.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn format_falls_back_to_first() {
        let available = [
            format(vk::Format::R8G8B8A8_UNORM),
            format(vk::Format::B8G8R8A8_UNORM),
        ];
        let picked =
            select_surface_format(&available, SwapchainConfig::default().preferred_format)
                .unwrap();
        assert_eq!(picked.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn present_mode_falls_back_to_first() {
        let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            select_present_mode(&available, vk::PresentModeKHR::IMMEDIATE).unwrap(),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            select_present_mode(&available, vk::PresentModeKHR::MAILBOX).unwrap(),
            vk::PresentModeKHR::MAILBOX
        );
    }

    fn capabilities(current: vk::Extent2D) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: current,
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 2048,
                height: 2048,
            },
            ..Default::default()
        }
    }

    const UNDEFINED: vk::Extent2D = vk::Extent2D {
        width: u32::MAX,
        height: u32::MAX,
    };

    #[test]
    fn unmapped_window_with_undefined_surface_fails() {
        let result = surface_extent(&capabilities(UNDEFINED), Extent::new(0, 0));
        let err = result.unwrap_err();
        assert!(matches!(err, GpuError::Frame(FrameError::UndefinedExtent)));
        assert!(matches!(
            FrameError::from(err),
            FrameError::UndefinedExtent
        ));
    }

    #[test]
    fn undefined_surface_uses_window_size() {
        let extent = surface_extent(&capabilities(UNDEFINED), Extent::new(4000, 600)).unwrap();
        assert_eq!(extent, Extent::new(2048, 600));
    }

    #[test]
    fn defined_surface_ignores_window_size() {
        let current = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let extent = surface_extent(&capabilities(current), Extent::new(0, 0)).unwrap();
        assert_eq!(extent, Extent::new(800, 600));
    }

    #[test]
    fn empty_surface_lists_are_errors() {
        assert!(select_surface_format(&[], SwapchainConfig::default().preferred_format).is_err());
        assert!(select_present_mode(&[], vk::PresentModeKHR::FIFO).is_err());
    }
}
