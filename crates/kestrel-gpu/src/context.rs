//! Vulkan instance, device and queue ownership.

use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;
use raw_window_handle::RawDisplayHandle;

use crate::capabilities::GpuCapabilities;
use crate::debug::DebugMessenger;
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, find_graphics_queue_family, select_physical_device};
use crate::memory::GpuAllocator;

/// Instance, device and the single graphics queue every frame is submitted to.
///
/// Shared through `Arc`; objects created from the device keep a clone so the
/// device is destroyed last.
pub struct GpuContext {
    // Entry must be kept alive for the lifetime of the instance
    entry: ash::Entry,
    instance: ash::Instance,
    debug_messenger: Option<DebugMessenger>,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    capabilities: GpuCapabilities,
    allocator: Mutex<GpuAllocator>,
    graphics_queue_family: u32,
    graphics_queue: vk::Queue,
}

impl GpuContext {
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    /// Get the graphics queue. Presentation goes through the same queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn graphics_queue_family(&self) -> u32 {
        self.graphics_queue_family
    }

    /// True if the validation layer and debug messenger are active.
    pub fn validation_enabled(&self) -> bool {
        self.debug_messenger.is_some()
    }

    pub fn allocator(&self) -> &Mutex<GpuAllocator> {
        &self.allocator
    }

    /// Block until every queue on the device is idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            // Frees every VkDeviceMemory, so it has to happen before the device goes
            self.allocator.lock().shutdown();

            self.device.destroy_device(None);
            if let Some(messenger) = self.debug_messenger.take() {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
        tracing::debug!("GPU context destroyed");
    }
}

/// Configures and creates a [`GpuContext`].
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
    display: Option<RawDisplayHandle>,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Kestrel".to_string(),
            enable_validation: cfg!(debug_assertions),
            display: None,
        }
    }
}

impl GpuContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Display the context will present to. Decides which surface
    /// extensions the instance enables.
    pub fn display(mut self, display: RawDisplayHandle) -> Self {
        self.display = Some(display);
        self
    }

    /// Load Vulkan, pick a device and create the context.
    pub fn build(self) -> Result<Arc<GpuContext>> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::Other(format!("Failed to load Vulkan: {e}")))?;

        let (instance, validation_active) = unsafe {
            create_instance(
                &entry,
                &self.app_name,
                self.enable_validation,
                self.display,
            )
        }?;

        let debug_messenger = if validation_active {
            Some(unsafe { DebugMessenger::new(&entry, &instance) }?)
        } else {
            None
        };

        let physical_device = unsafe { select_physical_device(&instance) }?;
        let capabilities = unsafe { GpuCapabilities::query(&instance, physical_device) };
        tracing::info!("Selected GPU: {}", capabilities.summary());

        let graphics_queue_family = unsafe { find_graphics_queue_family(&instance, physical_device) }
            .ok_or(GpuError::NoSuitableDevice)?;

        let (device, graphics_queue) =
            unsafe { create_device(&instance, physical_device, graphics_queue_family) }?;

        let allocator = unsafe { GpuAllocator::new(&instance, device.clone(), physical_device) }?;

        tracing::info!(
            "GPU context ready (graphics queue family {}, validation {})",
            graphics_queue_family,
            if validation_active { "on" } else { "off" }
        );

        Ok(Arc::new(GpuContext {
            entry,
            instance,
            debug_messenger,
            physical_device,
            device,
            capabilities,
            allocator: Mutex::new(allocator),
            graphics_queue_family,
            graphics_queue,
        }))
    }
}

/// Create the logical device with one graphics queue and the swapchain
/// extension.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    graphics_queue_family: u32,
) -> Result<(ash::Device, vk::Queue)> {
    let queue_priority = 1.0_f32;
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(graphics_queue_family)
        .queue_priorities(std::slice::from_ref(&queue_priority))];

    let extension_names = [
        ash::khr::swapchain::NAME.as_ptr(),
        #[cfg(target_os = "macos")]
        ash::khr::portability_subset::NAME.as_ptr(),
    ];

    let features = vk::PhysicalDeviceFeatures::default();

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    let device = unsafe { instance.create_device(physical_device, &device_create_info, None) }
        .map_err(GpuError::from)?;

    let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };

    Ok((device, graphics_queue))
}
