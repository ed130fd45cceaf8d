// Backend module - Vulkan abstraction layer
//
// Design: thin RAII wrappers (Instance, Surface, Device, Swapchain, ...) on
// top of the `Backend` trait, which is the raw API call surface. The ash
// implementation talks to the driver; tests swap in a recording fake.
//
// Handles are plain `vk::*` values. Wrappers own them and release them in
// Drop; dependency edges are Arcs so a parent cannot die first.

pub mod command;
pub mod device;
pub mod instance;
pub mod native;
pub mod physical_device;
pub mod surface;
pub mod swapchain;

#[cfg(test)]
pub mod recording;

use std::ffi::CStr;
use std::sync::Arc;

use ash::prelude::VkResult;
use ash::vk;

use crate::platform::NativeHandle;

pub use command::{CommandBuffer, CommandPool};
pub use device::{Device, Queue};
pub use instance::Instance;
pub use native::AshBackend;
pub use physical_device::PhysicalDevice;
pub use surface::Surface;
pub use swapchain::{ImageSharing, Swapchain};

/// Shared handle to the API call surface
pub type SharedBackend = Arc<dyn Backend>;

/// Instance creation parameters
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceDesc {
    pub application_name: &'static CStr,
    pub engine_name: &'static CStr,
    pub api_version: u32,
    pub extensions: Vec<&'static CStr>,
    pub layers: Vec<&'static CStr>,
}

/// Logical device creation parameters
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceDesc {
    /// Unique queue families, one queue requested from each
    pub queue_families: Vec<u32>,
    pub queue_priority: f32,
    pub extensions: Vec<&'static CStr>,
}

/// Swapchain creation parameters
#[derive(Clone, Debug)]
pub struct SwapchainDesc {
    pub surface: vk::SurfaceKHR,
    pub min_image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub sharing: ImageSharing,
}

/// The graphics API calls the bootstrap sequence and frame loop need.
///
/// Object-creating calls return the raw handle; the matching destroy call
/// takes it back. Destroy calls cannot fail.
pub trait Backend {
    // Instance / surface
    fn create_instance(&self, desc: &InstanceDesc) -> VkResult<vk::Instance>;
    fn destroy_instance(&self, instance: vk::Instance);
    fn create_surface(&self, instance: vk::Instance, window: &NativeHandle) -> VkResult<vk::SurfaceKHR>;
    fn destroy_surface(&self, instance: vk::Instance, surface: vk::SurfaceKHR);

    // Physical device queries
    fn enumerate_physical_devices(&self, instance: vk::Instance) -> VkResult<Vec<vk::PhysicalDevice>>;
    fn queue_family_properties(&self, physical_device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties>;
    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool>;
    fn surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR>;
    fn surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>>;
    fn surface_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>>;

    // Logical device / queues
    fn create_device(&self, physical_device: vk::PhysicalDevice, desc: &DeviceDesc) -> VkResult<vk::Device>;
    fn destroy_device(&self, device: vk::Device);
    fn device_wait_idle(&self, device: vk::Device) -> VkResult<()>;
    fn get_device_queue(&self, device: vk::Device, queue_family: u32, queue_index: u32) -> vk::Queue;

    // Swapchain / views
    fn create_swapchain(&self, device: vk::Device, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR>;
    fn destroy_swapchain(&self, device: vk::Device, swapchain: vk::SwapchainKHR);
    fn swapchain_images(&self, device: vk::Device, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;
    fn create_image_view(&self, device: vk::Device, image: vk::Image, format: vk::Format) -> VkResult<vk::ImageView>;
    fn destroy_image_view(&self, device: vk::Device, view: vk::ImageView);

    // Commands
    fn create_command_pool(&self, device: vk::Device, queue_family: u32) -> VkResult<vk::CommandPool>;
    fn destroy_command_pool(&self, device: vk::Device, pool: vk::CommandPool);
    fn allocate_command_buffers(
        &self,
        device: vk::Device,
        pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>>;
    /// Record `buffer` once, for simultaneous reuse, with a single clear of `image`
    fn record_clear(
        &self,
        device: vk::Device,
        buffer: vk::CommandBuffer,
        image: vk::Image,
        color: [f32; 4],
    ) -> VkResult<()>;

    // Frame
    fn acquire_next_image(&self, device: vk::Device, swapchain: vk::SwapchainKHR, timeout: u64) -> VkResult<(u32, bool)>;
    fn queue_submit(&self, device: vk::Device, queue: vk::Queue, buffer: vk::CommandBuffer) -> VkResult<()>;
    fn queue_present(
        &self,
        device: vk::Device,
        queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
    ) -> VkResult<bool>;
}
