// Native backend - Vulkan through ash
//
// Responsibilities:
// - Load the Vulkan library
// - Keep the instance/device function tables alive between calls
// - Translate the Backend calls into raw Vulkan calls
//
// Only one instance and one device exist at a time. Every call checks the
// handle it was given against the loaded table.

use std::ffi::c_char;
use std::ptr;

use ash::extensions::khr;
use ash::prelude::VkResult;
use ash::{vk, Entry};
use parking_lot::RwLock;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use super::{Backend, DeviceDesc, ImageSharing, InstanceDesc, SwapchainDesc};
use crate::error::Result;
use crate::platform::{HandleRepr, NativeHandle};

/// Vulkan backend with lazily populated function tables
pub struct AshBackend {
    swapchain_loader: RwLock<Option<khr::Swapchain>>,
    device: RwLock<Option<ash::Device>>,
    surface_loader: RwLock<Option<khr::Surface>>,
    instance: RwLock<Option<ash::Instance>>,
    entry: Entry,
}

impl AshBackend {
    /// Load the Vulkan library
    pub fn load() -> Result<Self> {
        let entry = unsafe { Entry::load()? };
        log::info!("Vulkan library loaded");

        Ok(Self::from_entry(entry))
    }

    /// Backend over an already loaded entry, with no instance or device yet
    fn from_entry(entry: Entry) -> Self {
        Self {
            swapchain_loader: RwLock::new(None),
            device: RwLock::new(None),
            surface_loader: RwLock::new(None),
            instance: RwLock::new(None),
            entry,
        }
    }

    fn with_instance<T>(
        &self,
        handle: vk::Instance,
        f: impl FnOnce(&ash::Instance) -> VkResult<T>,
    ) -> VkResult<T> {
        match self.instance.read().as_ref() {
            Some(instance) if instance.handle() == handle => f(instance),
            _ => Err(vk::Result::ERROR_INITIALIZATION_FAILED),
        }
    }

    /// Physical-device queries carry no instance handle; use the loaded one
    fn with_loaded_instance<T>(&self, f: impl FnOnce(&ash::Instance) -> VkResult<T>) -> VkResult<T> {
        match self.instance.read().as_ref() {
            Some(instance) => f(instance),
            None => Err(vk::Result::ERROR_INITIALIZATION_FAILED),
        }
    }

    fn with_surface_loader<T>(&self, f: impl FnOnce(&khr::Surface) -> VkResult<T>) -> VkResult<T> {
        match self.surface_loader.read().as_ref() {
            Some(loader) => f(loader),
            None => Err(vk::Result::ERROR_INITIALIZATION_FAILED),
        }
    }

    fn with_device<T>(&self, handle: vk::Device, f: impl FnOnce(&ash::Device) -> VkResult<T>) -> VkResult<T> {
        match self.device.read().as_ref() {
            Some(device) if device.handle() == handle => f(device),
            _ => Err(vk::Result::ERROR_DEVICE_LOST),
        }
    }

    fn with_swapchain_loader<T>(
        &self,
        handle: vk::Device,
        f: impl FnOnce(&khr::Swapchain) -> VkResult<T>,
    ) -> VkResult<T> {
        let device = self.device.read();
        let loader = self.swapchain_loader.read();
        match (device.as_ref(), loader.as_ref()) {
            (Some(device), Some(loader)) if device.handle() == handle => f(loader),
            _ => Err(vk::Result::ERROR_DEVICE_LOST),
        }
    }
}

impl Backend for AshBackend {
    // =========================================================================
    // INSTANCE / SURFACE
    // =========================================================================

    fn create_instance(&self, desc: &InstanceDesc) -> VkResult<vk::Instance> {
        let app_info = vk::ApplicationInfo::builder()
            .application_name(desc.application_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(desc.engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(desc.api_version);

        let extensions: Vec<*const c_char> = desc.extensions.iter().map(|name| name.as_ptr()).collect();
        let layers: Vec<*const c_char> = desc.layers.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { self.entry.create_instance(&create_info, None)? };
        let handle = instance.handle();

        *self.surface_loader.write() = Some(khr::Surface::new(&self.entry, &instance));
        *self.instance.write() = Some(instance);

        Ok(handle)
    }

    fn destroy_instance(&self, instance: vk::Instance) {
        let mut guard = self.instance.write();
        match guard.take() {
            Some(loaded) if loaded.handle() == instance => {
                *self.surface_loader.write() = None;
                unsafe { loaded.destroy_instance(None) };
            }
            other => {
                log::warn!("destroy_instance called with an unknown handle");
                *guard = other;
            }
        }
    }

    fn create_surface(&self, instance: vk::Instance, window: &NativeHandle) -> VkResult<vk::SurfaceKHR> {
        self.with_instance(instance, |instance| match window.repr() {
            HandleRepr::Raw { display, window } => unsafe {
                create_platform_surface(&self.entry, instance, *display, *window)
            },
            HandleRepr::Synthetic(id) => {
                log::error!("Window {} has no OS counterpart to build a surface from", id);
                Err(vk::Result::ERROR_EXTENSION_NOT_PRESENT)
            }
        })
    }

    fn destroy_surface(&self, _instance: vk::Instance, surface: vk::SurfaceKHR) {
        let result = self.with_surface_loader(|loader| {
            unsafe { loader.destroy_surface(surface, None) };
            Ok(())
        });
        if result.is_err() {
            log::warn!("destroy_surface called after the instance was released");
        }
    }

    // =========================================================================
    // PHYSICAL DEVICE QUERIES
    // =========================================================================

    fn enumerate_physical_devices(&self, instance: vk::Instance) -> VkResult<Vec<vk::PhysicalDevice>> {
        self.with_instance(instance, |instance| unsafe { instance.enumerate_physical_devices() })
    }

    fn queue_family_properties(&self, physical_device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        self.with_loaded_instance(|instance| unsafe {
            Ok(instance.get_physical_device_queue_family_properties(physical_device))
        })
        .unwrap_or_else(|e| {
            log::error!("Queue family query without a loaded instance ({}); reporting no families", e);
            Vec::new()
        })
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        self.with_surface_loader(|loader| unsafe {
            loader.get_physical_device_surface_support(physical_device, queue_family, surface)
        })
    }

    fn surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        self.with_surface_loader(|loader| unsafe {
            loader.get_physical_device_surface_capabilities(physical_device, surface)
        })
    }

    fn surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        self.with_surface_loader(|loader| unsafe {
            loader.get_physical_device_surface_formats(physical_device, surface)
        })
    }

    fn surface_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        self.with_surface_loader(|loader| unsafe {
            loader.get_physical_device_surface_present_modes(physical_device, surface)
        })
    }

    // =========================================================================
    // LOGICAL DEVICE / QUEUES
    // =========================================================================

    fn create_device(&self, physical_device: vk::PhysicalDevice, desc: &DeviceDesc) -> VkResult<vk::Device> {
        let device = self.with_loaded_instance(|instance| {
            let queue_priorities = [desc.queue_priority];
            let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = desc
                .queue_families
                .iter()
                .map(|&family| {
                    vk::DeviceQueueCreateInfo::builder()
                        .queue_family_index(family)
                        .queue_priorities(&queue_priorities)
                        .build()
                })
                .collect();

            let extensions: Vec<*const c_char> = desc.extensions.iter().map(|name| name.as_ptr()).collect();
            let features = vk::PhysicalDeviceFeatures::default();

            let create_info = vk::DeviceCreateInfo::builder()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&extensions)
                .enabled_features(&features);

            let device = unsafe { instance.create_device(physical_device, &create_info, None)? };
            *self.swapchain_loader.write() = Some(khr::Swapchain::new(instance, &device));
            Ok(device)
        })?;

        let handle = device.handle();
        *self.device.write() = Some(device);
        Ok(handle)
    }

    fn destroy_device(&self, device: vk::Device) {
        let mut guard = self.device.write();
        match guard.take() {
            Some(loaded) if loaded.handle() == device => {
                *self.swapchain_loader.write() = None;
                unsafe { loaded.destroy_device(None) };
            }
            other => {
                log::warn!("destroy_device called with an unknown handle");
                *guard = other;
            }
        }
    }

    fn device_wait_idle(&self, device: vk::Device) -> VkResult<()> {
        self.with_device(device, |device| unsafe { device.device_wait_idle() })
    }

    fn get_device_queue(&self, device: vk::Device, queue_family: u32, queue_index: u32) -> vk::Queue {
        self.with_device(device, |device| unsafe { Ok(device.get_device_queue(queue_family, queue_index)) })
            .unwrap_or_else(|e| {
                log::error!("get_device_queue on an unknown device ({}); returning a null queue", e);
                vk::Queue::null()
            })
    }

    // =========================================================================
    // SWAPCHAIN / VIEWS
    // =========================================================================

    fn create_swapchain(&self, device: vk::Device, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(desc.surface)
            .min_image_count(desc.min_image_count)
            .image_format(desc.format.format)
            .image_color_space(desc.format.color_space)
            .image_extent(desc.extent)
            .image_array_layers(1)
            // TRANSFER_DST: the pre-recorded clear writes straight into the image
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(desc.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(desc.present_mode)
            .clipped(true);

        let create_info = match desc.sharing {
            ImageSharing::Exclusive => create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE),
            ImageSharing::Concurrent(_) => create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(desc.sharing.family_indices()),
        };

        self.with_swapchain_loader(device, |loader| unsafe { loader.create_swapchain(&create_info, None) })
    }

    fn destroy_swapchain(&self, device: vk::Device, swapchain: vk::SwapchainKHR) {
        let result = self.with_swapchain_loader(device, |loader| {
            unsafe { loader.destroy_swapchain(swapchain, None) };
            Ok(())
        });
        if result.is_err() {
            log::warn!("destroy_swapchain called after the device was released");
        }
    }

    fn swapchain_images(&self, device: vk::Device, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        self.with_swapchain_loader(device, |loader| unsafe { loader.get_swapchain_images(swapchain) })
    }

    fn create_image_view(&self, device: vk::Device, image: vk::Image, format: vk::Format) -> VkResult<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(COLOR_RANGE);

        self.with_device(device, |device| unsafe { device.create_image_view(&create_info, None) })
    }

    fn destroy_image_view(&self, device: vk::Device, view: vk::ImageView) {
        let result = self.with_device(device, |device| {
            unsafe { device.destroy_image_view(view, None) };
            Ok(())
        });
        if result.is_err() {
            log::warn!("destroy_image_view called after the device was released");
        }
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    fn create_command_pool(&self, device: vk::Device, queue_family: u32) -> VkResult<vk::CommandPool> {
        let create_info = vk::CommandPoolCreateInfo::builder().queue_family_index(queue_family);
        self.with_device(device, |device| unsafe { device.create_command_pool(&create_info, None) })
    }

    fn destroy_command_pool(&self, device: vk::Device, pool: vk::CommandPool) {
        let result = self.with_device(device, |device| {
            unsafe { device.destroy_command_pool(pool, None) };
            Ok(())
        });
        if result.is_err() {
            log::warn!("destroy_command_pool called after the device was released");
        }
    }

    fn allocate_command_buffers(
        &self,
        device: vk::Device,
        pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        self.with_device(device, |device| unsafe { device.allocate_command_buffers(&allocate_info) })
    }

    fn record_clear(
        &self,
        device: vk::Device,
        buffer: vk::CommandBuffer,
        image: vk::Image,
        color: [f32; 4],
    ) -> VkResult<()> {
        let clear_color = vk::ClearColorValue { float32: color };

        self.with_device(device, |device| unsafe {
            let begin_info =
                vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE);
            device.begin_command_buffer(buffer, &begin_info)?;

            // UNDEFINED -> TRANSFER_DST so the clear can write the image
            let barrier_to_transfer = vk::ImageMemoryBarrier::builder()
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(COLOR_RANGE)
                .build();

            device.cmd_pipeline_barrier(
                buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier_to_transfer],
            );

            device.cmd_clear_color_image(
                buffer,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &clear_color,
                &[COLOR_RANGE],
            );

            // TRANSFER_DST -> PRESENT_SRC for the present engine
            let barrier_to_present = vk::ImageMemoryBarrier::builder()
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::empty())
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(COLOR_RANGE)
                .build();

            device.cmd_pipeline_barrier(
                buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier_to_present],
            );

            device.end_command_buffer(buffer)
        })
    }

    // =========================================================================
    // FRAME
    // =========================================================================

    fn acquire_next_image(&self, device: vk::Device, swapchain: vk::SwapchainKHR, timeout: u64) -> VkResult<(u32, bool)> {
        // No semaphore, no fence: the acquire is not ordered against the GPU
        self.with_swapchain_loader(device, |loader| unsafe {
            loader.acquire_next_image(swapchain, timeout, vk::Semaphore::null(), vk::Fence::null())
        })
    }

    fn queue_submit(&self, device: vk::Device, queue: vk::Queue, buffer: vk::CommandBuffer) -> VkResult<()> {
        let command_buffers = [buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

        self.with_device(device, |device| unsafe {
            device.queue_submit(queue, &[submit_info.build()], vk::Fence::null())
        })
    }

    fn queue_present(
        &self,
        device: vk::Device,
        queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
    ) -> VkResult<bool> {
        let swapchains = [swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        self.with_swapchain_loader(device, |loader| unsafe { loader.queue_present(queue, &present_info) })
    }
}

/// Whole color image: one mip, one layer
const COLOR_RANGE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

/// Platform-specific surface creation
unsafe fn create_platform_surface(
    entry: &Entry,
    instance: &ash::Instance,
    display: RawDisplayHandle,
    window: RawWindowHandle,
) -> VkResult<vk::SurfaceKHR> {
    match (display, window) {
        (RawDisplayHandle::Windows(_), RawWindowHandle::Win32(handle)) => {
            let hinstance = handle.hinstance.map_or(0, |h| h.get()) as vk::HINSTANCE;
            let hwnd = handle.hwnd.get() as vk::HWND;
            let create_info = vk::Win32SurfaceCreateInfoKHR::builder()
                .hinstance(hinstance)
                .hwnd(hwnd);
            khr::Win32Surface::new(entry, instance).create_win32_surface(&create_info, None)
        }
        (RawDisplayHandle::Xlib(display), RawWindowHandle::Xlib(handle)) => {
            let dpy = display.display.map_or(ptr::null_mut(), |d| d.as_ptr());
            let create_info = vk::XlibSurfaceCreateInfoKHR::builder()
                .dpy(dpy.cast())
                .window(handle.window);
            khr::XlibSurface::new(entry, instance).create_xlib_surface(&create_info, None)
        }
        (RawDisplayHandle::Xcb(display), RawWindowHandle::Xcb(handle)) => {
            let connection = display.connection.map_or(ptr::null_mut(), |c| c.as_ptr());
            let create_info = vk::XcbSurfaceCreateInfoKHR::builder()
                .connection(connection.cast())
                .window(handle.window.get());
            khr::XcbSurface::new(entry, instance).create_xcb_surface(&create_info, None)
        }
        (RawDisplayHandle::Wayland(display), RawWindowHandle::Wayland(handle)) => {
            let create_info = vk::WaylandSurfaceCreateInfoKHR::builder()
                .display(display.display.as_ptr().cast())
                .surface(handle.surface.as_ptr().cast());
            khr::WaylandSurface::new(entry, instance).create_wayland_surface(&create_info, None)
        }
        _ => Err(vk::Result::ERROR_EXTENSION_NOT_PRESENT),
    }
}
