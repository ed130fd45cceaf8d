// Recording backend - in-memory stand-in for the driver
//
// Hands out unique fake handles, answers device queries from a scripted list
// of GPUs and logs every call so tests can assert on order and arguments.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use parking_lot::Mutex;

use super::{Backend, DeviceDesc, InstanceDesc, SwapchainDesc};
use crate::platform::NativeHandle;

const PHYSICAL_DEVICE_BASE: u64 = 0x1000;
const QUEUE_BASE: u64 = 0x2000;

/// An object the backend created and expects to see destroyed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Object {
    Instance(u64),
    Surface(u64),
    Device(u64),
    Swapchain(u64),
    ImageView(u64),
    CommandPool(u64),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Created(Object),
    Destroyed(Object),
    EnumeratePhysicalDevices,
    SurfaceSupport(u32),
    SurfaceCapabilities,
    SurfaceFormats,
    SurfacePresentModes,
    GetQueue(u32),
    WaitIdle,
    SwapchainImages,
    AllocateCommandBuffers(u32),
    RecordClear { buffer: u64, image: u64 },
    Acquire(u32),
    Submit { queue: u64, buffer: u64 },
    Present { queue: u64, image_index: u32 },
}

#[derive(Clone, Copy, Debug)]
pub struct FakeFamily {
    pub flags: vk::QueueFlags,
    pub present: bool,
}

/// Scripted answers for one physical device
#[derive(Clone, Debug)]
pub struct FakeGpu {
    pub families: Vec<FakeFamily>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    /// Images the swapchain hands back; defaults to the requested count
    pub swapchain_image_count: Option<u32>,
}

impl FakeGpu {
    /// One family doing graphics and present
    pub fn single_family() -> Self {
        Self {
            families: vec![FakeFamily {
                flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
                present: true,
            }],
            capabilities: capabilities(1, 0),
            formats: vec![surface_format(vk::Format::B8G8R8A8_UNORM)],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            swapchain_image_count: None,
        }
    }

    /// Graphics on family 0, present on family 1
    pub fn split_families() -> Self {
        Self {
            families: vec![
                FakeFamily {
                    flags: vk::QueueFlags::GRAPHICS,
                    present: false,
                },
                FakeFamily {
                    flags: vk::QueueFlags::TRANSFER,
                    present: true,
                },
            ],
            capabilities: capabilities(2, 8),
            formats: vec![
                surface_format(vk::Format::R8G8B8A8_UNORM),
                surface_format(vk::Format::B8G8R8A8_SRGB),
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO],
            swapchain_image_count: None,
        }
    }
}

fn capabilities(min_image_count: u32, max_image_count: u32) -> vk::SurfaceCapabilitiesKHR {
    vk::SurfaceCapabilitiesKHR {
        min_image_count,
        max_image_count,
        current_extent: vk::Extent2D { width: 800, height: 600 },
        current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
        supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
        supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
        ..Default::default()
    }
}

fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
    vk::SurfaceFormatKHR {
        format,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    }
}

#[derive(Default)]
struct Rejections {
    instance: bool,
    surface: bool,
    device: bool,
    swapchain: bool,
    command_pool: bool,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    reject: Rejections,
    failing_acquires: u32,
    suboptimal_presents: bool,
    instance_desc: Option<InstanceDesc>,
    device_desc: Option<DeviceDesc>,
    swapchain_desc: Option<SwapchainDesc>,
    surface_window: Option<NativeHandle>,
    clear_color: Option<[f32; 4]>,
    active_gpu: usize,
    swapchain_images: Vec<vk::Image>,
    next_image: usize,
}

pub struct RecordingBackend {
    gpus: Vec<FakeGpu>,
    next_handle: AtomicU64,
    state: Mutex<State>,
}

impl RecordingBackend {
    pub fn new(gpus: Vec<FakeGpu>) -> Arc<Self> {
        Arc::new(Self {
            gpus,
            next_handle: AtomicU64::new(1),
            state: Mutex::new(State::default()),
        })
    }

    pub fn reject_instance(self: Arc<Self>) -> Arc<Self> {
        self.state.lock().reject.instance = true;
        self
    }

    pub fn reject_surface(self: Arc<Self>) -> Arc<Self> {
        self.state.lock().reject.surface = true;
        self
    }

    pub fn reject_device(self: Arc<Self>) -> Arc<Self> {
        self.state.lock().reject.device = true;
        self
    }

    pub fn reject_swapchain(self: Arc<Self>) -> Arc<Self> {
        self.state.lock().reject.swapchain = true;
        self
    }

    pub fn reject_command_pool(self: Arc<Self>) -> Arc<Self> {
        self.state.lock().reject.command_pool = true;
        self
    }

    /// Make the next `count` acquires fail with OUT_OF_DATE
    pub fn fail_acquires(self: Arc<Self>, count: u32) -> Arc<Self> {
        self.state.lock().failing_acquires = count;
        self
    }

    /// Report every present as suboptimal
    pub fn suboptimal_presents(self: Arc<Self>) -> Arc<Self> {
        self.state.lock().suboptimal_presents = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Objects created, in creation order
    pub fn created(&self) -> Vec<Object> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Created(object) => Some(*object),
                _ => None,
            })
            .collect()
    }

    /// Objects destroyed, in destruction order
    pub fn destroyed(&self) -> Vec<Object> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Destroyed(object) => Some(*object),
                _ => None,
            })
            .collect()
    }

    pub fn destroyed_device(&self) -> bool {
        self.destroyed()
            .iter()
            .any(|object| matches!(object, Object::Device(_)))
    }

    pub fn instance_desc(&self) -> Option<InstanceDesc> {
        self.state.lock().instance_desc.clone()
    }

    pub fn device_desc(&self) -> Option<DeviceDesc> {
        self.state.lock().device_desc.clone()
    }

    pub fn swapchain_desc(&self) -> Option<SwapchainDesc> {
        self.state.lock().swapchain_desc.clone()
    }

    pub fn surface_window(&self) -> Option<NativeHandle> {
        self.state.lock().surface_window
    }

    /// Color the last buffer was recorded with
    pub fn clear_color(&self) -> Option<[f32; 4]> {
        self.state.lock().clear_color
    }

    fn next_raw(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }

    fn gpu(&self, physical_device: vk::PhysicalDevice) -> &FakeGpu {
        let index = (physical_device.as_raw() - PHYSICAL_DEVICE_BASE) as usize;
        &self.gpus[index]
    }

    fn create<T: Handle>(&self, rejected: bool, wrap: fn(u64) -> Object) -> VkResult<T> {
        if rejected {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        let raw = self.next_raw();
        self.record(Call::Created(wrap(raw)));
        Ok(T::from_raw(raw))
    }
}

impl Backend for RecordingBackend {
    fn create_instance(&self, desc: &InstanceDesc) -> VkResult<vk::Instance> {
        if self.state.lock().reject.instance {
            return Err(vk::Result::ERROR_EXTENSION_NOT_PRESENT);
        }
        self.state.lock().instance_desc = Some(desc.clone());
        self.create(false, Object::Instance)
    }

    fn destroy_instance(&self, instance: vk::Instance) {
        self.record(Call::Destroyed(Object::Instance(instance.as_raw())));
    }

    fn create_surface(&self, _instance: vk::Instance, window: &NativeHandle) -> VkResult<vk::SurfaceKHR> {
        let rejected = self.state.lock().reject.surface;
        let surface = self.create(rejected, Object::Surface)?;
        self.state.lock().surface_window = Some(*window);
        Ok(surface)
    }

    fn destroy_surface(&self, _instance: vk::Instance, surface: vk::SurfaceKHR) {
        self.record(Call::Destroyed(Object::Surface(surface.as_raw())));
    }

    fn enumerate_physical_devices(&self, _instance: vk::Instance) -> VkResult<Vec<vk::PhysicalDevice>> {
        self.record(Call::EnumeratePhysicalDevices);
        Ok((0..self.gpus.len() as u64)
            .map(|index| vk::PhysicalDevice::from_raw(PHYSICAL_DEVICE_BASE + index))
            .collect())
    }

    fn queue_family_properties(&self, physical_device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        self.gpu(physical_device)
            .families
            .iter()
            .map(|family| vk::QueueFamilyProperties {
                queue_flags: family.flags,
                queue_count: 1,
                ..Default::default()
            })
            .collect()
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        self.record(Call::SurfaceSupport(queue_family));
        Ok(self.gpu(physical_device).families[queue_family as usize].present)
    }

    fn surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        self.record(Call::SurfaceCapabilities);
        Ok(self.gpu(physical_device).capabilities)
    }

    fn surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        self.record(Call::SurfaceFormats);
        Ok(self.gpu(physical_device).formats.clone())
    }

    fn surface_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        self.record(Call::SurfacePresentModes);
        Ok(self.gpu(physical_device).present_modes.clone())
    }

    fn create_device(&self, physical_device: vk::PhysicalDevice, desc: &DeviceDesc) -> VkResult<vk::Device> {
        let rejected = self.state.lock().reject.device;
        let device = self.create(rejected, Object::Device)?;
        let mut state = self.state.lock();
        state.device_desc = Some(desc.clone());
        state.active_gpu = (physical_device.as_raw() - PHYSICAL_DEVICE_BASE) as usize;
        Ok(device)
    }

    fn destroy_device(&self, device: vk::Device) {
        self.record(Call::Destroyed(Object::Device(device.as_raw())));
    }

    fn device_wait_idle(&self, _device: vk::Device) -> VkResult<()> {
        self.record(Call::WaitIdle);
        Ok(())
    }

    fn get_device_queue(&self, _device: vk::Device, queue_family: u32, _queue_index: u32) -> vk::Queue {
        self.record(Call::GetQueue(queue_family));
        vk::Queue::from_raw(QUEUE_BASE + queue_family as u64)
    }

    fn create_swapchain(&self, _device: vk::Device, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        let rejected = self.state.lock().reject.swapchain;
        let swapchain = self.create(rejected, Object::Swapchain)?;

        let count = {
            let state = self.state.lock();
            self.gpus
                .get(state.active_gpu)
                .and_then(|gpu| gpu.swapchain_image_count)
                .unwrap_or(desc.min_image_count)
        };
        let images = (0..count)
            .map(|_| vk::Image::from_raw(self.next_raw()))
            .collect();

        let mut state = self.state.lock();
        state.swapchain_desc = Some(desc.clone());
        state.swapchain_images = images;
        state.next_image = 0;
        Ok(swapchain)
    }

    fn destroy_swapchain(&self, _device: vk::Device, swapchain: vk::SwapchainKHR) {
        self.record(Call::Destroyed(Object::Swapchain(swapchain.as_raw())));
    }

    fn swapchain_images(&self, _device: vk::Device, _swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        self.record(Call::SwapchainImages);
        Ok(self.state.lock().swapchain_images.clone())
    }

    fn create_image_view(&self, _device: vk::Device, _image: vk::Image, _format: vk::Format) -> VkResult<vk::ImageView> {
        self.create(false, Object::ImageView)
    }

    fn destroy_image_view(&self, _device: vk::Device, view: vk::ImageView) {
        self.record(Call::Destroyed(Object::ImageView(view.as_raw())));
    }

    fn create_command_pool(&self, _device: vk::Device, _queue_family: u32) -> VkResult<vk::CommandPool> {
        let rejected = self.state.lock().reject.command_pool;
        self.create(rejected, Object::CommandPool)
    }

    fn destroy_command_pool(&self, _device: vk::Device, pool: vk::CommandPool) {
        self.record(Call::Destroyed(Object::CommandPool(pool.as_raw())));
    }

    fn allocate_command_buffers(
        &self,
        _device: vk::Device,
        _pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        self.record(Call::AllocateCommandBuffers(count));
        Ok((0..count)
            .map(|_| vk::CommandBuffer::from_raw(self.next_raw()))
            .collect())
    }

    fn record_clear(
        &self,
        _device: vk::Device,
        buffer: vk::CommandBuffer,
        image: vk::Image,
        color: [f32; 4],
    ) -> VkResult<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::RecordClear {
            buffer: buffer.as_raw(),
            image: image.as_raw(),
        });
        state.clear_color = Some(color);
        Ok(())
    }

    fn acquire_next_image(&self, _device: vk::Device, _swapchain: vk::SwapchainKHR, _timeout: u64) -> VkResult<(u32, bool)> {
        let mut state = self.state.lock();
        if state.failing_acquires > 0 {
            state.failing_acquires -= 1;
            return Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        }
        if state.swapchain_images.is_empty() {
            return Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        }

        let index = (state.next_image % state.swapchain_images.len()) as u32;
        state.next_image += 1;
        state.calls.push(Call::Acquire(index));
        Ok((index, false))
    }

    fn queue_submit(&self, _device: vk::Device, queue: vk::Queue, buffer: vk::CommandBuffer) -> VkResult<()> {
        self.record(Call::Submit {
            queue: queue.as_raw(),
            buffer: buffer.as_raw(),
        });
        Ok(())
    }

    fn queue_present(
        &self,
        _device: vk::Device,
        queue: vk::Queue,
        _swapchain: vk::SwapchainKHR,
        image_index: u32,
    ) -> VkResult<bool> {
        let mut state = self.state.lock();
        state.calls.push(Call::Present {
            queue: queue.as_raw(),
            image_index,
        });
        Ok(state.suboptimal_presents)
    }
}
