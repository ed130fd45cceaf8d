// =============================================================================
// RENDERER - Bootstrap sequence and the clear-screen frame loop
// =============================================================================
//
// BOOTSTRAP:
// 1. Instance (surface extensions for the window's platform)
// 2. Surface bound to the window
// 3. First physical device + graphics/present queue families
// 4. Logical device + one queue per family
// 5. Swapchain + one image view per image
// 6. Command pool + one pre-recorded clear buffer per image
//
// FRAME:
// acquire -> submit buffer[index] -> present index
//
// Submit and present carry no semaphores or fences. Acquire blocks without
// a timeout; the GPU is only drained at teardown.
//
// =============================================================================

use ash::vk;

use crate::backend::{CommandPool, Device, Instance, PhysicalDevice, Queue, SharedBackend, Surface, Swapchain};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::platform::{PlatformManager, WindowManager};
use std::sync::Arc;

/// Where the command buffers are in their lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    /// Pool exists, buffers not yet recorded
    Uninitialized,
    /// One clear buffer recorded per swapchain image
    Recorded,
    /// Frame loop running
    Looping,
    /// Everything released
    TornDown,
}

/// Every graphics object. Fields drop top to bottom, which is the reverse of
/// creation order.
struct GpuObjects {
    command_pool: CommandPool,
    swapchain: Swapchain,
    present_queue: Queue,
    graphics_queue: Queue,
    device: Arc<Device>,
    _surface: Arc<Surface>,
    _instance: Arc<Instance>,
}

pub struct Renderer {
    objects: Option<GpuObjects>,
    clear_color: [f32; 4],
    state: FrameState,
}

impl Renderer {
    // =========================================================================
    // BOOTSTRAP
    // =========================================================================

    /// Build the full object chain for `window` and record the clear buffers.
    ///
    /// A failure at any stage releases whatever was already created.
    pub fn bootstrap(backend: SharedBackend, window: &WindowManager, config: &Config) -> Result<Self> {
        log::info!("Initializing Vulkan...");

        let native_handle = window.handle()?;

        let instance = Instance::create(backend, &native_handle, config.debug.validation_layers)?;
        let surface = Surface::create(instance.clone(), native_handle)?;
        let physical_device = PhysicalDevice::select(&surface)?;
        let device = Device::create(instance.clone(), &physical_device)?;

        let graphics_queue = device.get_queue(physical_device.graphics_queue_index);
        let present_queue = device.get_queue(physical_device.present_queue_index);

        let swapchain = Swapchain::create(device.clone(), &physical_device, surface.clone())?;
        let command_pool = CommandPool::create(device.clone(), physical_device.graphics_queue_index)?;

        log::info!(
            "Vulkan initialized: API {}.{}, {} instance extension(s), {} layer(s)",
            vk::api_version_major(instance.api_version()),
            vk::api_version_minor(instance.api_version()),
            instance.extensions().len(),
            instance.layers().len()
        );
        log::info!(
            "Queues: graphics family {}, present family {}; swapchain {}x{} with {} image(s)",
            graphics_queue.family_index(),
            present_queue.family_index(),
            swapchain.settings().extent.width,
            swapchain.settings().extent.height,
            swapchain.images().len()
        );

        let mut renderer = Self {
            objects: Some(GpuObjects {
                command_pool,
                swapchain,
                present_queue,
                graphics_queue,
                device,
                _surface: surface,
                _instance: instance,
            }),
            clear_color: config.graphics.clear_color,
            state: FrameState::Uninitialized,
        };
        renderer.record_command_buffers()?;

        Ok(renderer)
    }

    // =========================================================================
    // COMMAND RECORDING
    // =========================================================================

    /// Record each buffer once with a clear of its swapchain image.
    fn record_command_buffers(&mut self) -> Result<()> {
        let color = self.clear_color;
        let objects = self.objects_mut()?;
        let images = objects.swapchain.images().to_vec();

        objects.command_pool.record_clear(&images, color)?;
        self.state = FrameState::Recorded;
        Ok(())
    }

    // =========================================================================
    // FRAME RENDERING
    // =========================================================================

    /// Acquire, submit the matching pre-recorded buffer, present.
    pub fn render_frame(&mut self) -> Result<()> {
        let objects = self.objects()?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 1: Acquire next swapchain image (blocks, no timeout)
        // ─────────────────────────────────────────────────────────────────────
        let (image_index, suboptimal) = objects.swapchain.acquire_next_image()?;
        if suboptimal {
            log::warn!("Swapchain suboptimal on acquire (image {})", image_index);
        }

        // ─────────────────────────────────────────────────────────────────────
        // STEP 2: Submit the buffer recorded for that image
        // ─────────────────────────────────────────────────────────────────────
        let command_buffer = objects
            .command_pool
            .buffer(image_index)
            .ok_or(Error::Vulkan(vk::Result::ERROR_OUT_OF_DATE_KHR))?;
        objects.graphics_queue.submit(command_buffer)?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 3: Present the image
        // ─────────────────────────────────────────────────────────────────────
        if objects.present_queue.present(&objects.swapchain, image_index)? {
            log::warn!("Swapchain suboptimal on present (image {})", image_index);
        }

        Ok(())
    }

    /// Run frames until the window asks to close. Returns the number of
    /// frames that completed.
    ///
    /// Per-frame errors are logged and the loop carries on.
    pub fn run(&mut self, platform: &mut PlatformManager, window: &WindowManager) -> u64 {
        if self.objects.is_none() {
            log::warn!("Frame loop requested after teardown");
            return 0;
        }

        log::debug!("Entering frame loop from {:?}", self.state);
        self.state = FrameState::Looping;
        let mut frames = 0u64;

        while window.is_active() {
            match self.render_frame() {
                Ok(()) => frames += 1,
                Err(e) => log::error!("Frame failed: {}", e),
            }

            window.update();
            platform.update();
        }

        log::info!("Window closed after {} frame(s)", frames);
        frames
    }

    // =========================================================================
    // CLEANUP
    // =========================================================================

    /// Wait for the GPU, then release every object in reverse creation order.
    /// Safe to call more than once.
    pub fn teardown(&mut self) {
        let Some(objects) = self.objects.take() else {
            return;
        };

        log::info!("Cleaning up Vulkan resources...");

        // Wait for GPU to finish before destroying anything
        if let Err(e) = objects.device.wait_idle() {
            log::error!("Device wait idle failed: {}", e);
        }
        drop(objects);

        self.state = FrameState::TornDown;
        log::info!("Cleanup complete");
    }

    fn objects(&self) -> Result<&GpuObjects> {
        self.objects
            .as_ref()
            .ok_or(Error::Vulkan(vk::Result::ERROR_DEVICE_LOST))
    }

    fn objects_mut(&mut self) -> Result<&mut GpuObjects> {
        self.objects
            .as_mut()
            .ok_or(Error::Vulkan(vk::Result::ERROR_DEVICE_LOST))
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.teardown();
    }
}
