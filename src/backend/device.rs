// Vulkan Device - logical device and its queues
//
// Responsibilities:
// - One queue per unique family (graphics and present may share a family)
// - Swapchain extension
// - Handing out Queue wrappers for submit/present

use std::ffi::CStr;
use std::sync::Arc;

use ash::extensions::khr;
use ash::vk;

use super::{CommandBuffer, DeviceDesc, Instance, PhysicalDevice, SharedBackend, Swapchain};
use crate::error::{Error, Result};

const QUEUE_PRIORITY: f32 = 1.0;

/// Device extensions we enable
pub fn required_extensions() -> Vec<&'static CStr> {
    vec![khr::Swapchain::name()]
}

/// Logical device. Destroyed after everything created from it.
pub struct Device {
    handle: vk::Device,
    queue_families: Vec<u32>,
    instance: Arc<Instance>,
}

impl Device {
    pub fn create(instance: Arc<Instance>, physical_device: &PhysicalDevice) -> Result<Arc<Self>> {
        let queue_families = physical_device.queue_families().unique_families();
        let desc = DeviceDesc {
            queue_families,
            queue_priority: QUEUE_PRIORITY,
            extensions: required_extensions(),
        };

        let handle = instance
            .backend()
            .create_device(physical_device.handle(), &desc)
            .map_err(Error::DeviceCreation)?;

        log::info!("Logical device created with queue families {:?}", desc.queue_families);

        Ok(Arc::new(Self {
            handle,
            queue_families: desc.queue_families,
            instance,
        }))
    }

    /// Queue 0 of `family_index`
    pub fn get_queue(self: &Arc<Self>, family_index: u32) -> Queue {
        debug_assert!(
            self.queue_families.contains(&family_index),
            "queue family {} was not requested at device creation",
            family_index
        );

        let handle = self.backend().get_device_queue(self.handle, family_index, 0);
        Queue {
            device: Arc::clone(self),
            handle,
            family_index,
        }
    }

    /// Block until the GPU has finished all submitted work
    pub fn wait_idle(&self) -> Result<()> {
        self.backend().device_wait_idle(self.handle)?;
        Ok(())
    }

    #[inline]
    pub fn handle(&self) -> vk::Device {
        self.handle
    }

    #[inline]
    pub fn backend(&self) -> &SharedBackend {
        self.instance.backend()
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.backend().destroy_device(self.handle);
        log::debug!("Logical device destroyed");
    }
}

/// A device queue. Lives as long as its device; never destroyed separately.
pub struct Queue {
    device: Arc<Device>,
    handle: vk::Queue,
    family_index: u32,
}

impl Queue {
    /// Enqueue one pre-recorded buffer. No semaphores, no fence.
    pub fn submit(&self, command_buffer: &CommandBuffer) -> Result<()> {
        self.device
            .backend()
            .queue_submit(self.device.handle(), self.handle, command_buffer.handle())?;
        Ok(())
    }

    /// Present `image_index` of `swapchain`. Returns true when the swapchain
    /// reports itself suboptimal.
    pub fn present(&self, swapchain: &Swapchain, image_index: u32) -> Result<bool> {
        let suboptimal = self.device.backend().queue_present(
            self.device.handle(),
            self.handle,
            swapchain.handle(),
            image_index,
        )?;
        Ok(suboptimal)
    }

    #[cfg(test)]
    pub fn handle(&self) -> vk::Queue {
        self.handle
    }

    #[inline]
    pub fn family_index(&self) -> u32 {
        self.family_index
    }
}
