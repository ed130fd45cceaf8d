// Command pool and the per-image clear buffers
//
// One primary buffer per swapchain image, recorded once up front and
// replayed every frame. The pool has no reset flag, so buffers are allocated
// and recorded exactly once. They are freed with their pool.

use std::sync::Arc;

use ash::vk;

use super::Device;
use crate::error::{Error, Result};

/// A recorded primary command buffer and the image it clears
#[derive(Clone, Copy, Debug)]
pub struct CommandBuffer {
    handle: vk::CommandBuffer,
    image: Option<vk::Image>,
}

impl CommandBuffer {
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }
}

pub struct CommandPool {
    handle: vk::CommandPool,
    queue_family: u32,
    buffers: Vec<CommandBuffer>,
    device: Arc<Device>,
}

impl CommandPool {
    /// Pool bound to `queue_family` (the graphics family)
    pub fn create(device: Arc<Device>, queue_family: u32) -> Result<Self> {
        let handle = device
            .backend()
            .create_command_pool(device.handle(), queue_family)
            .map_err(Error::CommandSetup)?;

        log::debug!("Command pool created for queue family {}", queue_family);

        Ok(Self {
            handle,
            queue_family,
            buffers: Vec::new(),
            device,
        })
    }

    /// Allocate `count` primary buffers. Only once per pool.
    fn allocate(&mut self, count: u32) -> Result<()> {
        if !self.buffers.is_empty() {
            log::warn!("Command buffers already allocated from this pool");
            return Err(Error::CommandSetup(vk::Result::ERROR_INITIALIZATION_FAILED));
        }

        let handles = self
            .device
            .backend()
            .allocate_command_buffers(self.device.handle(), self.handle, count)
            .map_err(Error::CommandSetup)?;

        self.buffers = handles
            .into_iter()
            .map(|handle| CommandBuffer { handle, image: None })
            .collect();

        Ok(())
    }

    /// Allocate one buffer per image and record buffer `i` to clear
    /// `images[i]` to `color`.
    ///
    /// Fails if the buffers were already recorded: they cannot be reset.
    pub fn record_clear(&mut self, images: &[vk::Image], color: [f32; 4]) -> Result<()> {
        if self.buffers.iter().any(|buffer| buffer.image.is_some()) {
            log::warn!("Clear buffers are already recorded");
            return Err(Error::CommandSetup(vk::Result::ERROR_INITIALIZATION_FAILED));
        }
        self.allocate(images.len() as u32)?;

        let backend = self.device.backend();
        for (buffer, &image) in self.buffers.iter_mut().zip(images) {
            backend
                .record_clear(self.device.handle(), buffer.handle, image, color)
                .map_err(Error::CommandSetup)?;
            buffer.image = Some(image);
        }

        log::info!("Recorded {} clear command buffer(s), color {:?}", self.buffers.len(), color);
        Ok(())
    }

    /// Buffer recorded for swapchain image `index`
    pub fn buffer(&self, index: u32) -> Option<&CommandBuffer> {
        self.buffers.get(index as usize)
    }

    #[cfg(test)]
    pub fn buffers(&self) -> &[CommandBuffer] {
        &self.buffers
    }

    #[cfg(test)]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }

    #[cfg(test)]
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        self.buffers.clear();
        self.device
            .backend()
            .destroy_command_pool(self.device.handle(), self.handle);
        log::debug!("Command pool for queue family {} destroyed", self.queue_family);
    }
}
