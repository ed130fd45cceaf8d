// Swapchain - Window presentation
//
// Manages the chain of images we clear and present to the screen.
//
// Negotiation is deliberately minimal:
// - format: first supported entry
// - present mode: FIFO (always available)
// - image count: min + 1, not clamped to the maximum
// - extent: current extent as reported
// Out-of-range image counts and the undefined-extent sentinel are logged,
// not corrected.

use std::sync::Arc;

use ash::vk;

use super::{Device, PhysicalDevice, Surface, SwapchainDesc};
use crate::error::{Error, Result};

/// How swapchain images are shared between queue families
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageSharing {
    /// Graphics and present use the same family
    Exclusive,
    /// `[graphics, present]`
    Concurrent([u32; 2]),
}

impl ImageSharing {
    pub fn for_families(graphics: u32, present: u32) -> Self {
        if graphics == present {
            ImageSharing::Exclusive
        } else {
            ImageSharing::Concurrent([graphics, present])
        }
    }

    /// Family indices attached to swapchain creation (empty when exclusive)
    pub fn family_indices(&self) -> &[u32] {
        match self {
            ImageSharing::Exclusive => &[],
            ImageSharing::Concurrent(families) => families,
        }
    }
}

/// Parameters negotiated from the physical device's surface data
#[derive(Clone, Copy, Debug)]
pub struct SwapchainSettings {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub sharing: ImageSharing,
    max_image_count: u32,
}

impl SwapchainSettings {
    pub fn negotiate(physical_device: &PhysicalDevice) -> Result<Self> {
        let capabilities = &physical_device.capabilities;

        let format = *physical_device
            .formats
            .first()
            .ok_or(Error::SwapchainCreation(vk::Result::ERROR_FORMAT_NOT_SUPPORTED))?;

        let settings = Self {
            format,
            present_mode: vk::PresentModeKHR::FIFO,
            extent: capabilities.current_extent,
            image_count: capabilities.min_image_count.saturating_add(1),
            pre_transform: capabilities.current_transform,
            sharing: ImageSharing::for_families(
                physical_device.graphics_queue_index,
                physical_device.present_queue_index,
            ),
            max_image_count: capabilities.max_image_count,
        };

        if settings.exceeds_max_image_count() {
            log::warn!(
                "Requesting {} swapchain images but the surface allows at most {}",
                settings.image_count,
                settings.max_image_count
            );
        }
        if !physical_device.present_modes.contains(&settings.present_mode) {
            log::warn!(
                "Surface does not list FIFO among {:?}; requesting it anyway",
                physical_device.present_modes
            );
        }
        if settings.extent_is_undefined() {
            log::warn!("Surface reports an undefined current extent; using it as-is");
        }

        Ok(settings)
    }

    /// True when the requested count is above a non-zero surface maximum
    pub fn exceeds_max_image_count(&self) -> bool {
        self.max_image_count != 0 && self.image_count > self.max_image_count
    }

    /// True when the surface left the extent up to the swapchain
    pub fn extent_is_undefined(&self) -> bool {
        self.extent.width == u32::MAX && self.extent.height == u32::MAX
    }
}

/// View onto one swapchain image. Destroyed before its swapchain.
pub struct ImageView {
    device: Arc<Device>,
    handle: vk::ImageView,
}

impl ImageView {
    /// 2D color view, identity swizzle, one mip level and one layer
    pub fn create(device: Arc<Device>, image: vk::Image, format: vk::Format) -> Result<Self> {
        let handle = device
            .backend()
            .create_image_view(device.handle(), image, format)
            .map_err(Error::SwapchainCreation)?;
        Ok(Self { device, handle })
    }

    #[cfg(test)]
    pub fn handle(&self) -> vk::ImageView {
        self.handle
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        self.device
            .backend()
            .destroy_image_view(self.device.handle(), self.handle);
    }
}

pub struct Swapchain {
    handle: vk::SwapchainKHR,
    settings: SwapchainSettings,
    images: Vec<vk::Image>,
    image_views: Vec<ImageView>,
    device: Arc<Device>,
    _surface: Arc<Surface>,
}

impl Swapchain {
    pub fn create(device: Arc<Device>, physical_device: &PhysicalDevice, surface: Arc<Surface>) -> Result<Self> {
        let settings = SwapchainSettings::negotiate(physical_device)?;

        log::info!(
            "Creating swapchain: {}x{}, {:?}, {:?}, {} images, {:?}",
            settings.extent.width,
            settings.extent.height,
            settings.format.format,
            settings.present_mode,
            settings.image_count,
            settings.sharing
        );

        let desc = SwapchainDesc {
            surface: surface.handle(),
            min_image_count: settings.image_count,
            format: settings.format,
            extent: settings.extent,
            present_mode: settings.present_mode,
            pre_transform: settings.pre_transform,
            sharing: settings.sharing,
        };

        let handle = device
            .backend()
            .create_swapchain(device.handle(), &desc)
            .map_err(Error::SwapchainCreation)?;

        let mut swapchain = Self {
            handle,
            settings,
            images: Vec::new(),
            image_views: Vec::new(),
            device,
            _surface: surface,
        };
        swapchain.get_images()?;

        Ok(swapchain)
    }

    /// Enumerate the swapchain images and build one view per image.
    ///
    /// The image count is whatever the backend hands back, which may differ
    /// from the count requested at creation.
    pub fn get_images(&mut self) -> Result<&[vk::Image]> {
        self.destroy_views();

        self.images = self
            .device
            .backend()
            .swapchain_images(self.device.handle(), self.handle)
            .map_err(Error::SwapchainCreation)?;

        for &image in &self.images {
            let view = ImageView::create(self.device.clone(), image, self.settings.format.format)?;
            self.image_views.push(view);
        }

        log::info!("Created swapchain with {} images", self.images.len());
        Ok(&self.images)
    }

    /// Block until an image is available. No timeout is applied.
    pub fn acquire_next_image(&self) -> Result<(u32, bool)> {
        let acquired = self
            .device
            .backend()
            .acquire_next_image(self.device.handle(), self.handle, u64::MAX)?;
        Ok(acquired)
    }

    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub fn settings(&self) -> &SwapchainSettings {
        &self.settings
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    #[cfg(test)]
    pub fn image_views(&self) -> &[ImageView] {
        &self.image_views
    }

    /// Views go in reverse creation order
    fn destroy_views(&mut self) {
        while let Some(view) = self.image_views.pop() {
            drop(view);
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_views();
        self.device
            .backend()
            .destroy_swapchain(self.device.handle(), self.handle);
        log::debug!("Swapchain destroyed");
    }
}
