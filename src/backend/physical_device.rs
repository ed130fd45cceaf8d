// Physical device selection
//
// Deterministic first-match policy:
// 1. Take the first enumerated device (no scoring)
// 2. Walk its queue families once, stopping as soon as a graphics family and
//    a present-capable family are both known
// 3. Query the surface capabilities, formats and present modes for the pair

use ash::prelude::VkResult;
use ash::vk;

use super::Surface;
use crate::error::{Error, Result};

/// Queue family indices needed to render and present.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Unique families, graphics first. One or two entries once complete.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);

        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family {
            if !families.contains(&present) {
                families.push(present);
            }
        }

        families
    }
}

/// Walk `families` in order and resolve the graphics and present indices.
///
/// `supports_present` is asked about each family until a present family is
/// found. The walk ends as soon as both indices are resolved, so families past
/// that point are never inspected.
pub fn find_queue_families<F>(families: &[vk::QueueFamilyProperties], mut supports_present: F) -> VkResult<QueueFamilyIndices>
where
    F: FnMut(u32) -> VkResult<bool>,
{
    let mut indices = QueueFamilyIndices::default();

    for (index, family) in families.iter().enumerate() {
        let index = index as u32;

        if indices.graphics_family.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics_family = Some(index);
        }

        if indices.present_family.is_none() && supports_present(index)? {
            indices.present_family = Some(index);
        }

        if indices.is_complete() {
            break;
        }
    }

    Ok(indices)
}

/// The selected GPU and everything derived from it for one surface.
///
/// The handle is enumerated, not created, so nothing is destroyed on drop.
#[derive(Clone, Debug)]
pub struct PhysicalDevice {
    handle: vk::PhysicalDevice,
    pub graphics_queue_index: u32,
    pub present_queue_index: u32,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl PhysicalDevice {
    /// Select the first enumerated device and resolve its queue families
    /// against `surface`.
    pub fn select(surface: &Surface) -> Result<Self> {
        let instance = surface.instance();
        let backend = instance.backend();

        let devices = backend.enumerate_physical_devices(instance.handle())?;
        log::info!("Found {} physical device(s)", devices.len());

        let Some(&handle) = devices.first() else {
            log::warn!("No Vulkan-capable GPUs found");
            return Err(Error::DeviceSelection("no physical devices enumerated".to_string()));
        };

        let families = backend.queue_family_properties(handle);
        let indices = find_queue_families(&families, |index| {
            backend.surface_support(handle, index, surface.handle())
        })?;

        let (Some(graphics_queue_index), Some(present_queue_index)) =
            (indices.graphics_family, indices.present_family)
        else {
            log::warn!(
                "Missing required queue families among {} (graphics={:?}, present={:?})",
                families.len(),
                indices.graphics_family,
                indices.present_family
            );
            return Err(Error::DeviceSelection(format!(
                "required queue families not found (graphics={:?}, present={:?})",
                indices.graphics_family, indices.present_family
            )));
        };

        let capabilities = backend.surface_capabilities(handle, surface.handle())?;
        let formats = backend.surface_formats(handle, surface.handle())?;
        let present_modes = backend.surface_present_modes(handle, surface.handle())?;

        log::info!(
            "Selected physical device: graphics family {}, present family {}",
            graphics_queue_index,
            present_queue_index
        );
        log::debug!(
            "Surface: {} format(s), {} present mode(s), min {} / max {} images",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            capabilities.max_image_count
        );

        Ok(Self {
            handle,
            graphics_queue_index,
            present_queue_index,
            capabilities,
            formats,
            present_modes,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::PhysicalDevice {
        self.handle
    }

    pub fn queue_families(&self) -> QueueFamilyIndices {
        QueueFamilyIndices {
            graphics_family: Some(self.graphics_queue_index),
            present_family: Some(self.present_queue_index),
        }
    }
}
