// Vulkan Instance - first object of the bootstrap sequence
//
// The extension list is fixed: the generic surface extension plus the one
// matching the window system the native handle belongs to.

use std::ffi::CStr;
use std::sync::Arc;

use ash::vk;

use super::{surface, InstanceDesc, SharedBackend};
use crate::error::{Error, Result};
use crate::platform::NativeHandle;

pub const APPLICATION_NAME: &CStr = c"vulkan-bootstrap";
pub const ENGINE_NAME: &CStr = c"Bootstrap Engine";

/// Target API version
pub const API_VERSION: u32 = vk::API_VERSION_1_0;

const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Owns the API instance. Destroyed last among graphics objects.
pub struct Instance {
    backend: SharedBackend,
    handle: vk::Instance,
    extensions: Vec<&'static CStr>,
    layers: Vec<&'static CStr>,
}

impl Instance {
    pub fn create(backend: SharedBackend, window: &NativeHandle, enable_validation: bool) -> Result<Arc<Self>> {
        let extensions = surface::required_extensions(window)?;
        let layers = if enable_validation {
            vec![VALIDATION_LAYER_NAME]
        } else {
            vec![]
        };

        let desc = InstanceDesc {
            application_name: APPLICATION_NAME,
            engine_name: ENGINE_NAME,
            api_version: API_VERSION,
            extensions,
            layers,
        };

        let handle = backend.create_instance(&desc).map_err(Error::InstanceCreation)?;

        log::info!(
            "Instance created (API {}.{}), extensions: {:?}, layers: {:?}",
            vk::api_version_major(API_VERSION),
            vk::api_version_minor(API_VERSION),
            desc.extensions,
            desc.layers
        );

        Ok(Arc::new(Self {
            backend,
            handle,
            extensions: desc.extensions,
            layers: desc.layers,
        }))
    }

    #[inline]
    pub fn handle(&self) -> vk::Instance {
        self.handle
    }

    #[inline]
    pub fn backend(&self) -> &SharedBackend {
        &self.backend
    }

    pub fn extensions(&self) -> &[&'static CStr] {
        &self.extensions
    }

    pub fn layers(&self) -> &[&'static CStr] {
        &self.layers
    }

    pub fn api_version(&self) -> u32 {
        API_VERSION
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        self.backend.destroy_instance(self.handle);
        log::debug!("Instance destroyed");
    }
}
