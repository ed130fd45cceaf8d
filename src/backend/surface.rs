// Surface - binds the instance to the native window
//
// Creation is platform-specific (the backend decodes the native handle);
// destruction is uniform.

use std::ffi::CStr;
use std::sync::Arc;

use ash::extensions::khr;
use ash::vk;
use raw_window_handle::RawDisplayHandle;

use super::Instance;
use crate::error::{Error, Result};
use crate::platform::{HandleRepr, NativeHandle};

const HEADLESS_SURFACE_EXTENSION: &CStr = c"VK_EXT_headless_surface";

/// Instance extensions needed to build a surface for `window`
pub fn required_extensions(window: &NativeHandle) -> Result<Vec<&'static CStr>> {
    let platform_extension = match window.repr() {
        HandleRepr::Raw { display, .. } => match display {
            RawDisplayHandle::Windows(_) => khr::Win32Surface::name(),
            RawDisplayHandle::Xlib(_) => khr::XlibSurface::name(),
            RawDisplayHandle::Xcb(_) => khr::XcbSurface::name(),
            RawDisplayHandle::Wayland(_) => khr::WaylandSurface::name(),
            RawDisplayHandle::AppKit(_) => return Err(Error::UnsupportedWindowSystem("AppKit")),
            _ => return Err(Error::UnsupportedWindowSystem("unknown display")),
        },
        HandleRepr::Synthetic(_) => HEADLESS_SURFACE_EXTENSION,
    };

    Ok(vec![khr::Surface::name(), platform_extension])
}

/// Presentable target bound to exactly one window for its whole life
pub struct Surface {
    instance: Arc<Instance>,
    handle: vk::SurfaceKHR,
    window: NativeHandle,
}

impl Surface {
    pub fn create(instance: Arc<Instance>, window: NativeHandle) -> Result<Arc<Self>> {
        let handle = instance
            .backend()
            .create_surface(instance.handle(), &window)
            .map_err(Error::SurfaceCreation)?;

        log::info!("Surface created");

        Ok(Arc::new(Self {
            instance,
            handle,
            window,
        }))
    }

    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    #[inline]
    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        self.instance
            .backend()
            .destroy_surface(self.instance.handle(), self.handle);
        log::debug!("Surface for {:?} destroyed", self.window);
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroIsize;
    use std::ptr::NonNull;

    use raw_window_handle::{
        RawWindowHandle, Win32WindowHandle, WaylandDisplayHandle, WaylandWindowHandle, WindowsDisplayHandle,
    };

    use super::*;
    use crate::backend::recording::{FakeGpu, RecordingBackend};

    #[test]
    fn test_win32_extensions() {
        let hwnd = NonZeroIsize::new(1).unwrap();
        let window = NativeHandle::from_raw(
            RawDisplayHandle::Windows(WindowsDisplayHandle::new()),
            RawWindowHandle::Win32(Win32WindowHandle::new(hwnd)),
        );
        assert_eq!(
            required_extensions(&window).unwrap(),
            vec![c"VK_KHR_surface", c"VK_KHR_win32_surface"]
        );
    }

    #[test]
    fn test_wayland_extensions() {
        let mut display = 0u8;
        let mut surface = 0u8;
        let window = NativeHandle::from_raw(
            RawDisplayHandle::Wayland(WaylandDisplayHandle::new(NonNull::from(&mut display).cast())),
            RawWindowHandle::Wayland(WaylandWindowHandle::new(NonNull::from(&mut surface).cast())),
        );
        assert_eq!(
            required_extensions(&window).unwrap(),
            vec![c"VK_KHR_surface", c"VK_KHR_wayland_surface"]
        );
    }

    #[test]
    fn test_surface_keeps_window_handle() {
        let backend = RecordingBackend::new(vec![FakeGpu::single_family()]);
        let window = NativeHandle::synthetic(7);
        let instance = Instance::create(backend.clone(), &window, false).unwrap();
        let _surface = Surface::create(instance, window).unwrap();

        assert_eq!(backend.surface_window(), Some(window));
    }

    #[test]
    fn test_rejected_surface_maps_error() {
        let backend = RecordingBackend::new(vec![]).reject_surface();
        let window = NativeHandle::synthetic(1);
        let instance = Instance::create(backend, &window, false).unwrap();
        assert!(matches!(
            Surface::create(instance, window),
            Err(Error::SurfaceCreation(_))
        ));
    }
}
