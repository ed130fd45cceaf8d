// Platform module - windowing abstraction
//
// Design: the render loop only talks to PlatformManager/WindowManager.
// Concrete windowing backends plug in through the PlatformFactory trait.
//
// Both managers are plain context objects: main creates one of each and
// passes them down by reference. Nothing here is globally reachable.

pub mod desktop;
pub mod headless;

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::config::WindowConfig;
use crate::error::{Error, Result};

/// A windowing backend: global init/teardown, window creation and the event pump.
pub trait PlatformFactory {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Initialize the backend. Called once, before any window exists.
    fn init(&mut self) -> Result<()>;

    /// Create the application window
    fn create_window(&mut self, config: &WindowConfig) -> Result<Box<dyn NativeWindow>>;

    /// Pump pending platform events without blocking
    fn poll_events(&mut self);

    /// Tear the backend down. Windows must already be destroyed.
    fn terminate(&mut self);
}

/// A window created by a [`PlatformFactory`]. Dropping it destroys the window.
pub trait NativeWindow {
    /// True once the user (or the backend) asked the window to close
    fn is_close_requested(&self) -> bool;

    /// Present the current framebuffer (paths with an implicit context)
    fn present(&self);

    /// Opaque handle for surface creation
    fn handle(&self) -> Result<NativeHandle>;
}

/// Opaque native window handle.
///
/// Produced by the windowing backend and handed unmodified to surface
/// creation. Only the graphics backend looks inside.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NativeHandle(HandleRepr);

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum HandleRepr {
    Raw {
        display: RawDisplayHandle,
        window: RawWindowHandle,
    },
    /// Window with no OS counterpart (headless backend)
    Synthetic(u64),
}

impl NativeHandle {
    pub fn from_raw(display: RawDisplayHandle, window: RawWindowHandle) -> Self {
        Self(HandleRepr::Raw { display, window })
    }

    pub fn synthetic(id: u64) -> Self {
        Self(HandleRepr::Synthetic(id))
    }

    pub(crate) fn repr(&self) -> &HandleRepr {
        &self.0
    }
}

// =============================================================================
// PLATFORM MANAGER
// =============================================================================

/// Owns the windowing backend for the life of the process.
pub struct PlatformManager {
    factory: Box<dyn PlatformFactory>,
    initialized: bool,
}

impl PlatformManager {
    /// Initialize the windowing backend.
    pub fn init(mut factory: Box<dyn PlatformFactory>) -> Result<Self> {
        log::info!("Initializing platform: {}", factory.name());
        factory.init()?;

        Ok(Self {
            factory,
            initialized: true,
        })
    }

    /// Per-frame event pump
    pub fn update(&mut self) {
        if self.initialized {
            self.factory.poll_events();
        }
    }

    /// Shut the backend down. Safe to call more than once.
    pub fn release(&mut self) {
        if !self.initialized {
            return;
        }
        self.factory.terminate();
        self.initialized = false;
        log::info!("Platform released");
    }

    fn factory_mut(&mut self) -> Result<&mut dyn PlatformFactory> {
        if !self.initialized {
            return Err(Error::PlatformInit("platform already released".to_string()));
        }
        Ok(self.factory.as_mut())
    }
}

impl Drop for PlatformManager {
    fn drop(&mut self) {
        self.release();
    }
}

// =============================================================================
// WINDOW MANAGER
// =============================================================================

/// Owns the single application window.
pub struct WindowManager {
    window: Option<Box<dyn NativeWindow>>,
    no_api: bool,
}

impl WindowManager {
    /// Create the application window from its configuration.
    ///
    /// Width and height must both be positive; the title may be empty.
    pub fn init(platform: &mut PlatformManager, config: &WindowConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(Error::PlatformInit(format!(
                "window size must be positive, got {}x{}",
                config.width, config.height
            )));
        }

        let window = platform.factory_mut()?.create_window(config)?;
        log::info!(
            "Window created: '{}' {}x{} (no_api: {})",
            config.title,
            config.width,
            config.height,
            config.no_api
        );

        Ok(Self {
            window: Some(window),
            no_api: config.no_api,
        })
    }

    /// True until the window receives a close request
    pub fn is_active(&self) -> bool {
        self.window
            .as_ref()
            .map_or(false, |window| !window.is_close_requested())
    }

    /// Present for context-backed paths. No-op when the window has no API
    /// context; Vulkan presents through its queue instead.
    pub fn update(&self) {
        if self.no_api {
            return;
        }
        if let Some(window) = &self.window {
            window.present();
        }
    }

    /// Opaque handle for surface creation
    pub fn handle(&self) -> Result<NativeHandle> {
        self.window
            .as_ref()
            .ok_or_else(|| Error::PlatformInit("window already released".to_string()))?
            .handle()
    }

    /// Destroy the window. Safe to call more than once.
    pub fn release(&mut self) {
        if self.window.take().is_some() {
            log::info!("Window released");
        }
    }
}

impl Drop for WindowManager {
    fn drop(&mut self) {
        self.release();
    }
}
