// Desktop platform - winit windowing backend
//
// winit only creates windows from inside its event callbacks, so window
// creation queues the attributes and pumps the loop until the handler has
// built the window. Events are pumped without blocking once per frame.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::error::OsError;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowAttributes, WindowId};

use super::{NativeHandle, NativeWindow, PlatformFactory};
use crate::config::WindowConfig;
use crate::error::{Error, Result};

/// Upper bound on pumps while waiting for the handler to build a window
const MAX_CREATE_PUMPS: u32 = 64;

pub struct DesktopPlatform {
    event_loop: Option<EventLoop<()>>,
    handler: DesktopHandler,
}

impl DesktopPlatform {
    pub fn new() -> Self {
        Self {
            event_loop: None,
            handler: DesktopHandler::default(),
        }
    }

    /// Pump once. Returns false once the loop has exited.
    fn pump(&mut self) -> bool {
        let Some(event_loop) = self.event_loop.as_mut() else {
            return false;
        };

        match event_loop.pump_app_events(Some(Duration::ZERO), &mut self.handler) {
            PumpStatus::Continue => true,
            PumpStatus::Exit(code) => {
                log::info!("Event loop exited with code {}", code);
                self.handler.close_requested.set(true);
                false
            }
        }
    }
}

impl Default for DesktopPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformFactory for DesktopPlatform {
    fn name(&self) -> &'static str {
        "winit"
    }

    fn init(&mut self) -> Result<()> {
        let event_loop = EventLoop::new()
            .map_err(|e| Error::PlatformInit(format!("failed to create event loop: {}", e)))?;
        self.event_loop = Some(event_loop);
        Ok(())
    }

    fn create_window(&mut self, config: &WindowConfig) -> Result<Box<dyn NativeWindow>> {
        // winit never creates a GL context on its own, so `no_api` needs no hint here
        let attributes = WindowAttributes::default()
            .with_title(config.title.as_str())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(false);

        self.handler.pending = Some(attributes);
        self.handler.close_requested.set(false);

        for _ in 0..MAX_CREATE_PUMPS {
            let running = self.pump();

            if let Some(created) = self.handler.created.take() {
                let window = created
                    .map_err(|e| Error::PlatformInit(format!("failed to create window: {}", e)))?;
                return Ok(Box::new(DesktopWindow {
                    window,
                    close_requested: Rc::clone(&self.handler.close_requested),
                }));
            }

            if !running {
                break;
            }
        }

        self.handler.pending = None;
        Err(Error::PlatformInit("event loop never created the window".to_string()))
    }

    fn poll_events(&mut self) {
        self.pump();
    }

    fn terminate(&mut self) {
        self.handler = DesktopHandler::default();
        self.event_loop = None;
    }
}

#[derive(Default)]
struct DesktopHandler {
    pending: Option<WindowAttributes>,
    created: Option<std::result::Result<Arc<Window>, OsError>>,
    window_id: Option<WindowId>,
    close_requested: Rc<Cell<bool>>,
}

impl DesktopHandler {
    fn create_pending(&mut self, event_loop: &ActiveEventLoop) {
        let Some(attributes) = self.pending.take() else {
            return;
        };

        let created = event_loop.create_window(attributes).map(Arc::new);
        if let Ok(window) = &created {
            self.window_id = Some(window.id());
        }
        self.created = Some(created);
    }
}

impl ApplicationHandler for DesktopHandler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        self.create_pending(event_loop);
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        if self.window_id != Some(id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested");
                self.close_requested.set(true);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed() && event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    log::info!("ESC pressed, closing window");
                    self.close_requested.set(true);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.create_pending(event_loop);
    }
}

struct DesktopWindow {
    window: Arc<Window>,
    close_requested: Rc<Cell<bool>>,
}

impl NativeWindow for DesktopWindow {
    fn is_close_requested(&self) -> bool {
        self.close_requested.get()
    }

    fn present(&self) {
        self.window.pre_present_notify();
        self.window.request_redraw();
    }

    fn handle(&self) -> Result<NativeHandle> {
        let window = self
            .window
            .window_handle()
            .map_err(|e| Error::PlatformInit(format!("failed to get window handle: {}", e)))?
            .as_raw();
        let display = self
            .window
            .display_handle()
            .map_err(|e| Error::PlatformInit(format!("failed to get display handle: {}", e)))?
            .as_raw();

        Ok(NativeHandle::from_raw(display, window))
    }
}
