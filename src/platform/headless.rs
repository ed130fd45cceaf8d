// Headless platform - scripted windowing backend
//
// No OS window is created. The backend asks the window to close after a
// fixed number of event polls and hands out synthetic native handles.
// Every lifecycle step is appended to a shared event log.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{NativeHandle, NativeWindow, PlatformFactory};
use crate::config::WindowConfig;
use crate::error::{Error, Result};

/// Lifecycle steps observed by the headless backend
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlatformEvent {
    Initialized,
    WindowCreated { width: u32, height: u32 },
    Presented,
    Polled,
    WindowDestroyed,
    Terminated,
}

pub type EventLog = Rc<RefCell<Vec<PlatformEvent>>>;

pub struct HeadlessPlatform {
    close_after: u32,
    polls: u32,
    next_window_id: u64,
    fail_init: bool,
    close_requested: Rc<Cell<bool>>,
    events: EventLog,
}

impl HeadlessPlatform {
    /// Backend whose window requests close on the `close_after`-th poll
    pub fn new(close_after: u32) -> Self {
        Self {
            close_after,
            polls: 0,
            next_window_id: 1,
            fail_init: false,
            close_requested: Rc::new(Cell::new(false)),
            events: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Backend whose initialization always fails
    #[cfg(test)]
    pub fn failing() -> Self {
        Self {
            fail_init: true,
            ..Self::new(0)
        }
    }

    /// Shared view of the lifecycle log
    #[cfg(test)]
    pub fn events(&self) -> EventLog {
        Rc::clone(&self.events)
    }

    fn record(&self, event: PlatformEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl PlatformFactory for HeadlessPlatform {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn init(&mut self) -> Result<()> {
        if self.fail_init {
            return Err(Error::PlatformInit("headless backend configured to fail".to_string()));
        }
        self.record(PlatformEvent::Initialized);
        Ok(())
    }

    fn create_window(&mut self, config: &WindowConfig) -> Result<Box<dyn NativeWindow>> {
        let id = self.next_window_id;
        self.next_window_id += 1;
        self.close_requested.set(false);
        self.record(PlatformEvent::WindowCreated {
            width: config.width,
            height: config.height,
        });

        Ok(Box::new(HeadlessWindow {
            id,
            close_requested: Rc::clone(&self.close_requested),
            events: Rc::clone(&self.events),
        }))
    }

    fn poll_events(&mut self) {
        self.polls += 1;
        self.record(PlatformEvent::Polled);
        if self.polls >= self.close_after {
            self.close_requested.set(true);
        }
    }

    fn terminate(&mut self) {
        self.record(PlatformEvent::Terminated);
    }
}

struct HeadlessWindow {
    id: u64,
    close_requested: Rc<Cell<bool>>,
    events: EventLog,
}

impl NativeWindow for HeadlessWindow {
    fn is_close_requested(&self) -> bool {
        self.close_requested.get()
    }

    fn present(&self) {
        self.events.borrow_mut().push(PlatformEvent::Presented);
    }

    fn handle(&self) -> Result<NativeHandle> {
        Ok(NativeHandle::synthetic(self.id))
    }
}

impl Drop for HeadlessWindow {
    fn drop(&mut self) {
        self.events.borrow_mut().push(PlatformEvent::WindowDestroyed);
    }
}
