//! In-memory windowing backend
//!
//! Windows are plain pixel buffers. A [`HeadlessController`] drives a window
//! from the outside: it injects raw events, resizes the screen, and observes
//! what was presented.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{PlatformError, Result};
use crate::event::{EventStream, RawEvent};
use crate::platform::Platform;
use crate::window::{Screen, Window, WindowConfig};

/// Headless platform
#[derive(Debug, Default)]
pub struct HeadlessPlatform {
    fail_creation: bool,
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// A platform whose window creation always fails
    pub fn failing() -> Self {
        Self {
            fail_creation: true,
        }
    }
}

impl Platform for HeadlessPlatform {
    type Window = HeadlessWindow;

    fn create_window(
        &self,
        _parent: Option<&Self::Window>,
        config: &WindowConfig,
    ) -> Result<Self::Window> {
        if self.fail_creation {
            return Err(PlatformError::WindowCreation(format!(
                "headless backend refused {}x{} window",
                config.width, config.height
            )));
        }
        if config.width == 0 || config.height == 0 {
            return Err(PlatformError::WindowCreation(
                "window dimensions must be non-zero".to_string(),
            ));
        }
        Ok(HeadlessWindow::new(config))
    }

    fn name(&self) -> &'static str {
        "headless"
    }
}

struct WindowState {
    title: Mutex<String>,
    screen: Screen,
    events_tx: mpsc::UnboundedSender<RawEvent>,
    events_rx: Mutex<Option<EventStream>>,
    flushes: AtomicUsize,
    visible: AtomicBool,
    closed: AtomicBool,
}

/// A window backed by an in-memory screen buffer
#[derive(Clone)]
pub struct HeadlessWindow {
    state: Arc<WindowState>,
}

impl HeadlessWindow {
    fn new(config: &WindowConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            state: Arc::new(WindowState {
                title: Mutex::new(config.title.clone()),
                screen: Arc::new(Mutex::new(RgbaImage::new(config.width, config.height))),
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
                flushes: AtomicUsize::new(0),
                visible: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// A controller for driving this window from tests or demos
    pub fn controller(&self) -> HeadlessController {
        HeadlessController {
            state: Arc::clone(&self.state),
        }
    }
}

impl std::fmt::Debug for HeadlessWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessWindow")
            .field("title", &*self.state.title.lock())
            .field("size", &self.size())
            .finish()
    }
}

impl Window for HeadlessWindow {
    fn size(&self) -> (u32, u32) {
        self.state.screen.lock().dimensions()
    }

    fn screen(&self) -> Screen {
        Arc::clone(&self.state.screen)
    }

    fn take_events(&self) -> Option<EventStream> {
        self.state.events_rx.lock().take()
    }

    fn flush_image(&self) {
        self.state.flushes.fetch_add(1, Ordering::SeqCst);
    }

    fn show(&self) {
        self.state.visible.store(true, Ordering::SeqCst);
    }

    fn close(&self) {
        if !self.state.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("headless window closed");
            self.state.visible.store(false, Ordering::SeqCst);
        }
    }

    fn set_title(&self, title: &str) {
        *self.state.title.lock() = title.to_string();
    }
}

/// Drives a [`HeadlessWindow`] from the outside
#[derive(Clone)]
pub struct HeadlessController {
    state: Arc<WindowState>,
}

impl HeadlessController {
    /// Inject a raw event as if the backend produced it
    pub fn send(&self, event: RawEvent) -> Result<()> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(PlatformError::Closed);
        }
        self.state
            .events_tx
            .send(event)
            .map_err(|_| PlatformError::Closed)
    }

    /// Resize the screen buffer and emit the matching resize event
    pub fn resize(&self, width: u32, height: u32) -> Result<()> {
        *self.state.screen.lock() = RgbaImage::new(width, height);
        self.send(RawEvent::Resize { width, height })
    }

    /// Number of times the window was flushed
    pub fn flush_count(&self) -> usize {
        self.state.flushes.load(Ordering::SeqCst)
    }

    /// Copy of the screen buffer
    pub fn snapshot(&self) -> RgbaImage {
        self.state.screen.lock().clone()
    }

    pub fn is_visible(&self) -> bool {
        self.state.visible.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn title(&self) -> String {
        self.state.title.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PhysicalPosition;
    use crate::input::MouseButton;

    #[test]
    fn test_failing_platform() {
        let platform = HeadlessPlatform::failing();
        let result = platform.create_window(None, &WindowConfig::default());
        assert!(matches!(result, Err(PlatformError::WindowCreation(_))));
    }

    #[test]
    fn test_zero_sized_window_is_rejected() {
        let platform = HeadlessPlatform::new();
        let result = platform.create_window(None, &WindowConfig::default().size(0, 10));
        assert!(result.is_err());
    }

    #[test]
    fn test_event_stream_taken_once() {
        let window = HeadlessPlatform::new()
            .create_window(None, &WindowConfig::default())
            .unwrap();
        assert!(window.take_events().is_some());
        assert!(window.take_events().is_none());
    }

    #[tokio::test]
    async fn test_controller_round_trip() {
        let window = HeadlessPlatform::new()
            .create_window(None, &WindowConfig::new("t").size(40, 30))
            .unwrap();
        let controller = window.controller();
        let mut events = window.take_events().unwrap();

        let down = RawEvent::MouseDown {
            at: PhysicalPosition::new(3, 4),
            button: MouseButton::Left,
        };
        controller.send(down.clone()).unwrap();
        assert_eq!(events.recv().await, Some(down));

        controller.resize(50, 60).unwrap();
        assert_eq!(window.size(), (50, 60));
        assert_eq!(
            events.recv().await,
            Some(RawEvent::Resize {
                width: 50,
                height: 60
            })
        );

        window.flush_image();
        assert_eq!(controller.flush_count(), 1);

        window.show();
        assert!(controller.is_visible());
        window.close();
        assert!(controller.is_closed());
        assert!(controller.send(RawEvent::Close).is_err());
    }
}
