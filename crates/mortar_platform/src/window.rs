//! Window abstraction and configuration

use std::sync::Arc;

use image::RgbaImage;
use parking_lot::Mutex;

use crate::event::EventStream;

/// A window's screen buffer.
///
/// Shared between the backend (which presents it on flush) and the drawing
/// loop (which writes damaged regions into it).
pub type Screen = Arc<Mutex<RgbaImage>>;

/// Window configuration
#[derive(Clone, Debug)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial width in pixels
    pub width: u32,
    /// Initial height in pixels
    pub height: u32,
    /// Whether the window can be resized
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Mortar".to_string(),
            width: 800,
            height: 600,
            resizable: true,
        }
    }
}

impl WindowConfig {
    /// Create a new window configuration with a title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window title
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the window size
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set whether the window is resizable
    pub fn resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }
}

/// Window abstraction trait
///
/// Implemented by backend-specific window types.
pub trait Window: Send + Sync + 'static {
    /// Current size of the screen buffer in pixels
    fn size(&self) -> (u32, u32);

    /// The mutable pixel surface that is presented on [`Window::flush_image`]
    fn screen(&self) -> Screen;

    /// Take the raw input event stream.
    ///
    /// Only the first caller receives the stream; later calls return `None`.
    fn take_events(&self) -> Option<EventStream>;

    /// Present the current contents of the screen buffer
    fn flush_image(&self);

    /// Make the window visible
    fn show(&self);

    /// Close the window
    fn close(&self);

    /// Set the window title
    fn set_title(&self, title: &str);
}
