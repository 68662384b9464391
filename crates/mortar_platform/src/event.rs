//! Raw platform events

use tokio::sync::mpsc;

use crate::input::{Key, KeyboardEvent, Modifiers, MouseButton};

/// Receive side of a window's raw event stream
pub type EventStream = mpsc::UnboundedReceiver<RawEvent>;

/// A position in integer window pixels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PhysicalPosition {
    pub x: i32,
    pub y: i32,
}

impl PhysicalPosition {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Events produced by a windowing backend
#[derive(Clone, Debug, PartialEq)]
pub enum RawEvent {
    /// Window close was requested
    Close,
    /// Pointer moved with no button held
    MouseMoved {
        at: PhysicalPosition,
        from: PhysicalPosition,
    },
    /// Pointer moved while `button` is held
    MouseDragged {
        at: PhysicalPosition,
        from: PhysicalPosition,
        button: MouseButton,
    },
    /// Mouse button pressed
    MouseDown {
        at: PhysicalPosition,
        button: MouseButton,
    },
    /// Mouse button released
    MouseUp {
        at: PhysicalPosition,
        button: MouseButton,
    },
    /// Pointer entered the window
    MouseEntered {
        at: PhysicalPosition,
        from: PhysicalPosition,
    },
    /// Pointer left the window
    MouseExited {
        at: PhysicalPosition,
        from: PhysicalPosition,
    },
    /// Key pressed
    KeyDown(KeyboardEvent),
    /// Key released
    KeyUp(KeyboardEvent),
    /// A key press that produced text
    KeyTyped {
        key: Key,
        /// The text produced, empty for non-glyph keys
        glyph: String,
        modifiers: Modifiers,
    },
    /// Window was resized
    Resize {
        /// New width in pixels
        width: u32,
        /// New height in pixels
        height: u32,
    },
}
