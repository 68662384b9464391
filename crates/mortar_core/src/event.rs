//! Block-level events
//!
//! Raw platform events carry integer window pixels. Once they enter the block
//! tree they become [`Event`]s with `f32` coordinates local to the receiving
//! block, timestamped relative to process start.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use mortar_platform::{Key, KeyboardEvent, Modifiers, MouseButton, PhysicalPosition, RawEvent};

use crate::block::BlockHandle;
use crate::geom::{Point, RectSet, Size};
use crate::mailbox::Coalesce;

static START: OnceLock<Instant> = OnceLock::new();

/// Time elapsed since the runtime first asked for a timestamp
pub fn since_start() -> Duration {
    START.get_or_init(Instant::now).elapsed()
}

// ─────────────────────────────────────────────────────────────────────────────
// Event payloads
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct CloseEvent {
    pub when: Duration,
}

/// Pointer moved with no button held
#[derive(Clone, Debug, PartialEq)]
pub struct MouseMotionEvent {
    pub when: Duration,
    pub loc: Point,
    pub from: Point,
}

/// Pointer moved with `button` held
#[derive(Clone, Debug, PartialEq)]
pub struct MouseDragEvent {
    pub when: Duration,
    pub loc: Point,
    pub from: Point,
    pub button: MouseButton,
}

/// Button press or release
#[derive(Clone, Debug, PartialEq)]
pub struct MouseButtonEvent {
    pub when: Duration,
    pub loc: Point,
    pub button: MouseButton,
}

/// Pointer entered or left a block
#[derive(Clone, Debug, PartialEq)]
pub struct MouseCrossingEvent {
    pub when: Duration,
    pub loc: Point,
    pub from: Point,
}

#[derive(Clone, Debug, PartialEq)]
pub struct KeyEvent {
    pub when: Duration,
    pub key: Key,
    pub modifiers: Modifiers,
}

#[derive(Clone, Debug, PartialEq)]
pub struct KeyTypedEvent {
    pub when: Duration,
    pub key: Key,
    /// Text produced by the key, empty for non-glyph keys
    pub glyph: String,
    pub modifiers: Modifiers,
}

/// Keyboard focus was gained or lost
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyFocusEvent {
    pub focus: bool,
}

/// A block asks its parent for keyboard focus
#[derive(Clone, Debug)]
pub struct KeyFocusRequest {
    pub block: BlockHandle,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResizeEvent {
    pub size: Size,
}

impl Coalesce for ResizeEvent {
    fn coalesce(self, newer: Self) -> Self {
        newer
    }
}

/// Pointer payloads that can be moved into a child's coordinate space
pub trait Localize {
    /// The same event with every coordinate shifted by `-origin`
    fn localized(&self, origin: Point) -> Self;
}

impl Localize for MouseMotionEvent {
    fn localized(&self, origin: Point) -> Self {
        Self {
            loc: self.loc - origin,
            from: self.from - origin,
            ..self.clone()
        }
    }
}

impl Localize for MouseDragEvent {
    fn localized(&self, origin: Point) -> Self {
        Self {
            loc: self.loc - origin,
            from: self.from - origin,
            ..self.clone()
        }
    }
}

impl Localize for MouseButtonEvent {
    fn localized(&self, origin: Point) -> Self {
        Self {
            loc: self.loc - origin,
            ..self.clone()
        }
    }
}

impl Localize for MouseCrossingEvent {
    fn localized(&self, origin: Point) -> Self {
        Self {
            loc: self.loc - origin,
            from: self.from - origin,
            ..self.clone()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Event
// ─────────────────────────────────────────────────────────────────────────────

/// Everything that can arrive in a block's inbound queue
#[derive(Clone, Debug)]
pub enum Event {
    Close(CloseEvent),
    MouseMoved(MouseMotionEvent),
    MouseDragged(MouseDragEvent),
    MouseDown(MouseButtonEvent),
    MouseUp(MouseButtonEvent),
    MouseEntered(MouseCrossingEvent),
    MouseExited(MouseCrossingEvent),
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    KeyTyped(KeyTypedEvent),
    KeyFocus(KeyFocusEvent),
    KeyFocusRequest(KeyFocusRequest),
    Resize(ResizeEvent),
}

impl Event {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Close(_) => "close",
            Event::MouseMoved(_) => "mouse_moved",
            Event::MouseDragged(_) => "mouse_dragged",
            Event::MouseDown(_) => "mouse_down",
            Event::MouseUp(_) => "mouse_up",
            Event::MouseEntered(_) => "mouse_entered",
            Event::MouseExited(_) => "mouse_exited",
            Event::KeyDown(_) => "key_down",
            Event::KeyUp(_) => "key_up",
            Event::KeyTyped(_) => "key_typed",
            Event::KeyFocus(_) => "key_focus",
            Event::KeyFocusRequest(_) => "key_focus_request",
            Event::Resize(_) => "resize",
        }
    }

    /// Pointer location, for pointer events
    pub fn location(&self) -> Option<Point> {
        match self {
            Event::MouseMoved(e) => Some(e.loc),
            Event::MouseDragged(e) => Some(e.loc),
            Event::MouseDown(e) | Event::MouseUp(e) => Some(e.loc),
            Event::MouseEntered(e) | Event::MouseExited(e) => Some(e.loc),
            _ => None,
        }
    }

    /// Convert a raw platform event, stamping it with the current time
    pub fn from_raw(raw: RawEvent) -> Event {
        let when = since_start();
        match raw {
            RawEvent::Close => Event::Close(CloseEvent { when }),
            RawEvent::MouseMoved { at, from } => Event::MouseMoved(MouseMotionEvent {
                when,
                loc: to_point(at),
                from: to_point(from),
            }),
            RawEvent::MouseDragged { at, from, button } => Event::MouseDragged(MouseDragEvent {
                when,
                loc: to_point(at),
                from: to_point(from),
                button,
            }),
            RawEvent::MouseDown { at, button } => Event::MouseDown(MouseButtonEvent {
                when,
                loc: to_point(at),
                button,
            }),
            RawEvent::MouseUp { at, button } => Event::MouseUp(MouseButtonEvent {
                when,
                loc: to_point(at),
                button,
            }),
            RawEvent::MouseEntered { at, from } => Event::MouseEntered(MouseCrossingEvent {
                when,
                loc: to_point(at),
                from: to_point(from),
            }),
            RawEvent::MouseExited { at, from } => Event::MouseExited(MouseCrossingEvent {
                when,
                loc: to_point(at),
                from: to_point(from),
            }),
            RawEvent::KeyDown(KeyboardEvent { key, modifiers }) => Event::KeyDown(KeyEvent {
                when,
                key,
                modifiers,
            }),
            RawEvent::KeyUp(KeyboardEvent { key, modifiers }) => Event::KeyUp(KeyEvent {
                when,
                key,
                modifiers,
            }),
            RawEvent::KeyTyped {
                key,
                glyph,
                modifiers,
            } => Event::KeyTyped(KeyTypedEvent {
                when,
                key,
                glyph,
                modifiers,
            }),
            RawEvent::Resize { width, height } => Event::Resize(ResizeEvent {
                size: Size::new(width as f32, height as f32),
            }),
        }
    }
}

fn to_point(p: PhysicalPosition) -> Point {
    Point::new(p.x as f32, p.y as f32)
}

// ─────────────────────────────────────────────────────────────────────────────
// Upward notifications
// ─────────────────────────────────────────────────────────────────────────────

/// Minimum, preferred and maximum size a block reports to its parent
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SizeHint {
    pub min: Size,
    pub preferred: Size,
    pub max: Size,
}

impl SizeHint {
    pub const fn new(min: Size, preferred: Size, max: Size) -> Self {
        Self {
            min,
            preferred,
            max,
        }
    }

    /// A hint with all three sizes equal
    pub const fn fixed(size: Size) -> Self {
        Self::new(size, size, size)
    }
}

impl Coalesce for SizeHint {
    fn coalesce(self, newer: Self) -> Self {
        newer
    }
}

/// Damaged regions in the invalidating block's own space
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Invalidation {
    pub bounds: RectSet,
}

impl Coalesce for Invalidation {
    fn coalesce(mut self, newer: Self) -> Self {
        self.bounds.merge(newer.bounds);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Rect;

    #[test]
    fn test_localized_mouse_event() {
        let e = MouseButtonEvent {
            when: Duration::ZERO,
            loc: Point::new(15.0, 12.0),
            button: MouseButton::Left,
        };
        let local = e.localized(Point::new(10.0, 10.0));
        assert_eq!(local.loc, Point::new(5.0, 2.0));
        assert_eq!(local.button, MouseButton::Left);
    }

    #[test]
    fn test_from_raw_converts_coordinates() {
        let e = Event::from_raw(RawEvent::MouseDragged {
            at: PhysicalPosition::new(4, 5),
            from: PhysicalPosition::new(1, 2),
            button: MouseButton::Right,
        });
        match e {
            Event::MouseDragged(e) => {
                assert_eq!(e.loc, Point::new(4.0, 5.0));
                assert_eq!(e.from, Point::new(1.0, 2.0));
                assert_eq!(e.button, MouseButton::Right);
            }
            other => panic!("unexpected event {other:?}"),
        }

        let e = Event::from_raw(RawEvent::Resize {
            width: 30,
            height: 20,
        });
        assert!(matches!(e, Event::Resize(ResizeEvent { size }) if size == Size::new(30.0, 20.0)));
    }

    #[test]
    fn test_invalidations_coalesce_by_union() {
        let a = Invalidation {
            bounds: RectSet::from_rect(Rect::new(0.0, 0.0, 5.0, 5.0)),
        };
        let b = Invalidation {
            bounds: RectSet::from_rect(Rect::new(10.0, 0.0, 5.0, 5.0)),
        };
        let merged = a.coalesce(b);
        assert_eq!(merged.bounds.len(), 2);
    }

    #[test]
    fn test_timestamps_are_monotonic() {
        let a = since_start();
        let b = since_start();
        assert!(b >= a);
    }
}
