//! Mortar Core
//!
//! The block runtime: every widget is a [`Block`] running on its own task,
//! and containers are [`Foundation`]s that hit-test, route and composite
//! their children. Blocks talk to each other only through channels:
//!
//! - send-or-drop event queues for discrete input ([`EventSender`])
//! - single-slot coalescing [`Mailbox`]es for state that only matters in its
//!   latest form (size hints, damage, placement, resizes)
//!
//! Damage flows up the tree one level at a time, translated into each
//! parent's space. Drawing flows down, and a child whose bounds miss the
//! damaged region is composited from its cached buffer without redrawing.
//!
//! # Example
//!
//! ```ignore
//! use mortar_core::prelude::*;
//!
//! let mut root = Foundation::new();
//! let child = Block::new();
//! root.place_block(child.handle(), Rect::new(10.0, 10.0, 50.0, 30.0));
//! child.spawn();
//! root.spawn();
//! ```

pub mod block;
pub mod canvas;
pub mod config;
pub mod event;
pub mod foundation;
pub mod geom;
pub mod mailbox;
pub mod subscription;

pub use block::{
    blit, clear_paint, Block, BlockHandle, BlockId, BlockMessage, DrawOp, DrawTarget, Drawer,
    PaintDrawer, PaintFn,
};
pub use canvas::{pixel_span, zero_region, Canvas, Color};
pub use config::RuntimeConfig;
pub use event::{
    since_start, CloseEvent, Event, Invalidation, KeyEvent, KeyFocusEvent, KeyFocusRequest,
    KeyTypedEvent, Localize, MouseButtonEvent, MouseCrossingEvent, MouseDragEvent,
    MouseMotionEvent, ResizeEvent, SizeHint,
};
pub use foundation::{
    BlockInvalidation, BlockSizeHint, Control, Foundation, FoundationHandle, FoundationMessage,
};
pub use geom::{Point, Rect, RectSet, Size};
pub use mailbox::{Coalesce, Mailbox};
pub use subscription::{subscription_queue, EventQueue, EventSender, Filter, Subscription, Verdict};

pub use mortar_platform::{Key, Modifiers, MouseButton};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::block::{Block, BlockHandle, BlockId, DrawOp, Drawer};
    pub use crate::canvas::{Canvas, Color};
    pub use crate::config::RuntimeConfig;
    pub use crate::event::{Event, SizeHint};
    pub use crate::foundation::{Foundation, FoundationHandle, FoundationMessage};
    pub use crate::geom::{Point, Rect, RectSet, Size};
    pub use crate::subscription::Verdict;
    pub use mortar_platform::{Key, MouseButton};
}
