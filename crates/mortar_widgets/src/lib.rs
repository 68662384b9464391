//! Mortar Widgets
//!
//! Small interactive blocks built only on the public block contracts. Each
//! widget owns a [`Block`](mortar_core::Block), runs its own loop, and
//! repaints by swapping in a paint callback that captures its current look.
//! [`Radio`] is the exception: it is a foundation that lays out buttons with
//! a grid.

pub mod button;
pub mod checkbox;
pub mod keygrab;
pub mod picture;
pub mod radio;

pub use button::{Button, ButtonCommand, ButtonConfig, ButtonHandle, Clicker};
pub use checkbox::{Checkbox, CheckboxHandle};
pub use keygrab::{KeyGrab, KeyGrabHandle};
pub use picture::{Image, ImageConfig, ImageHandle};
pub use radio::{Radio, RadioCommand, RadioHandle};
