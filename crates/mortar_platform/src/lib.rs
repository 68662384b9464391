//! Mortar Platform Abstraction Layer
//!
//! This crate defines the contract between the Mortar block runtime and a
//! windowing backend: creating windows, exposing their screen buffer, and
//! delivering raw input events.
//!
//! # Architecture
//!
//! The contract is built around two traits:
//!
//! - [`Platform`] - creates windows
//! - [`Window`] - a screen buffer plus a stream of [`RawEvent`]s
//!
//! Coordinates in raw events are integer window pixels. The block runtime
//! converts them into its own floating point event types.
//!
//! # Backends
//!
//! - [`headless`] - in-memory windows, used by tests and demos
//!
//! # Example
//!
//! ```ignore
//! use mortar_platform::prelude::*;
//! use mortar_platform::headless::HeadlessPlatform;
//!
//! let platform = HeadlessPlatform::new();
//! let window = platform.create_window(None, &WindowConfig::new("demo").size(320, 240))?;
//! let mut events = window.take_events().expect("first caller gets the stream");
//! window.show();
//! ```

mod error;
mod event;
mod input;
mod platform;
mod window;

#[cfg(feature = "headless")]
pub mod headless;

// Re-export all public types
pub use error::{PlatformError, Result};
pub use event::{EventStream, PhysicalPosition, RawEvent};
pub use input::{Key, KeyboardEvent, Modifiers, MouseButton};
pub use platform::Platform;
pub use window::{Screen, Window, WindowConfig};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{PlatformError, Result};
    pub use crate::event::{EventStream, PhysicalPosition, RawEvent};
    pub use crate::input::{Key, KeyboardEvent, Modifiers, MouseButton};
    pub use crate::platform::Platform;
    pub use crate::window::{Screen, Window, WindowConfig};
}
