//! Mortar App
//!
//! Binds a block tree to a platform window. Open a window with
//! [`WindowFoundation::open`], give it a pane, and the window keeps the
//! screen in sync with the pane's damage at a bounded frame rate.
//!
//! # Example
//!
//! ```ignore
//! use mortar_app::prelude::*;
//! use mortar_platform::headless::HeadlessPlatform;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let window = WindowFoundation::open(&HeadlessPlatform::new(), None, &AppConfig::from_env())?;
//!     let pane = Block::new();
//!     window.set_pane(pane.handle());
//!     pane.spawn();
//!     window.show();
//!     window.wait_closed().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod window;

pub use config::{AppConfig, FRAME_DELAY_ENV};
pub use error::{AppError, Result};
pub use window::{WindowFoundation, WindowHandle};

pub use mortar_platform::WindowConfig;

/// Prelude module - import everything commonly needed
pub mod prelude {
    pub use crate::config::AppConfig;
    pub use crate::error::{AppError, Result};
    pub use crate::window::{WindowFoundation, WindowHandle};
    pub use mortar_core::prelude::*;
    pub use mortar_platform::WindowConfig;
}
