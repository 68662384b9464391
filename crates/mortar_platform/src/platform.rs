//! Platform trait

use crate::error::PlatformError;
use crate::window::{Window, WindowConfig};

/// Platform abstraction trait
///
/// Implemented by each windowing backend to give the block runtime a way to
/// open windows without knowing which system draws them.
pub trait Platform: Send + Sync {
    /// The window type for this platform
    type Window: Window;

    /// Create a window
    ///
    /// `parent` is an optional owning window; backends that have no notion
    /// of window ownership ignore it.
    fn create_window(
        &self,
        parent: Option<&Self::Window>,
        config: &WindowConfig,
    ) -> Result<Self::Window, PlatformError>;

    /// Get the platform name
    fn name(&self) -> &'static str;
}
