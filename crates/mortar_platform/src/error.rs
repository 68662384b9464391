//! Platform error types

use thiserror::Error;

/// Platform-related errors
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Failed to create a window
    #[error("Failed to create window: {0}")]
    WindowCreation(String),

    /// The window has already been closed
    #[error("Window closed")]
    Closed,
}

/// Result type for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;
