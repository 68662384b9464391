//! Error types for mortar_app

use mortar_platform::PlatformError;
use thiserror::Error;

/// Errors that can occur while setting up a window
#[derive(Error, Debug)]
pub enum AppError {
    /// The windowing backend failed
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Windows spawn tasks and must be opened inside a tokio runtime
    #[error("no tokio runtime is running")]
    NoRuntime,
}

/// Result type for mortar_app operations
pub type Result<T> = std::result::Result<T, AppError>;
