//! Error types for the backlight controller.

use crate::port::OsStatus;

/// Errors that can occur when opening or using the backlight controller.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The keyboard backlight driver is not registered with the OS.
    #[error("Backlight driver service not found")]
    ServiceNotFound,

    /// The driver refused the privileged user-client connection.
    #[error("Failed to open driver connection (status code: {0})")]
    ConnectionFailed(OsStatus),

    /// A system framework backing the native port failed to load.
    #[error("Failed to load system framework: {0}")]
    FrameworkLoad(#[from] libloading::Error),

    /// The operation is declared by the driver protocol but has no
    /// implementation in this crate.
    #[error("Operation not implemented: {0}")]
    Unimplemented(&'static str),
}
