//! Error types for rs232-bridge

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using rs232-bridge Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while bridging the emulated serial port.
///
/// None of these are fatal: the emulator is expected to present any of them
/// to the guest as "no cable attached".
#[derive(Error, Debug)]
pub enum Error {
    /// The host device could not be opened
    #[error("failed to open RS-232 device {}: {source}", .path.display())]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// RS-232 is disabled in the configuration
    #[error("RS-232 is disabled")]
    Disabled,

    /// Operation needs an open host endpoint
    #[error("RS-232 is not connected")]
    NotConnected,

    /// Read requested while no input is buffered
    #[error("RS-232 input buffer is empty")]
    BufferUnderflow,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors on an open endpoint
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reader thread errors
    #[error("Reader thread error: {0}")]
    Thread(String),
}
