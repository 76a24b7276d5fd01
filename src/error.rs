//! Error types for sysrec
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that tell the user what to check next.

use thiserror::Error;

/// Top-level error type for the sysrec application
#[derive(Error, Debug)]
pub enum SysrecError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audio device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to audio devices and the capture lifecycle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Capture device not found. Install a loopback device (e.g. BlackHole) or pass --device <INDEX>. List devices with: sysrec devices")]
    NoDeviceAvailable,

    #[error("Failed to open audio device: {0}")]
    OpenFailed(String),

    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("No recording in progress")]
    NotRecording,

    #[error("No audio was captured. Check that the device is receiving sound.")]
    EmptyRecording,
}

/// Errors related to writing the container and the compressed file
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Failed to write audio file: {0}")]
    WriteFailed(String),

    #[error("Failed to read audio file: {0}")]
    ReadFailed(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("No space left on device while writing audio")]
    FilesystemFull,
}

impl EncodeError {
    /// Classify an I/O error raised while writing output
    pub fn from_write(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::StorageFull {
            EncodeError::FilesystemFull
        } else {
            EncodeError::WriteFailed(e.to_string())
        }
    }
}

/// Result type alias using SysrecError
pub type Result<T> = std::result::Result<T, SysrecError>;
