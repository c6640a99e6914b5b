//! Transport error types.

use logger_wire::DecodeError;
use thiserror::Error;

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// I/O error on the underlying device
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port could not be opened or configured
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Frame decoder misconfigured
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Operation requires an open device
    #[error("transport not open")]
    NotOpen,
}
