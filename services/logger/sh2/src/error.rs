//! Sensor hub protocol errors.

use logger_transport::TransportError;
use thiserror::Error;

/// Protocol errors
#[derive(Error, Debug)]
pub enum Sh2Error {
    /// Link failure
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Packet shorter than its header claims or requires
    #[error("packet too short: {0} bytes")]
    ShortPacket(usize),

    /// Channel number outside the known set
    #[error("unknown SHTP channel {0}")]
    UnknownChannel(u8),

    /// Report id that has no decoder
    #[error("unknown sensor id 0x{0:02x}")]
    UnknownSensor(u8),

    /// Sensor report shorter than its fixed length
    #[error("report 0x{id:02x} truncated to {len} bytes")]
    ShortReport {
        /// Report id
        id: u8,
        /// Bytes available
        len: usize,
    },

    /// No answer before the deadline
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// Hub refused a flash record read or write
    #[error("FRS record 0x{frs_type:04x} failed with status {status}")]
    FrsFailed {
        /// Record type
        frs_type: u16,
        /// Status from the response
        status: u8,
    },

    /// Hub rejected a command
    #[error("command 0x{command:02x} failed with status {status}")]
    CommandFailed {
        /// Command id
        command: u8,
        /// Status byte from the response
        status: u8,
    },
}
