//! Serial device access, clock service and message assembly for the sensor hub link.
//!
//! This crate sits between a raw duplex byte device and the sensor hub
//! protocol. It pushes received bytes through the RFC1662 decoder, hands
//! complete messages up one at a time with a capture timestamp, and frames
//! outgoing messages with the paced, byte-at-a-time write the hub requires.
//!
//! ## Features
//!
//! - **Device Abstraction**: [`ByteDevice`] capability trait with a
//!   `serialport` backend and an in-memory [`MockDevice`]
//! - **Clock Service**: monotonic microseconds since first use
//! - **Message Assembly**: batched decode, per-batch timestamps, header strip
//! - **Paced Writes**: minimum spacing between transmitted bytes
//!
//! ## Example
//!
//! ```rust,no_run
//! use logger_transport::{HubTransport, MonotonicClock, SerialConfig, SerialDevice, TransportConfig};
//!
//! # fn example() -> Result<(), logger_transport::TransportError> {
//! let device = SerialDevice::new(SerialConfig::for_device_number(0));
//! let mut transport = HubTransport::new(device, MonotonicClock::new(), TransportConfig::default());
//! transport.open()?;
//!
//! loop {
//!     if let Some(message) = transport.read_message()? {
//!         println!("{} bytes at {} us", message.payload.len(), message.timestamp_us);
//!     }
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod device;
pub mod driver;
pub mod error;
pub mod serial;

// Re-export main types
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use device::{ByteDevice, MockDevice};
pub use driver::{
    HubLink, HubTransport, Message, TransportConfig, TransportStats, BYTE_TX_MIN_SPACING,
    READ_CHUNK_SIZE, SOFT_RESET_PACKET,
};
pub use error::TransportError;
pub use serial::{default_port_path, SerialConfig, SerialDevice, DEFAULT_BAUD_RATE};
