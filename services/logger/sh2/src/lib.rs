//! Minimal SH-2 sensor hub protocol session.
//!
//! Implements the subset of SHTP and SH-2 the logger needs: packet headers,
//! the executable-channel reset notification, product ID queries, feature
//! (sensor rate) configuration, a handful of calibration commands, flash
//! record reads and erases, and the decoding of sensor input reports into
//! engineering units.
//!
//! ## Packet Format
//!
//! ```text
//! +--------+--------+---------+----------+------------------+
//! | len lo | len hi | channel | sequence | payload ...      |
//! +--------+--------+---------+----------+------------------+
//!   len includes the 4-byte header, bit 15 marks a continuation
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod control;
pub mod error;
pub mod frs;
pub mod hub;
pub mod sensor;
pub mod shtp;

// Re-export main types
pub use control::{
    CalEnable, CommandResponse, FeatureFlags, FrsReadResponse, FrsReadStatus, FrsWriteResponse,
    ProductId, ResetCause, SensorConfig,
};
pub use error::Sh2Error;
pub use hub::{AsyncEvent, HubConfig, HubEvent, Sh2Hub};
pub use sensor::{Quaternion, RawVector, SensorData, SensorId, SensorValue, Vec3};
pub use shtp::{Channel, ShtpHeader, ShtpSequencer, SHTP_HEADER_SIZE};
