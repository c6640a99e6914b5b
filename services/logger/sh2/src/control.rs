//! SH-2 control channel messages.

use crate::error::Sh2Error;
use bitflags::bitflags;
use bytes::{Buf, BufMut, BytesMut};
use std::fmt;

/// FRS read response
pub const FRS_READ_RESP: u8 = 0xF3;
/// FRS read request
pub const FRS_READ_REQ: u8 = 0xF4;
/// FRS write response
pub const FRS_WRITE_RESP: u8 = 0xF5;
/// FRS write request
pub const FRS_WRITE_REQ: u8 = 0xF7;
/// Command response
pub const COMMAND_RESP: u8 = 0xF1;
/// Command request
pub const COMMAND_REQ: u8 = 0xF2;
/// Timestamp rebase record
pub const TIMESTAMP_REBASE: u8 = 0xFA;
/// Base timestamp record
pub const BASE_TIMESTAMP: u8 = 0xFB;
/// Get feature response
pub const GET_FEATURE_RESP: u8 = 0xFC;
/// Set feature command
pub const SET_FEATURE: u8 = 0xFD;
/// Product ID response
pub const PROD_ID_RESP: u8 = 0xF8;
/// Product ID request
pub const PROD_ID_REQ: u8 = 0xF9;

/// Motion engine calibration command
pub const CMD_ME_CALIBRATE: u8 = 0x07;
/// DCD auto-save command
pub const CMD_DCD_PERIODIC_SAVE: u8 = 0x09;
/// Clear DCD and reset command
pub const CMD_CLEAR_DCD_RESET: u8 = 0x0B;

const SET_FEATURE_LEN: usize = 17;
const COMMAND_REQ_LEN: usize = 12;
const COMMAND_RESP_LEN: usize = 16;
const PROD_ID_RESP_LEN: usize = 16;
const FRS_READ_REQ_LEN: usize = 8;
const FRS_READ_RESP_LEN: usize = 16;
const FRS_WRITE_REQ_LEN: usize = 6;
const FRS_WRITE_RESP_LEN: usize = 4;
const COMMAND_PARAMS: usize = 9;
const ME_CAL_CONFIG: u8 = 0x00;

bitflags! {
    /// Motion engine calibration enables
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CalEnable: u8 {
        /// Accelerometer calibration
        const ACCEL = 0x01;
        /// Gyroscope calibration
        const GYRO = 0x02;
        /// Magnetometer calibration
        const MAG = 0x04;
        /// Planar accelerometer calibration
        const PLANAR = 0x08;
    }
}

impl Default for CalEnable {
    fn default() -> Self {
        CalEnable::PLANAR
    }
}

bitflags! {
    /// Set Feature flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FeatureFlags: u8 {
        /// Change sensitivity is relative
        const CHANGE_SENSITIVITY_RELATIVE = 0x01;
        /// Report only on change
        const CHANGE_SENSITIVITY_ENABLED = 0x02;
        /// Wake the host on report
        const WAKEUP_ENABLED = 0x04;
        /// Keep running while the host sleeps
        const ALWAYS_ON_ENABLED = 0x08;
    }
}

/// Sensor rate and reporting configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorConfig {
    /// Feature flags
    pub flags: FeatureFlags,
    /// Change threshold when change sensitivity is enabled
    pub change_sensitivity: u16,
    /// Report interval in microseconds, 0 disables the sensor
    pub report_interval_us: u32,
    /// Batch interval in microseconds
    pub batch_interval_us: u32,
    /// Sensor specific configuration word
    pub sensor_specific: u32,
}

impl SensorConfig {
    /// Configuration that turns a sensor off
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Encode a Set Feature command for `sensor_id`
    pub fn encode(&self, sensor_id: u8, dst: &mut BytesMut) {
        dst.reserve(SET_FEATURE_LEN);
        dst.put_u8(SET_FEATURE);
        dst.put_u8(sensor_id);
        dst.put_u8(self.flags.bits());
        dst.put_u16_le(self.change_sensitivity);
        dst.put_u32_le(self.report_interval_us);
        dst.put_u32_le(self.batch_interval_us);
        dst.put_u32_le(self.sensor_specific);
    }
}

/// Encode a command request
pub fn encode_command(seq: u8, command: u8, params: &[u8], dst: &mut BytesMut) {
    dst.reserve(COMMAND_REQ_LEN);
    dst.put_u8(COMMAND_REQ);
    dst.put_u8(seq);
    dst.put_u8(command);
    let mut p = [0u8; COMMAND_PARAMS];
    let n = params.len().min(COMMAND_PARAMS);
    p[..n].copy_from_slice(&params[..n]);
    dst.put_slice(&p);
}

/// Parameters of the calibration configure command
pub fn cal_config_params(enable: CalEnable) -> [u8; 5] {
    [
        enable.contains(CalEnable::ACCEL) as u8,
        enable.contains(CalEnable::GYRO) as u8,
        enable.contains(CalEnable::MAG) as u8,
        ME_CAL_CONFIG,
        enable.contains(CalEnable::PLANAR) as u8,
    ]
}

/// Response to a command request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandResponse {
    /// Response sequence number
    pub seq: u8,
    /// Command id, unsolicited bit removed
    pub command: u8,
    /// Sequence number of the request this answers
    pub command_seq: u8,
    /// Response sequence within a multi-part response
    pub response_seq: u8,
    /// Response words R0..R10
    pub response: [u8; 11],
}

impl CommandResponse {
    /// Parse a command response
    pub fn parse(buf: &[u8]) -> Result<Self, Sh2Error> {
        if buf.len() < COMMAND_RESP_LEN || buf[0] != COMMAND_RESP {
            return Err(Sh2Error::ShortPacket(buf.len()));
        }
        let mut buf = &buf[1..COMMAND_RESP_LEN];
        let seq = buf.get_u8();
        let command = buf.get_u8() & 0x7F;
        let command_seq = buf.get_u8();
        let response_seq = buf.get_u8();
        let mut response = [0u8; 11];
        buf.copy_to_slice(&mut response);
        Ok(Self {
            seq,
            command,
            command_seq,
            response_seq,
            response,
        })
    }

    /// Status word R0
    pub fn status(&self) -> u8 {
        self.response[0]
    }
}

/// Request to read a flash record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrsReadRequest {
    /// First word to read
    pub offset: u16,
    /// Record type
    pub frs_type: u16,
    /// Words to read, 0 for the whole record
    pub block_size: u16,
}

impl FrsReadRequest {
    /// Read a whole record
    pub fn record(frs_type: u16) -> Self {
        Self {
            offset: 0,
            frs_type,
            block_size: 0,
        }
    }

    /// Encode the request
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(FRS_READ_REQ_LEN);
        dst.put_u8(FRS_READ_REQ);
        dst.put_u8(0);
        dst.put_u16_le(self.offset);
        dst.put_u16_le(self.frs_type);
        dst.put_u16_le(self.block_size);
    }
}

/// Status of an FRS read response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrsReadStatus {
    /// Data follows, more to come
    Ok,
    /// Record type not known to the hub
    UnrecognizedType,
    /// Hub busy
    Busy,
    /// Last words of the record
    RecordCompleted,
    /// Offset past the end of the record
    OffsetOutOfRange,
    /// Record holds no data
    RecordEmpty,
    /// Last words of the requested block
    BlockCompleted,
    /// Last words of both block and record
    BlockAndRecordCompleted,
    /// Flash access failed
    DeviceError,
    /// Value outside the documented set
    Unknown(u8),
}

impl From<u8> for FrsReadStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => FrsReadStatus::Ok,
            1 => FrsReadStatus::UnrecognizedType,
            2 => FrsReadStatus::Busy,
            3 => FrsReadStatus::RecordCompleted,
            4 => FrsReadStatus::OffsetOutOfRange,
            5 => FrsReadStatus::RecordEmpty,
            6 => FrsReadStatus::BlockCompleted,
            7 => FrsReadStatus::BlockAndRecordCompleted,
            8 => FrsReadStatus::DeviceError,
            v => FrsReadStatus::Unknown(v),
        }
    }
}

impl FrsReadStatus {
    /// Raw status nibble
    pub fn code(self) -> u8 {
        match self {
            FrsReadStatus::Ok => 0,
            FrsReadStatus::UnrecognizedType => 1,
            FrsReadStatus::Busy => 2,
            FrsReadStatus::RecordCompleted => 3,
            FrsReadStatus::OffsetOutOfRange => 4,
            FrsReadStatus::RecordEmpty => 5,
            FrsReadStatus::BlockCompleted => 6,
            FrsReadStatus::BlockAndRecordCompleted => 7,
            FrsReadStatus::DeviceError => 8,
            FrsReadStatus::Unknown(v) => v,
        }
    }

    /// Whether the read stopped with an error
    pub fn is_error(self) -> bool {
        matches!(
            self,
            FrsReadStatus::UnrecognizedType
                | FrsReadStatus::Busy
                | FrsReadStatus::OffsetOutOfRange
                | FrsReadStatus::DeviceError
                | FrsReadStatus::Unknown(_)
        )
    }

    /// Whether this response carries the last words of the read
    pub fn is_last(self) -> bool {
        matches!(
            self,
            FrsReadStatus::RecordCompleted
                | FrsReadStatus::BlockCompleted
                | FrsReadStatus::BlockAndRecordCompleted
        )
    }
}

/// Up to two words of a flash record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrsReadResponse {
    /// Valid words in `data`
    pub data_len: u8,
    /// Read status
    pub status: FrsReadStatus,
    /// Word offset of `data[0]` in the record
    pub offset: u16,
    /// Record words
    pub data: [u32; 2],
    /// Record type
    pub frs_type: u16,
}

impl FrsReadResponse {
    /// Parse an FRS read response
    pub fn parse(buf: &[u8]) -> Result<Self, Sh2Error> {
        if buf.len() < FRS_READ_RESP_LEN || buf[0] != FRS_READ_RESP {
            return Err(Sh2Error::ShortPacket(buf.len()));
        }
        let mut buf = &buf[1..FRS_READ_RESP_LEN];
        let len_status = buf.get_u8();
        Ok(Self {
            data_len: (len_status >> 4).min(2),
            status: FrsReadStatus::from(len_status & 0x0F),
            offset: buf.get_u16_le(),
            data: [buf.get_u32_le(), buf.get_u32_le()],
            frs_type: buf.get_u16_le(),
        })
    }

    /// Valid record words
    pub fn words(&self) -> &[u32] {
        &self.data[..self.data_len as usize]
    }
}

/// Encode an FRS write request announcing `words` words for `frs_type`.
///
/// Zero words erases the record.
pub fn encode_frs_write(frs_type: u16, words: u16, dst: &mut BytesMut) {
    dst.reserve(FRS_WRITE_REQ_LEN);
    dst.put_u8(FRS_WRITE_REQ);
    dst.put_u8(0);
    dst.put_u16_le(words);
    dst.put_u16_le(frs_type);
}

/// Write completed
pub const FRS_WRITE_COMPLETED: u8 = 3;
/// Record passed validation
pub const FRS_WRITE_RECORD_VALID: u8 = 8;

/// Answer to an FRS write request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrsWriteResponse {
    /// Write status
    pub status: u8,
    /// Word offset the status refers to
    pub offset: u16,
}

impl FrsWriteResponse {
    /// Parse an FRS write response
    pub fn parse(buf: &[u8]) -> Result<Self, Sh2Error> {
        if buf.len() < FRS_WRITE_RESP_LEN || buf[0] != FRS_WRITE_RESP {
            return Err(Sh2Error::ShortPacket(buf.len()));
        }
        let mut buf = &buf[1..FRS_WRITE_RESP_LEN];
        Ok(Self {
            status: buf.get_u8(),
            offset: buf.get_u16_le(),
        })
    }
}

/// Cause of the last hub reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCause {
    /// Not applicable
    NotApplicable,
    /// Power-on reset
    PowerOnReset,
    /// Internal system reset
    InternalSystemReset,
    /// Watchdog timeout
    WatchdogTimeout,
    /// External reset
    ExternalReset,
    /// Other cause
    Other,
    /// Value outside the documented set
    Unknown(u8),
}

impl From<u8> for ResetCause {
    fn from(value: u8) -> Self {
        match value {
            0 => ResetCause::NotApplicable,
            1 => ResetCause::PowerOnReset,
            2 => ResetCause::InternalSystemReset,
            3 => ResetCause::WatchdogTimeout,
            4 => ResetCause::ExternalReset,
            5 => ResetCause::Other,
            v => ResetCause::Unknown(v),
        }
    }
}

impl ResetCause {
    /// Name for log output, `None` when there is nothing to report
    pub fn name(self) -> Option<&'static str> {
        match self {
            ResetCause::PowerOnReset => Some("PowerOnReset"),
            ResetCause::InternalSystemReset => Some("InternalSystemReset"),
            ResetCause::WatchdogTimeout => Some("WatchdogTimeout"),
            ResetCause::ExternalReset => Some("ExternalReset"),
            ResetCause::Other => Some("Other"),
            ResetCause::NotApplicable | ResetCause::Unknown(_) => None,
        }
    }
}

/// One product ID entry, describing one firmware component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductId {
    /// Reset cause, only meaningful on the first entry
    pub reset_cause: ResetCause,
    /// Major version
    pub version_major: u8,
    /// Minor version
    pub version_minor: u8,
    /// Part number
    pub part_number: u32,
    /// Build number
    pub build_number: u32,
    /// Patch version
    pub version_patch: u16,
}

impl ProductId {
    /// Parse a product ID response
    pub fn parse(buf: &[u8]) -> Result<Self, Sh2Error> {
        if buf.len() < PROD_ID_RESP_LEN || buf[0] != PROD_ID_RESP {
            return Err(Sh2Error::ShortPacket(buf.len()));
        }
        let mut buf = &buf[1..PROD_ID_RESP_LEN];
        Ok(Self {
            reset_cause: ResetCause::from(buf.get_u8()),
            version_major: buf.get_u8(),
            version_minor: buf.get_u8(),
            part_number: buf.get_u32_le(),
            build_number: buf.get_u32_le(),
            version_patch: buf.get_u16_le(),
        })
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{}.{}.{}",
            self.part_number,
            self.version_major,
            self.version_minor,
            self.build_number,
            self.version_patch
        )
    }
}
