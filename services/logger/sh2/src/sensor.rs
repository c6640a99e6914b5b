//! Sensor input reports.
//!
//! Every report on the input channels starts with the same 4-byte prefix:
//!
//! ```text
//! +-----------+----------+--------+-------+------------------+
//! | report id | sequence | status | delay | sensor data ...  |
//! +-----------+----------+--------+-------+------------------+
//!   status bits 1:0 = accuracy, bits 7:2 = delay bits 13:8
//!   delay is in 100 us units relative to the packet timebase
//! ```
//!
//! Fixed-point values are scaled by 2^-Q, with Q depending on the sensor.

use crate::error::Sh2Error;
use bytes::Buf;

const REPORT_PREFIX_SIZE: usize = 4;

/// Size of a gyro-integrated rotation vector record on its own channel
pub const GYRO_RV_RECORD_SIZE: usize = 14;

const Q_ACCEL: i32 = 8;
const Q_GYRO: i32 = 9;
const Q_MAG: i32 = 4;
const Q_QUAT: i32 = 14;
const Q_ACCURACY: i32 = 12;
const Q_ANG_VEL: i32 = 10;

/// Sensors the logger can decode
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SensorId {
    /// Calibrated accelerometer
    Accelerometer = 0x01,
    /// Calibrated gyroscope
    GyroscopeCalibrated = 0x02,
    /// Calibrated magnetic field
    MagneticFieldCalibrated = 0x03,
    /// Linear acceleration
    LinearAcceleration = 0x04,
    /// Rotation vector
    RotationVector = 0x05,
    /// Gravity
    Gravity = 0x06,
    /// Uncalibrated gyroscope with bias
    GyroscopeUncalibrated = 0x07,
    /// Game rotation vector
    GameRotationVector = 0x08,
    /// Geomagnetic rotation vector
    GeomagneticRotationVector = 0x09,
    /// Uncalibrated magnetic field with bias
    MagneticFieldUncalibrated = 0x0F,
    /// Raw accelerometer
    RawAccelerometer = 0x14,
    /// Raw gyroscope
    RawGyroscope = 0x15,
    /// Raw magnetometer
    RawMagnetometer = 0x16,
    /// Step detector
    StepDetector = 0x18,
    /// Personal activity classifier
    PersonalActivityClassifier = 0x1E,
    /// Gyro-integrated rotation vector
    GyroIntegratedRv = 0x2A,
}

impl TryFrom<u8> for SensorId {
    type Error = Sh2Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(SensorId::Accelerometer),
            0x02 => Ok(SensorId::GyroscopeCalibrated),
            0x03 => Ok(SensorId::MagneticFieldCalibrated),
            0x04 => Ok(SensorId::LinearAcceleration),
            0x05 => Ok(SensorId::RotationVector),
            0x06 => Ok(SensorId::Gravity),
            0x07 => Ok(SensorId::GyroscopeUncalibrated),
            0x08 => Ok(SensorId::GameRotationVector),
            0x09 => Ok(SensorId::GeomagneticRotationVector),
            0x0F => Ok(SensorId::MagneticFieldUncalibrated),
            0x14 => Ok(SensorId::RawAccelerometer),
            0x15 => Ok(SensorId::RawGyroscope),
            0x16 => Ok(SensorId::RawMagnetometer),
            0x18 => Ok(SensorId::StepDetector),
            0x1E => Ok(SensorId::PersonalActivityClassifier),
            0x2A => Ok(SensorId::GyroIntegratedRv),
            _ => Err(Sh2Error::UnknownSensor(value)),
        }
    }
}

impl SensorId {
    /// Report id on the wire
    pub fn id(self) -> u8 {
        self as u8
    }
}

/// Length of an input report, prefix included, for every id the hub may send
/// on the report channels. `None` ends parsing of the packet.
pub fn report_len(id: u8) -> Option<usize> {
    let len = match id {
        0x01..=0x04 | 0x06 => 10,
        0x05 | 0x09 | 0x28 => 14,
        0x07 | 0x0F | 0x14..=0x16 | 0x1E => 16,
        0x08 | 0x11 | 0x29 => 12,
        0x0A | 0x0B | 0x18 => 8,
        0x0C..=0x0E | 0x12 | 0x13 | 0x19..=0x1C | 0x1F..=0x23 => 6,
        0x10 => 5,
        _ => return None,
    };
    Some(len)
}

/// Three-axis value in engineering units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    /// X axis
    pub x: f32,
    /// Y axis
    pub y: f32,
    /// Z axis
    pub z: f32,
}

/// Unit quaternion
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Quaternion {
    /// Real part
    pub real: f32,
    /// i component
    pub i: f32,
    /// j component
    pub j: f32,
    /// k component
    pub k: f32,
}

/// Raw ADC sample with the sensor's own timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawVector {
    /// X axis counts
    pub x: i16,
    /// Y axis counts
    pub y: i16,
    /// Z axis counts
    pub z: i16,
    /// Sample time in microseconds
    pub timestamp_us: u32,
}

/// Decoded sensor data
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorData {
    /// m/s^2
    Accelerometer(Vec3),
    /// m/s^2
    LinearAcceleration(Vec3),
    /// m/s^2
    Gravity(Vec3),
    /// rad/s
    Gyroscope(Vec3),
    /// rad/s
    GyroscopeUncalibrated {
        /// Uncorrected angular velocity
        velocity: Vec3,
        /// Estimated bias
        bias: Vec3,
    },
    /// uTesla
    MagneticField(Vec3),
    /// uTesla
    MagneticFieldUncalibrated {
        /// Uncorrected field
        field: Vec3,
        /// Estimated hard-iron bias
        bias: Vec3,
    },
    /// Rotation vector with heading accuracy in radians
    RotationVector {
        /// Orientation
        quat: Quaternion,
        /// Heading accuracy estimate
        accuracy: f32,
    },
    /// Game rotation vector
    GameRotationVector(Quaternion),
    /// Geomagnetic rotation vector with heading accuracy in radians
    GeomagneticRotationVector {
        /// Orientation
        quat: Quaternion,
        /// Heading accuracy estimate
        accuracy: f32,
    },
    /// Gyro-integrated rotation vector
    GyroIntegratedRv {
        /// Orientation
        quat: Quaternion,
        /// rad/s
        angular_velocity: Vec3,
    },
    /// ADC counts
    RawAccelerometer(RawVector),
    /// ADC counts
    RawGyroscope {
        /// Angular rate counts
        raw: RawVector,
        /// Temperature counts
        temperature: i16,
    },
    /// ADC counts
    RawMagnetometer(RawVector),
    /// Step detected
    StepDetector {
        /// Detection latency in microseconds
        latency_us: u32,
    },
    /// Activity classification page
    PersonalActivityClassifier {
        /// Page number
        page: u8,
        /// Last page of the classification
        last_page: bool,
        /// Most likely activity
        most_likely: u8,
        /// Confidence per activity, percent
        confidence: [u8; 10],
    },
}

/// One decoded sensor sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorValue {
    /// Sensor that produced the sample
    pub sensor_id: SensorId,
    /// 8-bit report sequence number
    pub sequence: u8,
    /// Accuracy, 0 (unreliable) to 3 (high)
    pub accuracy: u8,
    /// Report delay relative to the timebase, microseconds
    pub delay_us: u32,
    /// Host time of the sample, microseconds
    pub timestamp_us: u64,
    /// Decoded values
    pub data: SensorData,
}

impl SensorValue {
    /// Decode one input report.
    ///
    /// `timebase_us` is the host time the packet timebase refers to; the
    /// sample time is the timebase plus the report delay.
    pub fn decode(report: &[u8], timebase_us: i64) -> Result<Self, Sh2Error> {
        let id = *report.first().ok_or(Sh2Error::ShortPacket(0))?;
        let sensor_id = SensorId::try_from(id)?;
        let expected = report_len(id).ok_or(Sh2Error::UnknownSensor(id))?;
        if report.len() < expected {
            return Err(Sh2Error::ShortReport {
                id,
                len: report.len(),
            });
        }

        let sequence = report[1];
        let status = report[2];
        let delay_us = ((((status >> 2) as u32) << 8) | report[3] as u32) * 100;
        let timestamp_us = (timebase_us + delay_us as i64).max(0) as u64;

        let mut buf = &report[REPORT_PREFIX_SIZE..expected];
        let data = match sensor_id {
            SensorId::Accelerometer => SensorData::Accelerometer(read_vec3(&mut buf, Q_ACCEL)),
            SensorId::LinearAcceleration => {
                SensorData::LinearAcceleration(read_vec3(&mut buf, Q_ACCEL))
            }
            SensorId::Gravity => SensorData::Gravity(read_vec3(&mut buf, Q_ACCEL)),
            SensorId::GyroscopeCalibrated => SensorData::Gyroscope(read_vec3(&mut buf, Q_GYRO)),
            SensorId::GyroscopeUncalibrated => SensorData::GyroscopeUncalibrated {
                velocity: read_vec3(&mut buf, Q_GYRO),
                bias: read_vec3(&mut buf, Q_GYRO),
            },
            SensorId::MagneticFieldCalibrated => {
                SensorData::MagneticField(read_vec3(&mut buf, Q_MAG))
            }
            SensorId::MagneticFieldUncalibrated => SensorData::MagneticFieldUncalibrated {
                field: read_vec3(&mut buf, Q_MAG),
                bias: read_vec3(&mut buf, Q_MAG),
            },
            SensorId::RotationVector => SensorData::RotationVector {
                quat: read_quat(&mut buf),
                accuracy: fixed(buf.get_i16_le(), Q_ACCURACY),
            },
            SensorId::GameRotationVector => SensorData::GameRotationVector(read_quat(&mut buf)),
            SensorId::GeomagneticRotationVector => SensorData::GeomagneticRotationVector {
                quat: read_quat(&mut buf),
                accuracy: fixed(buf.get_i16_le(), Q_ACCURACY),
            },
            SensorId::RawAccelerometer => {
                let (x, y, z) = read_counts(&mut buf);
                buf.advance(2);
                SensorData::RawAccelerometer(RawVector {
                    x,
                    y,
                    z,
                    timestamp_us: buf.get_u32_le(),
                })
            }
            SensorId::RawGyroscope => {
                let (x, y, z) = read_counts(&mut buf);
                let temperature = buf.get_i16_le();
                SensorData::RawGyroscope {
                    raw: RawVector {
                        x,
                        y,
                        z,
                        timestamp_us: buf.get_u32_le(),
                    },
                    temperature,
                }
            }
            SensorId::RawMagnetometer => {
                let (x, y, z) = read_counts(&mut buf);
                buf.advance(2);
                SensorData::RawMagnetometer(RawVector {
                    x,
                    y,
                    z,
                    timestamp_us: buf.get_u32_le(),
                })
            }
            SensorId::StepDetector => SensorData::StepDetector {
                latency_us: buf.get_u32_le(),
            },
            SensorId::PersonalActivityClassifier => {
                let page_byte = buf.get_u8();
                let most_likely = buf.get_u8();
                let mut confidence = [0u8; 10];
                buf.copy_to_slice(&mut confidence);
                SensorData::PersonalActivityClassifier {
                    page: page_byte & 0x7F,
                    last_page: page_byte & 0x80 != 0,
                    most_likely,
                    confidence,
                }
            }
            // Only carried on its own channel, see `decode_gyro_rv`
            SensorId::GyroIntegratedRv => return Err(Sh2Error::UnknownSensor(id)),
        };

        Ok(Self {
            sensor_id,
            sequence,
            accuracy: status & 0x03,
            delay_us,
            timestamp_us,
            data,
        })
    }

    /// Decode a record from the gyro-integrated rotation vector channel.
    ///
    /// These records carry no report prefix; the SHTP sequence number stands
    /// in for the report sequence.
    pub fn decode_gyro_rv(record: &[u8], sequence: u8, timestamp_us: u64) -> Result<Self, Sh2Error> {
        if record.len() < GYRO_RV_RECORD_SIZE {
            return Err(Sh2Error::ShortReport {
                id: SensorId::GyroIntegratedRv.id(),
                len: record.len(),
            });
        }

        let mut buf = &record[..GYRO_RV_RECORD_SIZE];
        let quat = read_quat(&mut buf);
        let angular_velocity = read_vec3(&mut buf, Q_ANG_VEL);

        Ok(Self {
            sensor_id: SensorId::GyroIntegratedRv,
            sequence,
            accuracy: 0,
            delay_us: 0,
            timestamp_us,
            data: SensorData::GyroIntegratedRv {
                quat,
                angular_velocity,
            },
        })
    }
}

fn fixed(raw: i16, q: i32) -> f32 {
    raw as f32 * 2f32.powi(-q)
}

fn read_vec3(buf: &mut &[u8], q: i32) -> Vec3 {
    Vec3 {
        x: fixed(buf.get_i16_le(), q),
        y: fixed(buf.get_i16_le(), q),
        z: fixed(buf.get_i16_le(), q),
    }
}

fn read_quat(buf: &mut &[u8]) -> Quaternion {
    let i = fixed(buf.get_i16_le(), Q_QUAT);
    let j = fixed(buf.get_i16_le(), Q_QUAT);
    let k = fixed(buf.get_i16_le(), Q_QUAT);
    let real = fixed(buf.get_i16_le(), Q_QUAT);
    Quaternion { real, i, j, k }
}

fn read_counts(buf: &mut &[u8]) -> (i16, i16, i16) {
    (buf.get_i16_le(), buf.get_i16_le(), buf.get_i16_le())
}
