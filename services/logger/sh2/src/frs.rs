//! Flash record (FRS) types.

/// Static calibration, accelerometer, gyroscope and magnetometer
pub const STATIC_CALIBRATION_AGM: u16 = 0x7979;
/// Nominal calibration, accelerometer, gyroscope and magnetometer
pub const NOMINAL_CALIBRATION: u16 = 0x4D4D;
/// Static calibration, screen rotation accelerometer
pub const STATIC_CALIBRATION_SRA: u16 = 0x8A8A;
/// Nominal calibration, screen rotation accelerometer
pub const NOMINAL_CALIBRATION_SRA: u16 = 0x4E4E;
/// Dynamic calibration data
pub const DYNAMIC_CALIBRATION: u16 = 0x1F1F;
/// Motion engine power management
pub const ME_POWER_MGMT: u16 = 0xD3E2;
/// System orientation
pub const SYSTEM_ORIENTATION: u16 = 0x2D3E;
/// Accelerometer orientation
pub const ACCEL_ORIENTATION: u16 = 0x2D41;
/// Screen accelerometer orientation
pub const SCREEN_ACCEL_ORIENTATION: u16 = 0x2D43;
/// Gyroscope orientation
pub const GYROSCOPE_ORIENTATION: u16 = 0x2D46;
/// Magnetometer orientation
pub const MAGNETOMETER_ORIENTATION: u16 = 0x2D4C;
/// AR/VR stabilization, rotation vector
pub const ARVR_STABILIZATION_RV: u16 = 0x3E2D;
/// AR/VR stabilization, game rotation vector
pub const ARVR_STABILIZATION_GRV: u16 = 0x3E2E;
/// Significant motion detector configuration
pub const SIG_MOTION_DETECT_CONFIG: u16 = 0xC274;
/// Shake detector configuration
pub const SHAKE_DETECT_CONFIG: u16 = 0x7D7D;
/// Maximum fusion period
pub const MAX_FUSION_PERIOD: u16 = 0xD7D7;
/// Serial number
pub const SERIAL_NUMBER: u16 = 0x4B4B;
/// Environmental sensor, pressure calibration
pub const ES_PRESSURE_CAL: u16 = 0x39AF;
/// Environmental sensor, temperature calibration
pub const ES_TEMPERATURE_CAL: u16 = 0x4D20;
/// Environmental sensor, humidity calibration
pub const ES_HUMIDITY_CAL: u16 = 0x1AC9;
/// Environmental sensor, ambient light calibration
pub const ES_AMBIENT_LIGHT_CAL: u16 = 0x39B1;
/// Environmental sensor, proximity calibration
pub const ES_PROXIMITY_CAL: u16 = 0x4DA2;
/// Ambient light special calibration
pub const ALS_CAL: u16 = 0xD401;
/// Proximity sensor special calibration
pub const PROXIMITY_SENSOR_CAL: u16 = 0xD402;
/// Pickup detector configuration
pub const PICKUP_DETECTOR_CONFIG: u16 = 0x1B2A;
/// Flip detector configuration
pub const FLIP_DETECTOR_CONFIG: u16 = 0xFC94;
/// Stability detector configuration
pub const STABILITY_DETECTOR_CONFIG: u16 = 0xED85;
/// Activity tracker configuration
pub const ACTIVITY_TRACKER_CONFIG: u16 = 0xED88;
/// Sleep detector configuration
pub const SLEEP_DETECTOR_CONFIG: u16 = 0xED87;
/// Tilt detector configuration
pub const TILT_DETECTOR_CONFIG: u16 = 0xED89;
/// Pocket detector configuration
pub const POCKET_DETECTOR_CONFIG: u16 = 0xEF27;
/// Circle detector configuration
pub const CIRCLE_DETECTOR_CONFIG: u16 = 0xEE51;
/// User record
pub const USER_RECORD: u16 = 0x74B4;
/// Motion engine time source selection
pub const ME_TIME_SOURCE_SELECT: u16 = 0xD403;
/// UART output format selection
pub const UART_FORMAT: u16 = 0xA1A1;
/// Gyro-integrated rotation vector configuration
pub const GYRO_INTEGRATED_RV_CONFIG: u16 = 0xA1A2;
