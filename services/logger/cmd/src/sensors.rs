//! Sensor selection.
//!
//! The command line picks sensors by mode (which physical sensors) and by
//! output kind (raw, calibrated, uncalibrated or fused orientation).

use clap::ValueEnum;
use logger_sh2::{FeatureFlags, SensorConfig, SensorId};
use tracing::warn;

/// Personal activity classifier: report every activity class
const PAC_ALL_ACTIVITIES: u32 = 511;

/// Which physical sensors feed the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SensorMode {
    /// Accelerometer, gyroscope and magnetometer
    #[default]
    #[value(name = "9agm")]
    NineAgm,
    /// Accelerometer and gyroscope
    #[value(name = "6ag")]
    SixAg,
    /// Accelerometer and magnetometer
    #[value(name = "6am")]
    SixAm,
    /// Gyroscope and magnetometer
    #[value(name = "6gm")]
    SixGm,
    /// Accelerometer only
    #[value(name = "3a")]
    ThreeA,
    /// Gyroscope only
    #[value(name = "3g")]
    ThreeG,
    /// Magnetometer only
    #[value(name = "3m")]
    ThreeM,
    /// Every sensor of the selected kinds
    All,
}

/// Sensor selection from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorSelection {
    /// Physical sensors feeding the log
    pub mode: SensorMode,
    /// Add raw ADC sensors
    pub raw: bool,
    /// Add calibrated sensors
    pub calibrated: bool,
    /// Add uncalibrated sensors
    pub uncalibrated: bool,
    /// Add the step detector
    pub step: bool,
    /// Add the personal activity classifier
    pub pac: bool,
}

impl SensorSelection {
    /// Sensors implied by the mode and the output kinds; the fused
    /// orientation of the mode is always included
    pub fn mode_sensors(&self) -> Vec<SensorId> {
        use SensorId::*;
        use SensorMode::*;

        let mut list = Vec::new();

        if self.raw {
            list.extend_from_slice(match self.mode {
                NineAgm | All => &[RawAccelerometer, RawGyroscope, RawMagnetometer][..],
                SixAg => &[RawAccelerometer, RawGyroscope],
                SixAm => &[RawAccelerometer, RawMagnetometer],
                SixGm => &[RawGyroscope, RawMagnetometer],
                ThreeA => &[RawAccelerometer],
                ThreeG => &[RawGyroscope],
                ThreeM => &[RawMagnetometer],
            });
        }

        if self.calibrated {
            list.extend_from_slice(match self.mode {
                NineAgm => &[Accelerometer, GyroscopeCalibrated, MagneticFieldCalibrated][..],
                All => &[
                    Accelerometer,
                    GyroscopeCalibrated,
                    MagneticFieldCalibrated,
                    LinearAcceleration,
                    Gravity,
                ],
                SixAg => &[Accelerometer, GyroscopeCalibrated],
                SixAm => &[Accelerometer, MagneticFieldCalibrated],
                SixGm => &[GyroscopeCalibrated, MagneticFieldCalibrated],
                ThreeA => &[Accelerometer],
                ThreeG => &[GyroscopeCalibrated],
                ThreeM => &[MagneticFieldCalibrated],
            });
        }

        if self.uncalibrated {
            list.extend_from_slice(match self.mode {
                NineAgm | All | SixGm => {
                    &[GyroscopeUncalibrated, MagneticFieldUncalibrated][..]
                }
                SixAg | ThreeG => &[GyroscopeUncalibrated],
                SixAm | ThreeM => &[MagneticFieldUncalibrated],
                ThreeA => &[],
            });
        }

        list.extend_from_slice(match self.mode {
            NineAgm => &[RotationVector][..],
            SixAg => &[GameRotationVector],
            SixAm => &[GeomagneticRotationVector],
            All => &[RotationVector, GameRotationVector, GeomagneticRotationVector],
            SixGm | ThreeA | ThreeG | ThreeM => &[],
        });

        list
    }

    /// Final list of sensors to enable.
    ///
    /// An explicit list of report ids replaces the mode selection; the
    /// classifier and step detector ids in it act like `--pac` and `--step`.
    pub fn sensors(&self, explicit: Option<&[u8]>) -> Vec<SensorId> {
        let mut pac = self.pac;
        let mut step = self.step;

        let mut list = match explicit {
            Some(ids) => {
                let mut list = Vec::with_capacity(ids.len());
                for &id in ids {
                    match SensorId::try_from(id) {
                        Ok(SensorId::PersonalActivityClassifier) => pac = true,
                        Ok(SensorId::StepDetector) => step = true,
                        Ok(sensor) => list.push(sensor),
                        Err(_) => warn!("Ignoring unsupported sensor id {:#04x}", id),
                    }
                }
                list.sort();
                list.dedup();
                list
            }
            None => self.mode_sensors(),
        };

        if pac {
            list.push(SensorId::PersonalActivityClassifier);
        }
        if step {
            list.push(SensorId::StepDetector);
        }
        list
    }

    /// Whether row times come from the raw sensors' own sample clock.
    ///
    /// Only a mode-derived list is known to hold raw sensors, so an explicit
    /// list keeps event timestamps.
    pub fn use_sample_time(&self, explicit: Option<&[u8]>) -> bool {
        self.raw && explicit.is_none()
    }
}

/// Report interval for a sample rate, rounded to the nearest microsecond
pub fn report_interval_us(rate_hz: f64) -> u32 {
    (1e6 / rate_hz + 0.5) as u32
}

/// Set Feature configuration used to enable `sensor`
pub fn sensor_config(sensor: SensorId, report_interval_us: u32) -> SensorConfig {
    let mut config = SensorConfig {
        report_interval_us,
        ..SensorConfig::default()
    };
    match sensor {
        SensorId::PersonalActivityClassifier => config.sensor_specific = PAC_ALL_ACTIVITIES,
        SensorId::StepDetector => config.flags |= FeatureFlags::CHANGE_SENSITIVITY_ENABLED,
        _ => {}
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use SensorId::*;

    fn selection(mode: SensorMode) -> SensorSelection {
        SensorSelection {
            mode,
            ..SensorSelection::default()
        }
    }

    #[test]
    fn test_default_is_rotation_vector() {
        let sel = SensorSelection::default();
        assert_eq!(sel.sensors(None), vec![RotationVector]);
    }

    #[test]
    fn test_fusion_by_mode() {
        assert_eq!(selection(SensorMode::SixAg).mode_sensors(), vec![GameRotationVector]);
        assert_eq!(selection(SensorMode::SixAm).mode_sensors(), vec![GeomagneticRotationVector]);
        assert_eq!(
            selection(SensorMode::All).mode_sensors(),
            vec![RotationVector, GameRotationVector, GeomagneticRotationVector]
        );
        assert!(selection(SensorMode::ThreeG).mode_sensors().is_empty());
    }

    #[test]
    fn test_raw_keeps_fusion() {
        let sel = SensorSelection {
            mode: SensorMode::SixAm,
            raw: true,
            ..SensorSelection::default()
        };
        assert_eq!(
            sel.mode_sensors(),
            vec![RawAccelerometer, RawMagnetometer, GeomagneticRotationVector]
        );
        assert!(sel.use_sample_time(None));
    }

    #[test]
    fn test_calibrated_and_uncalibrated() {
        let sel = SensorSelection {
            mode: SensorMode::All,
            calibrated: true,
            uncalibrated: true,
            ..SensorSelection::default()
        };
        assert_eq!(
            sel.mode_sensors(),
            vec![
                Accelerometer,
                GyroscopeCalibrated,
                MagneticFieldCalibrated,
                LinearAcceleration,
                Gravity,
                GyroscopeUncalibrated,
                MagneticFieldUncalibrated,
                RotationVector,
                GameRotationVector,
                GeomagneticRotationVector,
            ]
        );

        let sel = SensorSelection {
            mode: SensorMode::ThreeA,
            uncalibrated: true,
            ..SensorSelection::default()
        };
        assert!(sel.mode_sensors().is_empty());
    }

    #[test]
    fn test_step_and_pac_appended() {
        let sel = SensorSelection {
            step: true,
            pac: true,
            ..SensorSelection::default()
        };
        assert_eq!(
            sel.sensors(None),
            vec![RotationVector, PersonalActivityClassifier, StepDetector]
        );
    }

    #[test]
    fn test_explicit_list() {
        let sel = SensorSelection::default();
        let list = sel.sensors(Some(&[0x15, 0x01, 0x1E, 0x15, 0x18, 0x77]));
        assert_eq!(
            list,
            vec![Accelerometer, RawGyroscope, PersonalActivityClassifier, StepDetector]
        );
    }

    #[test]
    fn test_explicit_list_keeps_event_time() {
        let sel = SensorSelection {
            raw: true,
            ..SensorSelection::default()
        };
        let explicit = [0x05, 0x14];
        assert_eq!(sel.sensors(Some(&explicit[..])), vec![RotationVector, RawAccelerometer]);
        assert!(!sel.use_sample_time(Some(&explicit[..])));
        assert!(!SensorSelection::default().use_sample_time(None));
    }

    #[test]
    fn test_report_interval() {
        assert_eq!(report_interval_us(100.0), 10_000);
        assert_eq!(report_interval_us(400.0), 2_500);
        assert_eq!(report_interval_us(3.0), 333_333);
        assert_eq!(report_interval_us(1.5), 666_667);
    }

    #[test]
    fn test_sensor_config() {
        let pac = sensor_config(PersonalActivityClassifier, 10_000);
        assert_eq!(pac.sensor_specific, 511);
        assert_eq!(pac.report_interval_us, 10_000);

        let step = sensor_config(StepDetector, 10_000);
        assert!(step.flags.contains(FeatureFlags::CHANGE_SENSITIVITY_ENABLED));

        let accel = sensor_config(Accelerometer, 5_000);
        assert_eq!(accel.flags, FeatureFlags::empty());
        assert_eq!(accel.sensor_specific, 0);
    }
}
