//! Flash records copied into the log at start-up.

use logger_sh2::frs::*;

/// Name the static calibration is logged under, with the nominal
/// calibration standing in when the hub has none
pub const STATIC_CALIBRATION_NAME: &str = "scd";

/// Records logged after the static calibration, in log order
pub const LOGGED_RECORDS: &[(u16, &str)] = &[
    (NOMINAL_CALIBRATION, "nominal_scd"),
    (DYNAMIC_CALIBRATION, "dcd"),
    (STATIC_CALIBRATION_SRA, "sra_scd"),
    (NOMINAL_CALIBRATION_SRA, "sra_nominal_scd"),
    (ME_POWER_MGMT, "motion_engine_power_management"),
    (SYSTEM_ORIENTATION, "system_orientation"),
    (ACCEL_ORIENTATION, "accelerometer_orientation"),
    (SCREEN_ACCEL_ORIENTATION, "sra_accelerometer_orientation"),
    (GYROSCOPE_ORIENTATION, "gyroscope_orientation"),
    (MAGNETOMETER_ORIENTATION, "magnetometer_orientation"),
    (ARVR_STABILIZATION_RV, "arvr_rotation_vector"),
    (ARVR_STABILIZATION_GRV, "arvr_game_rotation_vector"),
    (SIG_MOTION_DETECT_CONFIG, "significant_motion_detector_configuration"),
    (SHAKE_DETECT_CONFIG, "shake_detector_configuration"),
    (MAX_FUSION_PERIOD, "maximum_fusion_period"),
    (SERIAL_NUMBER, "serial_number"),
    (ES_PRESSURE_CAL, "pressure_calibration"),
    (ES_TEMPERATURE_CAL, "temperature_calibration"),
    (ES_HUMIDITY_CAL, "humidity_calibration"),
    (ES_AMBIENT_LIGHT_CAL, "ambient_light_calibration"),
    (ES_PROXIMITY_CAL, "proximity_calibration"),
    (ALS_CAL, "ambient_light_special_calibration"),
    (PROXIMITY_SENSOR_CAL, "proximity_special_calibration"),
    (PICKUP_DETECTOR_CONFIG, "pickup_detector_configuration"),
    (FLIP_DETECTOR_CONFIG, "flip_detector_configuration"),
    (STABILITY_DETECTOR_CONFIG, "stability_detector_configuration"),
    (ACTIVITY_TRACKER_CONFIG, "activity_tracker_configuration"),
    (SLEEP_DETECTOR_CONFIG, "sleep_detector_configuration"),
    (TILT_DETECTOR_CONFIG, "tilt_detector_configuration"),
    (POCKET_DETECTOR_CONFIG, "pocket_detector_configuration"),
    (CIRCLE_DETECTOR_CONFIG, "circle_detector_configuration"),
    (USER_RECORD, "user_record"),
    (ME_TIME_SOURCE_SELECT, "motion_engine_time_source_selection"),
    (UART_FORMAT, "uart_output_format_selection"),
    (GYRO_INTEGRATED_RV_CONFIG, "gyro_integrated_rotation_vector_configuration"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_records_unique() {
        let ids: HashSet<u16> = LOGGED_RECORDS.iter().map(|(id, _)| *id).collect();
        let names: HashSet<&str> = LOGGED_RECORDS.iter().map(|(_, name)| *name).collect();
        assert_eq!(ids.len(), LOGGED_RECORDS.len());
        assert_eq!(names.len(), LOGGED_RECORDS.len());
        assert!(!ids.contains(&STATIC_CALIBRATION_AGM));
        assert!(!names.contains(STATIC_CALIBRATION_NAME));
    }
}
