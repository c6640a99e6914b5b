//! Logger application: start-up sequence, service loop and shutdown.

use crate::records::{LOGGED_RECORDS, STATIC_CALIBRATION_NAME};
use crate::sensors::sensor_config;
use crate::{component_debug, component_info, component_warn};
use anyhow::{bail, Context, Result};
use logger_dsf::DsfWriter;
use logger_sh2::frs::{DYNAMIC_CALIBRATION, NOMINAL_CALIBRATION, STATIC_CALIBRATION_AGM};
use logger_sh2::{
    AsyncEvent, CalEnable, HubEvent, SensorConfig, SensorData, SensorId, SensorValue, Sh2Error,
    Sh2Hub,
};
use logger_transport::HubLink;
use std::io::Write;
use std::time::Duration;

/// Application settings resolved from the command line and config file
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Sensors to enable, in enable order
    pub sensors: Vec<SensorId>,
    /// Report interval for every enabled sensor
    pub report_interval_us: u32,
    /// Take row times from raw sensor sample timestamps
    pub use_sample_time: bool,
    /// Let the hub save dynamic calibration data periodically
    pub dcd_auto_save: bool,
    /// Clear dynamic calibration data and reset before logging
    pub clear_dcd: bool,
    /// Motion engine calibrations to run
    pub cal_enable: CalEnable,
    /// Time allowed for one reset to complete
    pub reset_timeout: Duration,
    /// Soft resets tried after the first wait times out
    pub reset_retries: u32,
    /// Time allowed for a command or query answer
    pub command_timeout: Duration,
    /// Period of the progress line
    pub stats_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sensors: vec![SensorId::RotationVector],
            report_interval_us: 10_000,
            use_sample_time: false,
            dcd_auto_save: false,
            clear_dcd: false,
            cal_enable: CalEnable::default(),
            reset_timeout: Duration::from_secs(5),
            reset_retries: 3,
            command_timeout: Duration::from_secs(1),
            stats_interval: Duration::from_secs(1),
        }
    }
}

/// Application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Idle,
    Reset,
    Startup,
    Run,
}

/// Row time bookkeeping, in seconds
#[derive(Debug, Default)]
struct SampleClock {
    use_sample_time: bool,
    start_s: Option<f64>,
    current_s: f64,
    last_sample_s: f64,
}

impl SampleClock {
    fn new(use_sample_time: bool) -> Self {
        Self {
            use_sample_time,
            ..Self::default()
        }
    }

    /// Row time for `value`
    fn update(&mut self, value: &SensorValue) -> f64 {
        if self.use_sample_time {
            match value.data {
                SensorData::RawAccelerometer(raw)
                | SensorData::RawMagnetometer(raw)
                | SensorData::RawGyroscope { raw, .. } => {
                    self.current_s = raw.timestamp_us as f64 * 1e-6;
                    self.last_sample_s = self.current_s;
                }
                _ => self.current_s = self.last_sample_s,
            }
        } else {
            self.current_s = value.timestamp_us as f64 * 1e-6;
        }

        self.start_s.get_or_insert(self.current_s);
        self.current_s
    }

    fn elapsed_s(&self) -> f64 {
        self.start_s.map_or(0.0, |start| self.current_s - start)
    }
}

/// Progress line: sample count, elapsed `h:mm:ss.ss` and average rate
pub fn format_stats(samples: u64, elapsed_s: f64) -> String {
    let hours = (elapsed_s / 3600.0).floor();
    let minutes = ((elapsed_s - hours * 3600.0) / 60.0).floor();
    let seconds = elapsed_s - hours * 3600.0 - minutes * 60.0;
    let rate = if elapsed_s > 0.0 {
        samples as f64 / elapsed_s
    } else {
        0.0
    };

    format!(
        "Samples: {:>10} Duration: {}:{:02}:{:05.2} Rate: {:.2} Hz",
        samples, hours as i64, minutes as i64, seconds, rate
    )
}

/// Drives a hub session and writes everything it reports to a DSF log
pub struct LoggerApp<L, W: Write> {
    hub: Sh2Hub<L>,
    writer: DsfWriter<W>,
    config: AppConfig,
    state: AppState,
    clock: SampleClock,
    samples: u64,
    last_report_us: Option<u64>,
}

impl<L: HubLink, W: Write> LoggerApp<L, W> {
    pub fn new(hub: Sh2Hub<L>, writer: DsfWriter<W>, config: AppConfig) -> Self {
        let clock = SampleClock::new(config.use_sample_time);
        Self {
            hub,
            writer,
            config,
            state: AppState::Idle,
            clock,
            samples: 0,
            last_report_us: None,
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    /// Sensor samples received so far
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Bring the hub up and enable the configured sensors
    pub fn init(&mut self) -> Result<()> {
        self.state = AppState::Reset;
        component_info!("app", "Opening a session with the sensor hub");
        self.hub
            .open()
            .context("failed to open a sensor hub session")?;
        self.wait_for_reset()?;
        self.state = AppState::Startup;
        self.log_pending()?;

        if self.config.clear_dcd {
            component_info!("app", "Clearing DCD and resetting");
            if let Err(e) = self
                .hub
                .erase_frs(DYNAMIC_CALIBRATION, self.config.command_timeout)
            {
                component_warn!("app", "Failed to erase the DCD record: {}", e);
            }
            self.state = AppState::Reset;
            self.hub
                .clear_dcd_and_reset()
                .context("failed to clear DCD")?;
            if !self.hub.wait_for_reset(self.config.reset_timeout)? {
                bail!("sensor hub did not reset after clearing DCD");
            }
            self.state = AppState::Startup;
            self.log_pending()?;
        }

        component_info!("app", "Reading product ids");
        let ids = self
            .hub
            .product_ids(self.config.command_timeout)
            .context("failed to get product ids")?;
        for id in &ids {
            component_info!("app", "Product id {}", id);
        }
        self.writer.log_product_ids(&ids)?;

        component_info!("app", "Setting DCD auto save to {}", self.config.dcd_auto_save);
        self.hub
            .set_dcd_auto_save(self.config.dcd_auto_save)
            .context("failed to set DCD auto save")?;

        component_info!("app", "Setting calibration config {:?}", self.config.cal_enable);
        self.hub
            .set_cal_config(self.config.cal_enable, self.config.command_timeout)
            .context("failed to set calibration config")?;

        component_info!("app", "Reading flash records");
        self.log_frs_records()?;

        let interval = self.config.report_interval_us;
        for &sensor in &self.config.sensors {
            component_info!("app", "Enabling {:?} every {} us", sensor, interval);
            self.hub
                .set_sensor_config(sensor, &sensor_config(sensor, interval))
                .with_context(|| format!("failed to enable {:?}", sensor))?;
        }

        self.last_report_us = None;
        self.state = AppState::Run;
        Ok(())
    }

    fn wait_for_reset(&mut self) -> Result<()> {
        let mut retries = 0;
        loop {
            if self.hub.wait_for_reset(self.config.reset_timeout)? {
                return Ok(());
            }
            if retries >= self.config.reset_retries {
                bail!("sensor hub did not reset after {} retries", retries);
            }
            retries += 1;
            component_warn!(
                "app",
                "Reset timeout, retrying ({}/{})",
                retries,
                self.config.reset_retries
            );
            self.hub.soft_reset()?;
        }
    }

    fn log_frs_records(&mut self) -> Result<()> {
        if self.log_frs(STATIC_CALIBRATION_AGM, STATIC_CALIBRATION_NAME)? == 0 {
            self.writer
                .log_message("# No SCD present, logging nominal calibration as 'scd'.")?;
            self.log_frs(NOMINAL_CALIBRATION, STATIC_CALIBRATION_NAME)?;
        }
        for &(frs_type, name) in LOGGED_RECORDS {
            self.log_frs(frs_type, name)?;
        }
        self.log_pending()
    }

    /// Copy one flash record into the log, returning its length in words.
    ///
    /// Records the hub cannot read count as empty.
    fn log_frs(&mut self, frs_type: u16, name: &str) -> Result<usize> {
        let words = match self.hub.read_frs(frs_type, self.config.command_timeout) {
            Ok(words) => words,
            Err(e @ Sh2Error::Transport(_)) => {
                return Err(e).with_context(|| format!("failed to read FRS record {}", name))
            }
            Err(e) => {
                component_debug!("app", "No FRS record {}: {}", name, e);
                return Ok(0);
            }
        };
        if !words.is_empty() {
            self.writer.log_frs_record(name, &words)?;
        }
        Ok(words.len())
    }

    fn log_pending(&mut self) -> Result<()> {
        let events = self.hub.drain_pending();
        self.handle_events(events)
    }

    /// One pass of the service loop
    pub fn service(&mut self) -> Result<()> {
        let now = self.hub.link().now_us();
        let last = *self.last_report_us.get_or_insert(now);
        if now.saturating_sub(last) >= self.config.stats_interval.as_micros() as u64 {
            component_info!("app", "{}", format_stats(self.samples, self.clock.elapsed_s()));
            self.last_report_us = Some(now);
        }

        let events = self.hub.service()?;
        self.handle_events(events)
    }

    fn handle_events(&mut self, events: impl IntoIterator<Item = HubEvent>) -> Result<()> {
        for event in events {
            match event {
                HubEvent::Sensor(value) => {
                    let time_s = self.clock.update(&value);
                    self.samples += 1;
                    self.writer.log_sensor_value(&value, time_s)?;
                }
                HubEvent::Async(event) => {
                    if event == AsyncEvent::Reset && self.state == AppState::Run {
                        component_warn!("app", "Sensor hub reset while logging");
                    }
                    self.writer.log_async_event(&event, self.clock.current_s)?;
                }
                HubEvent::ProductId(id) => component_debug!("app", "Unsolicited product id {}", id),
                HubEvent::CommandResponse(response) => {
                    component_debug!("app", "Unsolicited command response {:?}", response)
                }
                HubEvent::FrsRead(response) => {
                    component_debug!("app", "Unsolicited FRS read response {:?}", response)
                }
                HubEvent::FrsWrite(response) => {
                    component_debug!("app", "Unsolicited FRS write response {:?}", response)
                }
            }
        }
        Ok(())
    }

    /// Disable sensors, close the session and flush the log
    pub fn finish(mut self) -> Result<W> {
        component_info!("app", "Disabling sensors");
        let disabled = SensorConfig::disabled();
        for &sensor in &self.config.sensors {
            if let Err(e) = self.hub.set_sensor_config(sensor, &disabled) {
                component_warn!("app", "Failed to disable {:?}: {}", sensor, e);
            }
        }

        self.hub.close();
        self.state = AppState::Idle;
        let out = self.writer.finish()?;
        component_info!(
            "app",
            "Shutdown complete, {}",
            format_stats(self.samples, self.clock.elapsed_s())
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SensorSelection;
    use logger_dsf::Orientation;
    use logger_sh2::HubConfig;
    use logger_transport::{HubTransport, ManualClock, MockDevice, TransportConfig};
    use logger_wire::{encode, BlockEncode, TRANSPORT_HEADER};

    type TestApp = LoggerApp<HubTransport<MockDevice, ManualClock>, Vec<u8>>;

    fn push_packet(device: &MockDevice, channel: u8, payload: &[u8]) {
        let len = (payload.len() + 4) as u16;
        let mut msg = vec![TRANSPORT_HEADER];
        msg.extend_from_slice(&len.to_le_bytes());
        msg.extend_from_slice(&[channel, 0]);
        msg.extend_from_slice(payload);
        device.push_rx(encode(&msg, BlockEncode::Complete).to_vec());
    }

    fn product_id_resp() -> Vec<u8> {
        let mut r = vec![0xF8, 0x01, 3, 2];
        r.extend_from_slice(&10003606u32.to_le_bytes());
        r.extend_from_slice(&324u32.to_le_bytes());
        r.extend_from_slice(&[7, 0, 0, 0]);
        r
    }

    fn cal_config_resp(command_seq: u8) -> Vec<u8> {
        let mut r = vec![0xF1, 0, 0x07, command_seq, 0, 0];
        r.extend_from_slice(&[0; 10]);
        r
    }

    fn frs_read_resp(frs_type: u16, status: u8, words: &[u32]) -> Vec<u8> {
        let mut r = vec![0xF3, ((words.len() as u8) << 4) | status, 0, 0];
        for i in 0..2 {
            r.extend_from_slice(&words.get(i).copied().unwrap_or(0).to_le_bytes());
        }
        r.extend_from_slice(&frs_type.to_le_bytes());
        r.extend_from_slice(&[0, 0]);
        r
    }

    fn app(device: &MockDevice, config: AppConfig) -> TestApp {
        let transport = HubTransport::new(
            device.clone(),
            ManualClock::with_step(1_000),
            TransportConfig {
                byte_spacing: Duration::ZERO,
                ..TransportConfig::default()
            },
        );
        let hub = Sh2Hub::new(transport, HubConfig::default());
        LoggerApp::new(hub, DsfWriter::new(Vec::new(), Orientation::Ned), config)
    }

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    #[test]
    fn test_full_session() {
        let device = MockDevice::new();
        push_packet(&device, 1, &[0x01]);
        push_packet(&device, 2, &product_id_resp());
        // DCD auto save takes command sequence 0
        push_packet(&device, 2, &cal_config_resp(1));

        let config = AppConfig {
            sensors: vec![SensorId::RawAccelerometer, SensorId::RotationVector],
            use_sample_time: true,
            ..AppConfig::default()
        };
        let mut app = app(&device, config);
        app.init().unwrap();
        assert_eq!(app.state(), AppState::Run);

        let mut reports = vec![0x14, 0, 3, 0, 1, 0, 2, 0, 3, 0, 0, 0];
        reports.extend_from_slice(&2_000_000u32.to_le_bytes());
        reports.extend_from_slice(&[0x05, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0x40, 0, 0]);
        push_packet(&device, 3, &reports);

        app.service().unwrap();
        assert_eq!(app.samples(), 2);

        let out = app.finish().unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("$ 0.000000000, reset(1)\n"));
        assert!(text.contains("! PN.0=\"10003606 3.2.324.7\"\n"));
        assert!(text.contains(".20 2.000000000,0,"));
        assert!(text.contains(".5 2.000000000,1,"));

        // Each sensor is enabled once and disabled once
        let tx = device.take_tx();
        assert_eq!(count(&tx, &[0xFD, 0x14]), 2);
        assert_eq!(count(&tx, &[0xFD, 0x05]), 2);
        assert_eq!(count(&tx, &[0xFD, 0x05, 0, 0, 0, 0x10, 0x27, 0, 0]), 1);
        assert!(!device.is_open());
    }

    #[test]
    fn test_frs_records_logged() {
        let device = MockDevice::new();
        push_packet(&device, 1, &[0x01]);
        push_packet(&device, 2, &product_id_resp());
        push_packet(&device, 2, &cal_config_resp(1));
        push_packet(&device, 2, &frs_read_resp(0x7979, 3, &[0x0403_0201, 0xFF]));
        push_packet(&device, 2, &frs_read_resp(0x1F1F, 5, &[]));
        push_packet(&device, 2, &frs_read_resp(0x4B4B, 3, &[0x1234]));

        let config = AppConfig {
            command_timeout: Duration::from_millis(20),
            ..AppConfig::default()
        };
        let mut app = app(&device, config);
        app.init().unwrap();

        let tx = device.take_tx();
        assert_eq!(count(&tx, &[0xF4, 0, 0, 0]), 1 + LOGGED_RECORDS.len());

        let text = String::from_utf8(app.finish().unwrap()).unwrap();
        assert!(text.contains("!scd=\"01,02,03,04,ff,00,00,00\"\n"));
        assert!(text.contains("!serial_number=\"34,12,00,00\"\n"));
        assert!(!text.contains("!dcd="));
        assert!(!text.contains("No SCD present"));
    }

    #[test]
    fn test_clear_dcd_erases_record() {
        let device = MockDevice::new();
        push_packet(&device, 1, &[0x01]);
        push_packet(&device, 2, &[0xF5, 3, 0, 0]);
        push_packet(&device, 1, &[0x01]);
        push_packet(&device, 2, &product_id_resp());
        // Clear DCD takes command sequence 0, DCD auto save 1
        push_packet(&device, 2, &cal_config_resp(2));

        let config = AppConfig {
            clear_dcd: true,
            command_timeout: Duration::from_millis(20),
            ..AppConfig::default()
        };
        let mut app = app(&device, config);
        app.init().unwrap();
        assert_eq!(app.state(), AppState::Run);

        let tx = device.take_tx();
        assert_eq!(count(&tx, &[0xF7, 0, 0, 0, 0x1F, 0x1F]), 1);
        assert_eq!(count(&tx, &[0xF2, 0, 0x0B]), 1);

        let text = String::from_utf8(app.finish().unwrap()).unwrap();
        assert_eq!(text.matches("reset(1)").count(), 2);
        assert!(text.contains("# No SCD present, logging nominal calibration as 'scd'.\n"));
    }

    #[test]
    fn test_reset_retries_exhausted() {
        let device = MockDevice::new();
        let config = AppConfig {
            reset_timeout: Duration::from_millis(10),
            reset_retries: 2,
            ..AppConfig::default()
        };
        let mut app = app(&device, config);

        let err = app.init().unwrap_err();
        assert!(err.to_string().contains("after 2 retries"));
        assert_eq!(app.state(), AppState::Reset);

        // One soft reset on open plus one per retry
        let tx = device.take_tx();
        let reset = encode(&[TRANSPORT_HEADER, 0x05, 0x00, 0x01, 0x01, 0x01], BlockEncode::Complete);
        assert_eq!(count(&tx, &reset[..]), 3);
    }

    #[test]
    fn test_reset_on_retry() {
        let device = MockDevice::new();
        let config = AppConfig {
            reset_timeout: Duration::from_millis(10),
            command_timeout: Duration::from_millis(200),
            ..AppConfig::default()
        };
        let mut app = app(&device, config);

        // Nothing answers the first wait, the reset shows up after the retry
        for _ in 0..12 {
            device.push_rx(Vec::new());
        }
        push_packet(&device, 1, &[0x01]);
        push_packet(&device, 2, &product_id_resp());
        push_packet(&device, 2, &cal_config_resp(1));

        app.init().unwrap();
        assert_eq!(app.state(), AppState::Run);
    }

    #[test]
    fn test_sample_clock_event_time() {
        let mut clock = SampleClock::new(false);
        let value = SensorValue {
            sensor_id: SensorId::GameRotationVector,
            sequence: 0,
            accuracy: 0,
            delay_us: 0,
            timestamp_us: 1_500_000,
            data: SensorData::GameRotationVector(Default::default()),
        };
        assert_eq!(clock.update(&value), 1.5);

        let later = SensorValue {
            timestamp_us: 4_000_000,
            ..value
        };
        clock.update(&later);
        assert_eq!(clock.elapsed_s(), 2.5);
    }

    #[test]
    fn test_sample_clock_raw_time() {
        let mut clock = SampleClock::new(true);
        let fused = SensorValue {
            sensor_id: SensorId::GameRotationVector,
            sequence: 0,
            accuracy: 0,
            delay_us: 0,
            timestamp_us: 9_000_000,
            data: SensorData::GameRotationVector(Default::default()),
        };
        // Nothing raw seen yet
        assert_eq!(clock.update(&fused), 0.0);

        let raw = SensorValue {
            sensor_id: SensorId::RawMagnetometer,
            data: SensorData::RawMagnetometer(logger_sh2::RawVector {
                x: 0,
                y: 0,
                z: 0,
                timestamp_us: 250_000,
            }),
            ..fused
        };
        assert_eq!(clock.update(&raw), 0.25);
        assert_eq!(clock.update(&fused), 0.25);
    }

    #[test]
    fn test_explicit_list_uses_event_time() {
        let selection = SensorSelection {
            raw: true,
            ..SensorSelection::default()
        };
        let explicit = [0x05];
        assert_eq!(selection.sensors(Some(&explicit[..])), vec![SensorId::RotationVector]);

        let mut clock = SampleClock::new(selection.use_sample_time(Some(&explicit[..])));
        let value = SensorValue {
            sensor_id: SensorId::RotationVector,
            sequence: 0,
            accuracy: 0,
            delay_us: 0,
            timestamp_us: 7_000_000,
            data: SensorData::RotationVector {
                quat: Default::default(),
                accuracy: 0.0,
            },
        };
        assert_eq!(clock.update(&value), 7.0);

        let later = SensorValue {
            timestamp_us: 9_000_000,
            ..value
        };
        assert_eq!(clock.update(&later), 9.0);
    }

    #[test]
    fn test_format_stats() {
        assert_eq!(
            format_stats(250, 3725.5),
            "Samples:        250 Duration: 1:02:05.50 Rate: 0.07 Hz"
        );
        assert_eq!(
            format_stats(0, 0.0),
            "Samples:          0 Duration: 0:00:00.00 Rate: 0.00 Hz"
        );
    }
}
