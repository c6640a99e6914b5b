//! SH-2 sensor hub logger.
//!
//! Opens a serial link to a sensor hub, enables the selected sensors and
//! records every report to a DSF text file until interrupted.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use logger_dsf::{DsfWriter, Orientation};
use logger_sh2::{CalEnable, HubConfig, Sh2Hub};
use logger_transport::{
    default_port_path, HubTransport, MonotonicClock, SerialConfig, SerialDevice, TransportConfig,
    DEFAULT_BAUD_RATE,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod logging;
mod records;
mod sensors;

use app::{AppConfig, AppState, LoggerApp};
use config::{LoggerConfig, DEFAULT_RATE_HZ};
use logging::LoggerLogFormatter;
use sensors::{report_interval_us, SensorMode, SensorSelection};

/// Output frame selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OrientationArg {
    Ned,
    Enu,
}

impl From<OrientationArg> for Orientation {
    fn from(arg: OrientationArg) -> Self {
        match arg {
            OrientationArg::Ned => Orientation::Ned,
            OrientationArg::Enu => Orientation::Enu,
        }
    }
}

/// Log SH-2 sensor hub reports to a DSF file
#[derive(Parser, Debug)]
#[command(name = "sh2-logger", version, about = "Log SH-2 sensor hub reports to a DSF file")]
struct Args {
    /// Output DSF file
    output: PathBuf,

    /// Serial device number, opens /dev/ttyUSB<N>
    #[arg(short = 'd', long, default_value_t = 0)]
    device_number: u32,

    /// Serial port path, overrides --device-number
    #[arg(long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud_rate: u32,

    /// Requested sample rate for all sensors, Hz
    #[arg(long, default_value_t = DEFAULT_RATE_HZ)]
    rate: f64,

    /// Include raw sensors and time rows by their sample timestamps
    #[arg(long)]
    raw: bool,

    /// Include calibrated sensors
    #[arg(long)]
    calibrated: bool,

    /// Include uncalibrated sensors
    #[arg(long)]
    uncalibrated: bool,

    /// Sensor types to log
    #[arg(long, value_enum, default_value_t = SensorMode::NineAgm)]
    mode: SensorMode,

    /// Include the step detector
    #[arg(long)]
    step: bool,

    /// Include the activity classifier
    #[arg(long)]
    pac: bool,

    /// Enable periodic saving of dynamic calibration data
    #[arg(long)]
    dcd_auto_save: bool,

    /// Clear dynamic calibration data and reset on start-up
    #[arg(long)]
    clear_dcd: bool,

    /// Calibration enable mask: 0x1 accel, 0x2 gyro, 0x4 mag, 0x8 planar
    #[arg(long, default_value = "0x8", value_parser = parse_cal_enable)]
    cal_enable: CalEnable,

    /// Output frame
    #[arg(long, value_enum, default_value_t = OrientationArg::Ned)]
    orientation: OrientationArg,

    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Time allowed for the hub to report a reset, e.g. 5s
    #[arg(long, default_value = "5s")]
    reset_timeout: humantime::Duration,

    /// Soft resets to try when the hub does not report a reset
    #[arg(long, default_value_t = 3)]
    reset_retries: u32,

    /// Period of the progress line, e.g. 1s
    #[arg(long, default_value = "1s")]
    stats_interval: humantime::Duration,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_cal_enable(value: &str) -> Result<CalEnable, String> {
    let bits = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse::<u8>(),
    }
    .map_err(|e| format!("invalid mask {:?}: {}", value, e))?;

    CalEnable::from_bits(bits).ok_or_else(|| format!("unknown calibration bits in {:#04x}", bits))
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("sh2_logger={}", args.log_level).parse()?)
        .add_directive(format!("logger_wire={}", args.log_level).parse()?)
        .add_directive(format!("logger_transport={}", args.log_level).parse()?)
        .add_directive(format!("logger_sh2={}", args.log_level).parse()?)
        .add_directive(format!("logger_dsf={}", args.log_level).parse()?);

    let formatter = LoggerLogFormatter::new("sh2-logger");

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .event_format(formatter)
        .init();

    info!("Starting sh2-logger v{}", env!("CARGO_PKG_VERSION"));

    let file_config = LoggerConfig::load(args.config.as_deref())?;

    let port = args
        .port
        .clone()
        .or_else(|| file_config.port.clone())
        .unwrap_or_else(|| default_port_path(args.device_number));
    let baud_rate = if args.baud_rate != DEFAULT_BAUD_RATE {
        args.baud_rate
    } else {
        file_config.baud_rate
    };
    let rate = if args.rate != DEFAULT_RATE_HZ {
        args.rate
    } else {
        file_config.rate
    };
    if rate.is_nan() || rate <= 0.0 {
        bail!("sample rate must be positive, got {}", rate);
    }

    let selection = SensorSelection {
        mode: args.mode,
        raw: args.raw,
        calibrated: args.calibrated,
        uncalibrated: args.uncalibrated,
        step: args.step,
        pac: args.pac,
    };
    let sensors = selection.sensors(file_config.sensors.as_deref());
    if sensors.is_empty() {
        warn!("No sensors selected, the log will only hold session events");
    }

    let app_config = AppConfig {
        sensors,
        report_interval_us: report_interval_us(rate),
        use_sample_time: selection.use_sample_time(file_config.sensors.as_deref()),
        dcd_auto_save: args.dcd_auto_save,
        clear_dcd: args.clear_dcd,
        cal_enable: args.cal_enable,
        reset_timeout: args.reset_timeout.into(),
        reset_retries: args.reset_retries,
        stats_interval: args.stats_interval.into(),
        ..AppConfig::default()
    };

    let mut writer = DsfWriter::create(&args.output, args.orientation.into())
        .context("failed to create the DSF output file")?;
    writer.log_message(&format!(
        "# sh2-logger v{} started {} on {} at {} Hz",
        env!("CARGO_PKG_VERSION"),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        port,
        rate
    ))?;

    let serial = SerialConfig {
        path: port,
        baud_rate,
        ..SerialConfig::default()
    };
    info!("Using serial port {} at {} baud", serial.path, serial.baud_rate);
    let transport = HubTransport::new(
        SerialDevice::new(serial),
        MonotonicClock::new(),
        TransportConfig::default(),
    );
    let hub = Sh2Hub::new(transport, HubConfig::default());
    let app = LoggerApp::new(hub, writer, app_config);

    let running = Arc::new(AtomicBool::new(true));
    let mut worker = {
        let running = running.clone();
        tokio::task::spawn_blocking(move || run(app, &running))
    };

    let result = tokio::select! {
        result = &mut worker => result,
        signal = shutdown_signal() => {
            match signal {
                Ok(()) => info!("Break received, shutting down"),
                Err(e) => error!("Signal handling failed, shutting down: {}", e),
            }
            running.store(false, Ordering::SeqCst);
            worker.await
        }
    };

    result.context("logger thread panicked")??;
    Ok(())
}

/// Blocking part: start-up, service loop and shutdown
fn run<L, W>(mut app: LoggerApp<L, W>, running: &AtomicBool) -> anyhow::Result<()>
where
    L: logger_transport::HubLink,
    W: std::io::Write,
{
    app.init()?;
    info!("Processing sensor reports, press Ctrl-C to exit");

    while running.load(Ordering::SeqCst) && app.state() == AppState::Run {
        if let Err(e) = app.service() {
            error!("Service loop stopped: {:#}", e);
            break;
        }
    }

    info!("Stopping after {} samples", app.samples());
    app.finish()?;
    Ok(())
}

async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("Failed to install SIGTERM handler: {}", e))?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cal_enable() {
        assert_eq!(parse_cal_enable("0x8").unwrap(), CalEnable::PLANAR);
        assert_eq!(
            parse_cal_enable("0X7").unwrap(),
            CalEnable::ACCEL | CalEnable::GYRO | CalEnable::MAG
        );
        assert_eq!(parse_cal_enable("5").unwrap(), CalEnable::ACCEL | CalEnable::MAG);
        assert!(parse_cal_enable("0x18").is_err());
        assert!(parse_cal_enable("planar").is_err());
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["sh2-logger", "out.dsf"]).unwrap();
        assert_eq!(args.output, PathBuf::from("out.dsf"));
        assert_eq!(args.device_number, 0);
        assert_eq!(args.rate, DEFAULT_RATE_HZ);
        assert_eq!(args.mode, SensorMode::NineAgm);
        assert_eq!(args.cal_enable, CalEnable::PLANAR);
        assert_eq!(args.orientation, OrientationArg::Ned);
        assert_eq!(std::time::Duration::from(args.reset_timeout).as_secs(), 5);
    }

    #[test]
    fn test_args_flags() {
        let args = Args::try_parse_from([
            "sh2-logger",
            "--mode",
            "6ag",
            "--raw",
            "--orientation",
            "enu",
            "--cal-enable",
            "0x3",
            "--reset-timeout",
            "250ms",
            "log.dsf",
        ])
        .unwrap();
        assert_eq!(args.mode, SensorMode::SixAg);
        assert!(args.raw);
        assert_eq!(Orientation::from(args.orientation), Orientation::Enu);
        assert_eq!(args.cal_enable, CalEnable::ACCEL | CalEnable::GYRO);
        assert_eq!(std::time::Duration::from(args.reset_timeout).as_millis(), 250);

        assert!(Args::try_parse_from(["sh2-logger", "--mode", "5x", "log.dsf"]).is_err());
    }
}
