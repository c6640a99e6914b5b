//! Serial port backend for the hub link.

use crate::device::ByteDevice;
use crate::error::TransportError;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{debug, info};

/// Default link rate of the hub UART
pub const DEFAULT_BAUD_RATE: u32 = 3_000_000;

/// Serial port configuration
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0`
    pub path: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout; keeps reads short so the service loop stays responsive
    pub read_timeout: Duration,
    /// Delay after opening before the buffers are flushed
    pub settle: Duration,
}

impl SerialConfig {
    /// Configuration for the n-th attached adapter
    pub fn for_device_number(device_number: u32) -> Self {
        Self {
            path: default_port_path(device_number),
            ..Self::default()
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: default_port_path(0),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(10),
            settle: Duration::from_secs(2),
        }
    }
}

/// Device path for the n-th USB serial adapter
pub fn default_port_path(device_number: u32) -> String {
    format!("/dev/ttyUSB{}", device_number)
}

/// Hub link over a serial port
pub struct SerialDevice {
    config: SerialConfig,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialDevice {
    /// Create a closed device
    pub fn new(config: SerialConfig) -> Self {
        Self { config, port: None }
    }

    /// Port configuration
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port not open"))
    }
}

impl ByteDevice for SerialDevice {
    fn open(&mut self) -> Result<(), TransportError> {
        let port = serialport::new(&self.config.path, self.config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.config.read_timeout)
            .open()?;

        info!(
            "Opened serial port {} at {} baud",
            self.config.path, self.config.baud_rate
        );

        // The adapter may emit a partial frame right after opening
        if !self.config.settle.is_zero() {
            std::thread::sleep(self.config.settle);
        }
        port.clear(ClearBuffer::All)?;
        debug!("Flushed serial buffers on {}", self.config.path);

        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!("Closed serial port {}", self.config.path);
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port()?.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.port()?.write_all(&[byte])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SerialConfig::for_device_number(2);
        assert_eq!(config.path, "/dev/ttyUSB2");
        assert_eq!(config.baud_rate, 3_000_000);
        assert_eq!(config.read_timeout, Duration::from_millis(10));
    }

    #[test]
    fn test_closed_device_io_fails() {
        let mut device = SerialDevice::new(SerialConfig::default());
        let mut buf = [0u8; 4];
        assert_eq!(
            device.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::NotConnected
        );
        assert!(device.write_byte(0x7E).is_err());
    }
}
