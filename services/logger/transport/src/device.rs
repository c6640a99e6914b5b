//! Raw duplex byte device abstraction.

use crate::error::TransportError;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

/// Capability interface for a raw duplex byte stream
pub trait ByteDevice {
    /// Open and configure the device
    fn open(&mut self) -> Result<(), TransportError>;

    /// Close the device
    fn close(&mut self);

    /// Read available bytes without blocking for long; `Ok(0)` means none
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write a single byte
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;
}

#[derive(Debug, Default)]
struct MockState {
    rx: VecDeque<Vec<u8>>,
    tx: Vec<u8>,
    open: bool,
    open_count: u32,
    fail_writes: bool,
}

/// In-memory device for tests.
///
/// Each queued receive chunk is returned by exactly one `read` call, which
/// models one OS-level read. Clones share state so a test can keep a handle
/// after moving the device into a transport.
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    /// Create an empty device
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue bytes to be returned by one future read
    pub fn push_rx(&self, chunk: impl Into<Vec<u8>>) {
        self.lock().rx.push_back(chunk.into());
    }

    /// Take everything written so far
    pub fn take_tx(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().tx)
    }

    /// Whether the device is currently open
    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Number of times the device was opened
    pub fn open_count(&self) -> u32 {
        self.lock().open_count
    }

    /// Make subsequent writes fail
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }
}

impl ByteDevice for MockDevice {
    fn open(&mut self) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.open = true;
        state.open_count += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.lock().open = false;
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock();
        let Some(mut chunk) = state.rx.pop_front() else {
            return Ok(0);
        };

        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            state.rx.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }
        state.tx.push(byte);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_read_chunks() {
        let mut device = MockDevice::new();
        device.push_rx(vec![1, 2, 3]);
        device.push_rx(vec![4]);

        let mut buf = [0u8; 2];
        assert_eq!(device.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(device.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 3);
        assert_eq!(device.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 4);
        assert_eq!(device.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_mock_shared_handle() {
        let handle = MockDevice::new();
        let mut device = handle.clone();

        device.open().unwrap();
        device.write_byte(0x7E).unwrap();
        assert!(handle.is_open());
        assert_eq!(handle.take_tx(), vec![0x7E]);

        handle.fail_writes(true);
        assert!(device.write_byte(0x00).is_err());
    }
}
