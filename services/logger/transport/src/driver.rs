//! Message assembly and paced writes over a byte device.
//!
//! One device read feeds the frame decoder, which may retire several
//! messages at once. Those messages are handed out one per
//! [`HubTransport::read_message`] call and all carry the timestamp taken
//! when the batch was read. The device is only read again once the batch is
//! drained.

use crate::clock::Clock;
use crate::device::ByteDevice;
use crate::error::TransportError;
use bytes::{BufMut, Bytes, BytesMut};
use logger_wire::{
    encode, BlockEncode, DecodeError, FrameDecoder, DEFAULT_DECODE_CAPACITY, TRANSPORT_HEADER,
};
use std::io;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Minimum spacing between transmitted bytes
pub const BYTE_TX_MIN_SPACING: Duration = Duration::from_micros(200);

/// Bytes requested from the device per read
pub const READ_CHUNK_SIZE: usize = 1024;

/// SHTP packet that asks the hub executable to reset
pub const SOFT_RESET_PACKET: [u8; 5] = [0x05, 0x00, 0x01, 0x01, 0x01];

/// Transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Size of the decoder destination buffer
    pub decode_capacity: usize,
    /// Bytes requested per device read
    pub read_chunk: usize,
    /// Delay before each transmitted byte
    pub byte_spacing: Duration,
    /// Send a soft reset right after the device opens
    pub reset_on_open: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            decode_capacity: DEFAULT_DECODE_CAPACITY,
            read_chunk: READ_CHUNK_SIZE,
            byte_spacing: BYTE_TX_MIN_SPACING,
            reset_on_open: true,
        }
    }
}

/// A received message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message bytes, transport header removed unless read raw
    pub payload: Bytes,
    /// Time the containing batch was read, in microseconds
    pub timestamp_us: u64,
}

/// Link counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Bytes read from the device
    pub bytes_in: u64,
    /// Bytes written to the device, stuffing included
    pub bytes_out: u64,
    /// Messages handed to the caller
    pub messages_in: u64,
    /// Frames written
    pub frames_out: u64,
    /// Decoder overflows recovered from
    pub overflows: u64,
    /// Messages discarded for being too short
    pub short_messages: u64,
}

/// Message-level link to the hub, as seen by the protocol layer
pub trait HubLink {
    /// Open the link
    fn open(&mut self) -> Result<(), TransportError>;

    /// Close the link
    fn close(&mut self);

    /// Next received message with the transport header removed, if any
    fn read_message(&mut self) -> Result<Option<Message>, TransportError>;

    /// Send one message; the transport header is added here
    fn write(&mut self, payload: &[u8]) -> Result<usize, TransportError>;

    /// Ask the hub to reset
    fn soft_reset(&mut self) -> Result<(), TransportError>;

    /// Current time in microseconds
    fn now_us(&self) -> u64;
}

/// Transport driver over a [`ByteDevice`]
pub struct HubTransport<D, C> {
    device: D,
    clock: C,
    config: TransportConfig,
    decoder: FrameDecoder,
    rx_buf: Vec<u8>,
    available: usize,
    served: usize,
    batch_time_us: u64,
    open: bool,
    stats: TransportStats,
}

impl<D: ByteDevice, C: Clock> HubTransport<D, C> {
    /// Create a closed transport
    pub fn new(device: D, clock: C, config: TransportConfig) -> Self {
        let decoder = FrameDecoder::with_capacity(config.decode_capacity);
        let rx_buf = vec![0u8; config.read_chunk.max(1)];
        Self {
            device,
            clock,
            config,
            decoder,
            rx_buf,
            available: 0,
            served: 0,
            batch_time_us: 0,
            open: false,
            stats: TransportStats::default(),
        }
    }

    /// Open the device, reset the decoder and optionally reset the hub
    pub fn open(&mut self) -> Result<(), TransportError> {
        self.device.open()?;
        self.decoder.reset();
        self.available = 0;
        self.served = 0;
        self.open = true;
        debug!("Transport opened");

        if self.config.reset_on_open {
            self.soft_reset()?;
        }
        Ok(())
    }

    /// Close the device
    pub fn close(&mut self) {
        if self.open {
            self.device.close();
            self.open = false;
            debug!("Transport closed");
        }
    }

    /// Whether the device is open
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Link counters
    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    /// Current time in microseconds
    pub fn now_us(&self) -> u64 {
        self.clock.now_us()
    }

    /// Next message with the one-byte transport header removed.
    ///
    /// Messages no longer than the header are dropped.
    pub fn read_message(&mut self) -> Result<Option<Message>, TransportError> {
        self.read_stripped(1)
    }

    /// Next message exactly as decoded
    pub fn read_message_raw(&mut self) -> Result<Option<Message>, TransportError> {
        self.read_stripped(0)
    }

    fn read_stripped(&mut self, strip: usize) -> Result<Option<Message>, TransportError> {
        if let Some(message) = self.next_buffered(strip) {
            return Ok(Some(message));
        }
        self.fill()?;
        Ok(self.next_buffered(strip))
    }

    fn next_buffered(&mut self, strip: usize) -> Option<Message> {
        while self.served < self.available {
            let index = self.served;
            self.served += 1;

            let Some(record) = self.decoder.messages().nth(index) else {
                self.available = 0;
                return None;
            };
            if record.len() <= strip {
                self.stats.short_messages += 1;
                trace!("Skipping {} byte message", record.len());
                continue;
            }

            self.stats.messages_in += 1;
            return Some(Message {
                payload: Bytes::copy_from_slice(&record[strip..]),
                timestamp_us: self.batch_time_us,
            });
        }
        None
    }

    fn fill(&mut self) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }

        let n = match self.device.read(&mut self.rx_buf) {
            Ok(n) => n,
            Err(e) if is_transient(&e) => 0,
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            return Ok(());
        }

        self.stats.bytes_in += n as u64;
        trace!("Read {} bytes", n);

        self.served = 0;
        match self.decoder.decode(&self.rx_buf[..n]) {
            Ok(count) => {
                self.available = count;
                if count > 0 {
                    self.batch_time_us = self.clock.now_us();
                }
                Ok(())
            }
            Err(DecodeError::Overflow) => {
                warn!(
                    "Decode buffer overflow ({} bytes), discarding partial data",
                    self.decoder.capacity()
                );
                self.stats.overflows += 1;
                self.available = 0;
                self.decoder.reset();
                Ok(())
            }
            Err(e) => {
                self.available = 0;
                Err(e.into())
            }
        }
    }

    /// Send one message with the transport header prepended.
    ///
    /// Returns the payload length, or 0 for an empty payload.
    pub fn write(&mut self, payload: &[u8]) -> Result<usize, TransportError> {
        if payload.is_empty() {
            return Ok(0);
        }

        let mut packet = BytesMut::with_capacity(1 + payload.len());
        packet.put_u8(TRANSPORT_HEADER);
        packet.extend_from_slice(payload);
        self.write_raw(&packet)?;
        Ok(payload.len())
    }

    /// Frame and send `data` as is
    pub fn write_raw(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }

        let frame = encode(data, BlockEncode::Complete);
        trace!("Writing {} byte frame for {} byte message", frame.len(), data.len());

        // A failed byte abandons the rest of the frame; the hub drops the
        // partial frame when the next opening flag arrives.
        for &byte in frame.iter() {
            if !self.config.byte_spacing.is_zero() {
                std::thread::sleep(self.config.byte_spacing);
            }
            self.device.write_byte(byte)?;
        }

        self.stats.bytes_out += frame.len() as u64;
        self.stats.frames_out += 1;
        Ok(data.len())
    }

    /// Send the soft reset packet
    pub fn soft_reset(&mut self) -> Result<(), TransportError> {
        debug!("Sending soft reset");
        self.write(&SOFT_RESET_PACKET).map(|_| ())
    }
}

impl<D: ByteDevice, C: Clock> HubLink for HubTransport<D, C> {
    fn open(&mut self) -> Result<(), TransportError> {
        HubTransport::open(self)
    }

    fn close(&mut self) {
        HubTransport::close(self)
    }

    fn read_message(&mut self) -> Result<Option<Message>, TransportError> {
        HubTransport::read_message(self)
    }

    fn write(&mut self, payload: &[u8]) -> Result<usize, TransportError> {
        HubTransport::write(self, payload)
    }

    fn soft_reset(&mut self) -> Result<(), TransportError> {
        HubTransport::soft_reset(self)
    }

    fn now_us(&self) -> u64 {
        HubTransport::now_us(self)
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::device::MockDevice;
    use std::time::Instant;

    fn frame(payload: &[u8]) -> Vec<u8> {
        encode(payload, BlockEncode::Complete).to_vec()
    }

    fn quiet_config() -> TransportConfig {
        TransportConfig {
            byte_spacing: Duration::ZERO,
            reset_on_open: false,
            ..TransportConfig::default()
        }
    }

    fn open_transport(
        config: TransportConfig,
    ) -> (HubTransport<MockDevice, ManualClock>, MockDevice, ManualClock) {
        let device = MockDevice::new();
        let clock = ManualClock::new();
        let mut transport = HubTransport::new(device.clone(), clock.clone(), config);
        transport.open().unwrap();
        (transport, device, clock)
    }

    #[test]
    fn test_not_open() {
        let mut transport = HubTransport::new(MockDevice::new(), ManualClock::new(), quiet_config());
        assert!(matches!(transport.read_message(), Err(TransportError::NotOpen)));
        assert!(matches!(transport.write(&[1]), Err(TransportError::NotOpen)));
    }

    #[test]
    fn test_open_sends_soft_reset() {
        let config = TransportConfig {
            byte_spacing: Duration::ZERO,
            ..TransportConfig::default()
        };
        let (_transport, device, _clock) = open_transport(config);

        let expected = frame(&[0x01, 0x05, 0x00, 0x01, 0x01, 0x01]);
        assert_eq!(device.take_tx(), expected);
        assert_eq!(device.open_count(), 1);
    }

    #[test]
    fn test_read_strips_header() {
        let (mut transport, device, clock) = open_transport(quiet_config());
        device.push_rx(frame(&[0x01, 0xAA, 0xBB]));
        clock.set(42);

        let message = transport.read_message().unwrap().unwrap();
        assert_eq!(&message.payload[..], &[0xAA, 0xBB]);
        assert_eq!(message.timestamp_us, 42);
        assert!(transport.read_message().unwrap().is_none());
    }

    #[test]
    fn test_read_raw_keeps_header() {
        let (mut transport, device, _clock) = open_transport(quiet_config());
        device.push_rx(frame(&[0x01, 0xAA]));

        let message = transport.read_message_raw().unwrap().unwrap();
        assert_eq!(&message.payload[..], &[0x01, 0xAA]);
    }

    #[test]
    fn test_batch_shares_timestamp() {
        let (mut transport, device, clock) = open_transport(quiet_config());
        let mut chunk = frame(&[0x01, 0x10]);
        chunk.extend(frame(&[0x01, 0x20]));
        device.push_rx(chunk);
        device.push_rx(frame(&[0x01, 0x30]));

        clock.set(1_000);
        let first = transport.read_message().unwrap().unwrap();
        clock.set(5_000);
        let second = transport.read_message().unwrap().unwrap();
        let third = transport.read_message().unwrap().unwrap();

        assert_eq!((&first.payload[..], first.timestamp_us), (&[0x10][..], 1_000));
        assert_eq!((&second.payload[..], second.timestamp_us), (&[0x20][..], 1_000));
        assert_eq!((&third.payload[..], third.timestamp_us), (&[0x30][..], 5_000));
    }

    #[test]
    fn test_header_only_message_skipped() {
        let (mut transport, device, _clock) = open_transport(quiet_config());
        let mut chunk = frame(&[0x01]);
        chunk.extend(frame(&[0x01, 0x55]));
        device.push_rx(chunk);

        let message = transport.read_message().unwrap().unwrap();
        assert_eq!(&message.payload[..], &[0x55]);
        assert_eq!(transport.stats().short_messages, 1);
    }

    #[test]
    fn test_message_split_across_reads() {
        let (mut transport, device, _clock) = open_transport(quiet_config());
        let bytes = frame(&[0x01, 0x7E, 0x7D, 0x03]);
        device.push_rx(bytes[..3].to_vec());
        device.push_rx(bytes[3..].to_vec());

        assert!(transport.read_message().unwrap().is_none());
        let message = transport.read_message().unwrap().unwrap();
        assert_eq!(&message.payload[..], &[0x7E, 0x7D, 0x03]);
    }

    #[test]
    fn test_overflow_recovery() {
        let config = TransportConfig {
            decode_capacity: 16,
            ..quiet_config()
        };
        let (mut transport, device, _clock) = open_transport(config);
        device.push_rx(frame(&[0x01; 40]));
        device.push_rx(frame(&[0x01, 0x02]));

        assert!(transport.read_message().unwrap().is_none());
        assert_eq!(transport.stats().overflows, 1);

        let message = transport.read_message().unwrap().unwrap();
        assert_eq!(&message.payload[..], &[0x02]);
    }

    #[test]
    fn test_write_prepends_header() {
        let (mut transport, device, _clock) = open_transport(quiet_config());
        let written = transport.write(&[0x7E, 0x02]).unwrap();

        assert_eq!(written, 2);
        assert_eq!(device.take_tx(), vec![0x7E, 0x01, 0x7D, 0x5E, 0x02, 0x7E]);
        assert_eq!(transport.stats().frames_out, 1);
    }

    #[test]
    fn test_write_empty_is_noop() {
        let (mut transport, device, _clock) = open_transport(quiet_config());
        assert_eq!(transport.write(&[]).unwrap(), 0);
        assert!(device.take_tx().is_empty());
    }

    #[test]
    fn test_write_error_propagates() {
        let (mut transport, device, _clock) = open_transport(quiet_config());
        device.fail_writes(true);
        assert!(matches!(transport.write(&[0x01]), Err(TransportError::Io(_))));
        assert!(device.take_tx().is_empty());
        assert_eq!(transport.stats().frames_out, 0);

        // The next frame goes out whole once the device recovers
        device.fail_writes(false);
        transport.write(&[0x01]).unwrap();
        assert_eq!(device.take_tx(), frame(&[TRANSPORT_HEADER, 0x01]));
    }

    #[test]
    fn test_write_pacing() {
        let config = TransportConfig {
            byte_spacing: Duration::from_millis(1),
            ..quiet_config()
        };
        let (mut transport, device, _clock) = open_transport(config);

        let start = Instant::now();
        transport.write(&[0x10, 0x20]).unwrap();
        let frame_len = device.take_tx().len();

        assert_eq!(frame_len, 5);
        assert!(start.elapsed() >= Duration::from_millis(frame_len as u64));
    }

    #[test]
    fn test_close_and_reopen() {
        let (mut transport, device, _clock) = open_transport(quiet_config());
        transport.close();
        assert!(!device.is_open());
        assert!(matches!(transport.read_message(), Err(TransportError::NotOpen)));

        transport.open().unwrap();
        assert!(device.is_open());
        assert_eq!(device.open_count(), 2);
    }
}
