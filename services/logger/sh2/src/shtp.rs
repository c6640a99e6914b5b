//! SHTP packet header and channel numbering.

use crate::error::Sh2Error;
use bytes::{Buf, BufMut, BytesMut};

/// SHTP header size in bytes
pub const SHTP_HEADER_SIZE: usize = 4;

const CONTINUATION_BIT: u16 = 0x8000;
const CHANNEL_COUNT: usize = 6;

/// SHTP channels used by the hub
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// SHTP command channel (advertisements)
    Command = 0,
    /// Executable channel (reset)
    Executable = 1,
    /// SH-2 control channel
    Control = 2,
    /// Normal input reports
    SensorReports = 3,
    /// Wake input reports
    WakeReports = 4,
    /// Gyro-integrated rotation vector
    GyroRv = 5,
}

impl TryFrom<u8> for Channel {
    type Error = Sh2Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Channel::Command),
            1 => Ok(Channel::Executable),
            2 => Ok(Channel::Control),
            3 => Ok(Channel::SensorReports),
            4 => Ok(Channel::WakeReports),
            5 => Ok(Channel::GyroRv),
            _ => Err(Sh2Error::UnknownChannel(value)),
        }
    }
}

/// SHTP packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShtpHeader {
    /// Packet length including the header
    pub length: u16,
    /// Packet continues an earlier one
    pub continuation: bool,
    /// Channel number
    pub channel: u8,
    /// Per-channel sequence number
    pub sequence: u8,
}

impl ShtpHeader {
    /// Parse a header from the start of `buf`
    pub fn parse(buf: &[u8]) -> Result<Self, Sh2Error> {
        if buf.len() < SHTP_HEADER_SIZE {
            return Err(Sh2Error::ShortPacket(buf.len()));
        }
        let mut buf = buf;
        let raw_len = buf.get_u16_le();
        Ok(Self {
            length: raw_len & !CONTINUATION_BIT,
            continuation: raw_len & CONTINUATION_BIT != 0,
            channel: buf.get_u8(),
            sequence: buf.get_u8(),
        })
    }

    /// Write the header to `dst`
    pub fn encode(&self, dst: &mut BytesMut) {
        let mut raw_len = self.length & !CONTINUATION_BIT;
        if self.continuation {
            raw_len |= CONTINUATION_BIT;
        }
        dst.put_u16_le(raw_len);
        dst.put_u8(self.channel);
        dst.put_u8(self.sequence);
    }

    /// Split a packet into header and payload.
    ///
    /// The payload is cut to the advertised length when the buffer is longer.
    pub fn split(packet: &[u8]) -> Result<(Self, &[u8]), Sh2Error> {
        let header = Self::parse(packet)?;
        let len = header.length as usize;
        if len < SHTP_HEADER_SIZE || len > packet.len() {
            return Err(Sh2Error::ShortPacket(packet.len()));
        }
        Ok((header, &packet[SHTP_HEADER_SIZE..len]))
    }
}

/// Outgoing sequence numbers, one per channel
#[derive(Debug, Default)]
pub struct ShtpSequencer {
    next: [u8; CHANNEL_COUNT],
}

impl ShtpSequencer {
    /// Create a sequencer with all channels at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a packet for `channel`, consuming one sequence number
    pub fn packet(&mut self, channel: Channel, payload: &[u8]) -> BytesMut {
        let slot = &mut self.next[channel as usize];
        let header = ShtpHeader {
            length: (SHTP_HEADER_SIZE + payload.len()) as u16,
            continuation: false,
            channel: channel as u8,
            sequence: *slot,
        };
        *slot = slot.wrapping_add(1);

        let mut packet = BytesMut::with_capacity(SHTP_HEADER_SIZE + payload.len());
        header.encode(&mut packet);
        packet.extend_from_slice(payload);
        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_parse() {
        let header = ShtpHeader::parse(&[0x15, 0x80, 0x03, 0x07]).unwrap();
        assert_eq!(header.length, 0x15);
        assert!(header.continuation);
        assert_eq!(header.channel, 3);
        assert_eq!(header.sequence, 7);
    }

    #[test]
    fn test_header_encode() {
        let header = ShtpHeader {
            length: 0x15,
            continuation: true,
            channel: 3,
            sequence: 7,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(&buf[..], &[0x15, 0x80, 0x03, 0x07]);
    }

    #[test]
    fn test_split_trims_to_length() {
        let packet = [0x06, 0x00, 0x02, 0x00, 0xAA, 0xBB, 0xCC];
        let (header, payload) = ShtpHeader::split(&packet).unwrap();
        assert_eq!(header.channel, 2);
        assert_eq!(payload, &[0xAA, 0xBB]);
    }

    #[test]
    fn test_split_rejects_short_packets() {
        assert!(matches!(
            ShtpHeader::split(&[0x05, 0x00]),
            Err(Sh2Error::ShortPacket(2))
        ));
        assert!(ShtpHeader::split(&[0x09, 0x00, 0x02, 0x00, 0xAA]).is_err());
        assert!(ShtpHeader::split(&[0x02, 0x00, 0x02, 0x00]).is_err());
    }

    #[test]
    fn test_sequencer_per_channel() {
        let mut seq = ShtpSequencer::new();
        let a = seq.packet(Channel::Control, &[0xF9, 0x00]);
        let b = seq.packet(Channel::Control, &[0xF9, 0x00]);
        let c = seq.packet(Channel::Executable, &[0x01]);

        assert_eq!(&a[..], &[0x06, 0x00, 0x02, 0x00, 0xF9, 0x00]);
        assert_eq!(b[3], 1);
        assert_eq!(&c[..], &[0x05, 0x00, 0x01, 0x00, 0x01]);
    }

    #[test]
    fn test_channel_try_from() {
        assert_eq!(Channel::try_from(5).unwrap(), Channel::GyroRv);
        assert!(matches!(
            Channel::try_from(9),
            Err(Sh2Error::UnknownChannel(9))
        ));
    }
}
