//! Frame encoding for the hub link.
//!
//! This module provides the framing constants and the byte-stuffing encoder.
//! A message may be encoded in one call or spread over several blocks with
//! [`BlockEncode`].

use bytes::{BufMut, Bytes, BytesMut};

/// Start/end flag
pub const FLAG: u8 = 0x7E;
/// Escape character
pub const ESCAPE: u8 = 0x7D;
/// Mask applied to an escaped byte
pub const XOR_MASK: u8 = 0x20;

/// Transport header byte carried at the front of every unstuffed frame
pub const TRANSPORT_HEADER: u8 = 0x01;

/// Block position of the bytes being encoded.
///
/// Encoding one message across several buffers requires the opening flag on
/// the first block only and the closing flag on the last block only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockEncode {
    /// A complete message: both flags
    #[default]
    Complete,
    /// Opening flag only
    First,
    /// No flags
    Middle,
    /// Closing flag only
    Last,
}

impl BlockEncode {
    fn opens(self) -> bool {
        matches!(self, BlockEncode::Complete | BlockEncode::First)
    }

    fn closes(self) -> bool {
        matches!(self, BlockEncode::Complete | BlockEncode::Last)
    }
}

/// Worst-case encoded size of `len` source bytes (every byte escaped plus two flags)
pub const fn max_encoded_len(len: usize) -> usize {
    2 * len + 2
}

/// Byte-stuff `src` into `dst`, adding flags according to `block`.
///
/// Returns the number of bytes appended. An empty source is a no-op and
/// returns 0.
pub fn encode_into(dst: &mut BytesMut, src: &[u8], block: BlockEncode) -> usize {
    if src.is_empty() {
        return 0;
    }

    let start = dst.len();
    dst.reserve(max_encoded_len(src.len()));

    if block.opens() {
        dst.put_u8(FLAG);
    }

    for &b in src {
        if b == FLAG || b == ESCAPE {
            dst.put_u8(ESCAPE);
            dst.put_u8(b ^ XOR_MASK);
        } else {
            dst.put_u8(b);
        }
    }

    if block.closes() {
        dst.put_u8(FLAG);
    }

    dst.len() - start
}

/// Byte-stuff `src` into a new buffer
pub fn encode(src: &[u8], block: BlockEncode) -> Bytes {
    let mut buf = BytesMut::with_capacity(max_encoded_len(src.len()));
    encode_into(&mut buf, src, block);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_plain_bytes() {
        let encoded = encode(&[0x01, 0x02, 0x03], BlockEncode::Complete);
        assert_eq!(encoded.as_ref(), &[FLAG, 0x01, 0x02, 0x03, FLAG]);
    }

    #[test]
    fn test_encode_stuffs_reserved_bytes() {
        let encoded = encode(&[FLAG, 0x10, ESCAPE], BlockEncode::Complete);
        assert_eq!(
            encoded.as_ref(),
            &[FLAG, ESCAPE, 0x5E, 0x10, ESCAPE, 0x5D, FLAG]
        );
    }

    #[test]
    fn test_encode_empty_is_noop() {
        let mut buf = BytesMut::new();
        assert_eq!(encode_into(&mut buf, &[], BlockEncode::Complete), 0);
        assert!(buf.is_empty());
        assert!(encode(&[], BlockEncode::First).is_empty());
    }

    #[test]
    fn test_block_modes() {
        assert_eq!(encode(&[0xAA], BlockEncode::First).as_ref(), &[FLAG, 0xAA]);
        assert_eq!(encode(&[0xAA], BlockEncode::Middle).as_ref(), &[0xAA]);
        assert_eq!(encode(&[0xAA], BlockEncode::Last).as_ref(), &[0xAA, FLAG]);
    }

    #[test]
    fn test_multi_block_matches_complete() {
        let message = [0x01, FLAG, 0x02, ESCAPE, 0x03, 0x04];

        let mut split = BytesMut::new();
        encode_into(&mut split, &message[..2], BlockEncode::First);
        encode_into(&mut split, &message[2..4], BlockEncode::Middle);
        encode_into(&mut split, &message[4..], BlockEncode::Last);

        assert_eq!(split.freeze(), encode(&message, BlockEncode::Complete));
    }

    #[test]
    fn test_worst_case_size() {
        let all_flags = [FLAG; 16];
        let encoded = encode(&all_flags, BlockEncode::Complete);
        assert_eq!(encoded.len(), max_encoded_len(all_flags.len()));
    }
}
