//! Stateful frame decoder.
//!
//! The decoder writes complete messages into a fixed-capacity destination
//! buffer as `[len: u16 LE][payload]` records. Bytes before the length anchor
//! of the message being assembled are retired messages; only bytes from the
//! anchor onward are rewritten on escape errors or overflow.
//!
//! Retired messages stay readable through [`FrameDecoder::messages`] until the
//! next [`FrameDecoder::decode`] call, which reclaims the buffer by moving any
//! partially assembled message to the front.

use crate::error::DecodeError;
use crate::frame::{ESCAPE, FLAG, XOR_MASK};
use tracing::trace;

/// Size of the length prefix in front of each decoded message
pub const LEN_PREFIX_SIZE: usize = 2;

/// Default destination capacity used by the hub transport
pub const DEFAULT_DECODE_CAPACITY: usize = 1024 + 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Discarding bytes until a flag is seen
    Hunting,
    /// Flag seen, no message bytes yet
    FrameStarted,
    /// Storing message bytes
    InMessage,
    /// Previous byte was an escape
    EscapePending,
    /// Destination overflowed; unusable until re-initialized
    Overflowed,
}

/// Frame decoder with an owned destination buffer
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecodeState,
    dest: Option<Vec<u8>>,
    /// Where the next message byte is stored
    cursor: usize,
    /// Where the length of the message being assembled is stored
    anchor: usize,
    /// Messages retired by the last decode call
    ready: usize,
}

impl FrameDecoder {
    /// Create a decoder without a destination buffer
    pub fn new() -> Self {
        Self {
            state: DecodeState::Hunting,
            dest: None,
            cursor: LEN_PREFIX_SIZE,
            anchor: 0,
            ready: 0,
        }
    }

    /// Create a decoder with a zeroed destination buffer of `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        let mut decoder = Self::new();
        decoder.init(vec![0; capacity]);
        decoder
    }

    /// Install a destination buffer and re-arm the decoder.
    ///
    /// Any partially decoded message is lost.
    pub fn init(&mut self, dest: Vec<u8>) {
        self.dest = Some(dest);
        self.reset();
    }

    /// Re-arm the decoder on its current buffer, dropping all decode state
    pub fn reset(&mut self) {
        self.state = DecodeState::Hunting;
        self.cursor = LEN_PREFIX_SIZE;
        self.anchor = 0;
        self.ready = 0;
    }

    /// Destination capacity in bytes (0 when unset)
    pub fn capacity(&self) -> usize {
        self.dest.as_ref().map_or(0, Vec::len)
    }

    /// Whether the decoder overflowed and needs [`FrameDecoder::reset`]
    pub fn is_overflowed(&self) -> bool {
        self.state == DecodeState::Overflowed
    }

    /// Decode `src`, returning the number of complete messages now available.
    ///
    /// Messages may span calls. Messages retired by a previous call are
    /// discarded.
    pub fn decode(&mut self, src: &[u8]) -> Result<usize, DecodeError> {
        let dest = self.dest.as_mut().ok_or(DecodeError::DestinationUnset)?;
        if dest.is_empty() {
            return Err(DecodeError::DestinationEmpty);
        }

        match self.state {
            DecodeState::Overflowed => return Err(DecodeError::Overflow),
            DecodeState::Hunting | DecodeState::FrameStarted => {
                self.anchor = 0;
                self.cursor = LEN_PREFIX_SIZE;
            }
            DecodeState::InMessage | DecodeState::EscapePending => {
                // Move the message in progress to the front
                dest.copy_within(self.anchor..self.cursor, 0);
                self.cursor -= self.anchor;
                self.anchor = 0;
            }
        }
        self.ready = 0;

        let mut count = 0;
        for &b in src {
            let step = match self.state {
                DecodeState::Hunting => {
                    if b == FLAG {
                        self.state = DecodeState::FrameStarted;
                    }
                    Ok(())
                }
                DecodeState::FrameStarted => match b {
                    FLAG => Ok(()),
                    ESCAPE => {
                        self.state = DecodeState::EscapePending;
                        Ok(())
                    }
                    _ => {
                        self.state = DecodeState::InMessage;
                        store(dest, &mut self.cursor, self.anchor, b)
                    }
                },
                DecodeState::InMessage => match b {
                    FLAG => {
                        let len = (self.cursor - self.anchor - LEN_PREFIX_SIZE) as u16;
                        dest[self.anchor..self.anchor + LEN_PREFIX_SIZE]
                            .copy_from_slice(&len.to_le_bytes());
                        count += 1;
                        self.anchor = self.cursor;
                        self.cursor += LEN_PREFIX_SIZE;
                        self.state = DecodeState::FrameStarted;
                        Ok(())
                    }
                    ESCAPE => {
                        self.state = DecodeState::EscapePending;
                        Ok(())
                    }
                    _ => store(dest, &mut self.cursor, self.anchor, b),
                },
                DecodeState::EscapePending => {
                    if b == FLAG {
                        trace!(
                            "dropping {} byte fragment after escape+flag",
                            self.cursor - self.anchor - LEN_PREFIX_SIZE
                        );
                        self.cursor = self.anchor + LEN_PREFIX_SIZE;
                        self.state = DecodeState::FrameStarted;
                        Ok(())
                    } else {
                        self.state = DecodeState::InMessage;
                        store(dest, &mut self.cursor, self.anchor, b ^ XOR_MASK)
                    }
                }
                DecodeState::Overflowed => Err(DecodeError::Overflow),
            };

            if let Err(e) = step {
                self.state = DecodeState::Overflowed;
                return Err(e);
            }
        }

        self.ready = count;
        Ok(count)
    }

    /// Iterate the messages retired by the last decode call
    pub fn messages(&self) -> Messages<'_> {
        Messages {
            buf: self.retired(),
            remaining: self.ready,
        }
    }

    /// Raw `[len][payload]` records retired by the last decode call
    pub fn retired(&self) -> &[u8] {
        match (&self.dest, self.ready) {
            (Some(dest), n) if n > 0 => &dest[..self.anchor],
            _ => &[],
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn store(dest: &mut [u8], cursor: &mut usize, anchor: usize, b: u8) -> Result<(), DecodeError> {
    if *cursor >= dest.len() || *cursor - anchor - LEN_PREFIX_SIZE >= u16::MAX as usize {
        return Err(DecodeError::Overflow);
    }
    dest[*cursor] = b;
    *cursor += 1;
    Ok(())
}

/// Iterator over decoded message payloads
#[derive(Debug, Clone)]
pub struct Messages<'a> {
    buf: &'a [u8],
    remaining: usize,
}

impl<'a> Iterator for Messages<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 || self.buf.len() < LEN_PREFIX_SIZE {
            return None;
        }
        let len = u16::from_le_bytes([self.buf[0], self.buf[1]]) as usize;
        let end = LEN_PREFIX_SIZE + len;
        if self.buf.len() < end {
            return None;
        }
        let payload = &self.buf[LEN_PREFIX_SIZE..end];
        self.buf = &self.buf[end..];
        self.remaining -= 1;
        Some(payload)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Messages<'_> {}
