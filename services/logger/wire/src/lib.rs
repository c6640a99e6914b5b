//! RFC1662 byte-stuffing framer for the sensor hub serial link.
//!
//! This crate provides the HDLC-like link layer used between the host and the
//! sensor hub: flag-delimited frames with escape-based byte stuffing, an
//! encoder that can spread one message over several blocks, and a stateful
//! decoder that assembles complete messages from an arbitrarily chunked byte
//! stream.
//!
//! ## Wire Format
//!
//! ```text
//! +------+------------------------------+------+
//! | 0x7E | stuffed bytes                | 0x7E |
//! +------+------------------------------+------+
//!
//! stuffed byte := b                  (b != 0x7E && b != 0x7D)
//!               | 0x7D, b ^ 0x20     (b == 0x7E || b == 0x7D)
//! ```
//!
//! After unstuffing, every frame on the hub link starts with the one-byte
//! transport header [`TRANSPORT_HEADER`].
//!
//! ## Decoded Buffer Layout
//!
//! ```text
//! +------------+------------+---------------------+------------+----
//! | length LSB | length MSB | payload (length B)  | length LSB | ...
//! +------------+------------+---------------------+------------+----
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decoder;
pub mod error;
pub mod frame;

// Re-export main types
pub use decoder::{FrameDecoder, Messages, DEFAULT_DECODE_CAPACITY, LEN_PREFIX_SIZE};
pub use error::DecodeError;
pub use frame::{
    encode, encode_into, max_encoded_len, BlockEncode, ESCAPE, FLAG, TRANSPORT_HEADER, XOR_MASK,
};
