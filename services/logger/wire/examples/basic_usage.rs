//! Basic usage example for the hub link framer.

use logger_wire::{encode, BlockEncode, FrameDecoder, DEFAULT_DECODE_CAPACITY, TRANSPORT_HEADER};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Hub Link Framer Example ===\n");

    // 1. Encode a message that contains reserved bytes
    println!("1. Encoding a message...");
    let message = [TRANSPORT_HEADER, 0x05, 0x00, 0x01, 0x7E, 0x7D];
    let frame = encode(&message, BlockEncode::Complete);
    println!("   Message: {:02x?}", message);
    println!("   Frame:   {:02x?}", frame.as_ref());

    // 2. Decode it in two chunks
    println!("\n2. Decoding in two chunks...");
    let mut decoder = FrameDecoder::with_capacity(DEFAULT_DECODE_CAPACITY);
    let (head, tail) = frame.split_at(frame.len() / 2);

    let n = decoder.decode(head)?;
    println!("   After first chunk: {} message(s)", n);

    let n = decoder.decode(tail)?;
    println!("   After second chunk: {} message(s)", n);
    for payload in decoder.messages() {
        println!("   Decoded: {:02x?}", payload);
    }

    // 3. Overflow handling
    println!("\n3. Overflowing a small decoder...");
    let mut small = FrameDecoder::with_capacity(4);
    match small.decode(&frame) {
        Ok(n) => println!("   Unexpectedly decoded {} message(s)", n),
        Err(e) => println!("   Error {} ({}), re-initializing", e.code(), e),
    }
    small.reset();

    println!("\n=== Example completed ===");
    Ok(())
}
