//! Fuzz target: `codec::parse`
//!
//! Drives arbitrary byte sequences into the frame parser and asserts that
//! it never panics, never yields a payload longer than the receive limit,
//! and that every accepted frame re-encodes to a frame that parses back to
//! the same message.
//!
//! cargo fuzz run fuzz_frame_parse

#![no_main]

use feeder::rpc::codec::{MAX_RX_PAYLOAD, encode, parse};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(msg) = parse(data) else {
        return;
    };

    assert!(usize::from(msg.length) <= MAX_RX_PAYLOAD, "payload exceeds receive limit");
    assert_eq!(msg.payload().len(), usize::from(msg.length));
    assert_eq!(msg.checksum, msg.compute_checksum());

    let again = parse(&encode(&msg)).expect("re-encoded frame must parse");
    assert_eq!(again, msg);
});
