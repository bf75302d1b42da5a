//! Fuzz target: `r307::decode_packet`
//!
//! Drives arbitrary UART bytes into the fingerprint packet decoder and
//! asserts that it never panics, never yields an oversized payload, and that
//! every accepted packet re-encodes to the bytes it was decoded from.
//!
//! cargo fuzz run fuzz_sensor_packet

#![no_main]

use attendo::drivers::r307::{self, MAX_PAYLOAD};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(packet) = r307::decode_packet(data) {
        assert!(packet.payload.len() <= MAX_PAYLOAD);
        let wire = r307::encode_packet(packet.address, packet.pid, &packet.payload)
            .expect("decoded payload fits");
        assert_eq!(&data[..wire.len()], wire.as_slice());
    }
});
