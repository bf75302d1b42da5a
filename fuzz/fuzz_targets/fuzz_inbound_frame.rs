//! Fuzz target: `protocol::decode_command`
//!
//! Feeds arbitrary UTF-8 text frames through the collector frame decoder
//! and asserts that it never panics and that every rejection renders as a
//! log line.
//!
//! cargo fuzz run fuzz_inbound_frame

#![no_main]

use attendo::session::protocol::decode_command;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = core::str::from_utf8(data) else {
        return;
    };
    if let Err(e) = decode_command(frame) {
        assert!(!e.to_string().is_empty());
    }
});
