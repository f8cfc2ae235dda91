//! Fuzz target: `GpsSpeedSource::push`
//!
//! Streams arbitrary UART bytes through the sentence assembler and parser
//! and asserts that nothing panics and every accepted fix carries a finite,
//! non-negative speed.
//!
//! cargo fuzz run fuzz_gps_sentence

#![no_main]

use libfuzzer_sys::fuzz_target;
use speedwatch::sensors::gps::{GpsSpeedSource, LINE_CAPACITY, SentenceAssembler};

fuzz_target!(|data: &[u8]| {
    let mut src = GpsSpeedSource::new(0.5);
    for &b in data {
        if let Some(Ok(fix)) = src.push(b) {
            assert!(fix.speed_mph.is_finite(), "non-finite speed");
            assert!(fix.speed_mph >= 0.0, "negative speed");
            if !fix.fix_valid {
                assert_eq!(fix.speed_mph, 0.0, "searching fix reported a speed");
            }
        }
    }

    // Raw lines never exceed the assembly buffer.
    let mut asm = SentenceAssembler::new();
    for &b in data {
        if let Some(Ok(line)) = asm.push(b) {
            assert!(line.len() <= LINE_CAPACITY);
        }
    }

    // After a reset the source must accept bytes cleanly again.
    src.reset();
    for &b in data {
        let _ = src.push(b);
    }
});
