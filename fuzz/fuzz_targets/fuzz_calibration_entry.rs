//! Fuzz target: `CalibrationEntry` digit editing and commit
//!
//! Each input byte is one button press on the entry screen.  Asserts that
//! the entry stays five digits wide and that a commit either applies a
//! value above the minimum or leaves the active constant untouched.
//!
//! cargo fuzz run fuzz_calibration_entry

#![no_main]

use libfuzzer_sys::fuzz_target;
use speedwatch::speed::calibration::MAX_CALIBRATION;
use speedwatch::speed::{Calibration, CalibrationEntry};

const MINIMUM: u32 = 2500;

fuzz_target!(|data: &[u8]| {
    let Some((&seed, presses)) = data.split_first() else {
        return;
    };
    let Ok(mut cal) = Calibration::new(3000 + u32::from(seed) * 300, MINIMUM) else {
        return;
    };
    let mut entry = CalibrationEntry::open(cal.pulses_per_run());

    for &press in presses {
        let place = usize::from(press & 0x07);
        match press >> 6 {
            0 => entry.increment(place),
            1 => entry.decrement(place),
            2 => {
                let before = cal.pulses_per_run();
                let candidate = entry.value();
                match entry.commit(&mut cal) {
                    Ok(v) => {
                        assert!(v > MINIMUM && v <= MAX_CALIBRATION);
                        assert_eq!(cal.pulses_per_run(), candidate);
                    }
                    Err(_) => {
                        assert_eq!(cal.pulses_per_run(), before);
                        assert_eq!(entry.value(), entry.original());
                    }
                }
            }
            _ => entry = CalibrationEntry::open(cal.pulses_per_run()),
        }
        assert!(entry.value() <= MAX_CALIBRATION);
        assert_eq!(entry.display().len(), 5);
    }
});
