//! Calibration constant and manual digit entry.
//!
//! The calibration constant is the number of pulses counted over a 300 ft
//! reference run.  Everything else is derived from it:
//!
//! ```text
//! speed_constant = pulses_per_run × 17.6 / 3600     (pulses/s per mph)
//! pulse_distance = 3600 in / pulses_per_run         (inches per pulse)
//! ```

use log::{info, warn};

use crate::error::CalibrationError;

/// Reference run length in inches (300 ft).
pub const REFERENCE_RUN_INCHES: f32 = 3600.0;
/// Reference run length in metres.
pub const REFERENCE_RUN_METRES: f32 = 91.44;
/// Highest value the 5-digit entry can hold.
pub const MAX_CALIBRATION: u32 = 99_999;
/// Digits in the manual entry display.
pub const ENTRY_DIGITS: usize = 5;

const PLACE_VALUES: [u32; ENTRY_DIGITS] = [1, 10, 100, 1_000, 10_000];

/// `pulses_per_run × 17.6 / 3600`.
pub fn speed_constant_for(pulses_per_run: u32) -> f32 {
    pulses_per_run as f32 * 17.6 / 3600.0
}

/// Validate a candidate: above `minimum` and no wider than the entry.
pub fn check(value: u32, minimum: u32) -> Result<u32, CalibrationError> {
    if value <= minimum {
        Err(CalibrationError::BelowMinimum { value, minimum })
    } else if value > MAX_CALIBRATION {
        Err(CalibrationError::AboveMaximum {
            value,
            maximum: MAX_CALIBRATION,
        })
    } else {
        Ok(value)
    }
}

/// Active calibration with its derived factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pulses_per_run: u32,
    minimum: u32,
    speed_constant: f32,
    pulse_distance_in: f32,
}

impl Calibration {
    pub fn new(pulses_per_run: u32, minimum: u32) -> Result<Self, CalibrationError> {
        let pulses_per_run = check(pulses_per_run, minimum)?;
        Ok(Self {
            pulses_per_run,
            minimum,
            speed_constant: speed_constant_for(pulses_per_run),
            pulse_distance_in: REFERENCE_RUN_INCHES / pulses_per_run as f32,
        })
    }

    pub fn pulses_per_run(&self) -> u32 {
        self.pulses_per_run
    }

    pub fn minimum(&self) -> u32 {
        self.minimum
    }

    pub fn speed_constant(&self) -> f32 {
        self.speed_constant
    }

    /// Distance covered by one pulse, in inches.
    pub fn pulse_distance_in(&self) -> f32 {
        self.pulse_distance_in
    }

    /// Replace the constant.  On rejection the current value is kept.
    pub fn set(&mut self, value: u32) -> Result<u32, CalibrationError> {
        match Self::new(value, self.minimum) {
            Ok(next) => {
                if next.pulses_per_run != self.pulses_per_run {
                    info!(
                        "calibration: {} -> {} (k={:.3})",
                        self.pulses_per_run, next.pulses_per_run, next.speed_constant
                    );
                }
                *self = next;
                Ok(value)
            }
            Err(e) => {
                warn!("calibration: rejected {value}, keeping {}", self.pulses_per_run);
                Err(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Manual entry
// ---------------------------------------------------------------------------

/// Five-digit manual entry.  Each digit rolls over 9 → 0 (and 0 → 9)
/// without carrying into its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationEntry {
    value: u32,
    original: u32,
}

impl CalibrationEntry {
    /// Open the editor seeded with the current constant.  An active
    /// [`Calibration`] never exceeds [`MAX_CALIBRATION`]; anything wider is
    /// clamped to it.
    pub fn open(current: u32) -> Self {
        let current = current.min(MAX_CALIBRATION);
        Self {
            value: current,
            original: current,
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// Value the editor was opened with; restored on cancel or rejection.
    pub fn original(&self) -> u32 {
        self.original
    }

    /// Digit at `place` (0 = units, 4 = ten-thousands).
    pub fn digit(&self, place: usize) -> Option<u8> {
        PLACE_VALUES
            .get(place)
            .map(|&pv| ((self.value / pv) % 10) as u8)
    }

    pub fn increment(&mut self, place: usize) {
        self.step(place, true);
    }

    pub fn decrement(&mut self, place: usize) {
        self.step(place, false);
    }

    fn step(&mut self, place: usize, up: bool) {
        let (Some(&pv), Some(d)) = (PLACE_VALUES.get(place), self.digit(place)) else {
            return;
        };
        let d = u32::from(d);
        let next = if up { (d + 1) % 10 } else { (d + 9) % 10 };
        self.value = self.value - d * pv + next * pv;
    }

    /// Apply the entered value.  On rejection `calibration` is unchanged
    /// and the entry reverts to its original value.
    pub fn commit(&mut self, calibration: &mut Calibration) -> Result<u32, CalibrationError> {
        calibration.set(self.value).inspect_err(|_| {
            self.value = self.original;
        })
    }

    /// Formatted the way the entry screen shows it (`"%05d"`).
    pub fn display(&self) -> heapless::String<ENTRY_DIGITS> {
        let mut s = heapless::String::new();
        for place in (0..ENTRY_DIGITS).rev() {
            let d = self.digit(place).unwrap_or(0);
            let _ = s.push(char::from(b'0' + d));
        }
        s
    }
}
