//! Distance travelled and per-minute rate.

use crate::config::SpeedUnit;

const INCHES_PER_FOOT: f64 = 12.0;
const METRES_PER_FOOT: f32 = 0.3048;
/// mph → feet per minute (5280 / 60).
const FPM_PER_MPH: f32 = 88.0;

/// Running distance, accumulated per epoch so a calibration change only
/// affects distance travelled after it.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Odometer {
    inches: f64,
}

impl Odometer {
    pub const fn new() -> Self {
        Self { inches: 0.0 }
    }

    pub fn add_pulses(&mut self, pulse_count: u32, pulse_distance_in: f32) {
        self.inches += f64::from(pulse_count) * f64::from(pulse_distance_in);
    }

    pub fn reset(&mut self) {
        self.inches = 0.0;
    }

    pub fn feet(&self) -> f32 {
        (self.inches / INCHES_PER_FOOT) as f32
    }

    /// Feet in mph mode, metres in kph mode.
    pub fn distance(&self, unit: SpeedUnit) -> f32 {
        match unit {
            SpeedUnit::Mph => self.feet(),
            SpeedUnit::Kph => self.feet() * METRES_PER_FOOT,
        }
    }
}

/// Feet per minute in mph mode, metres per minute in kph mode.
pub fn per_minute(velocity_mph: f32, unit: SpeedUnit) -> f32 {
    let fpm = velocity_mph * FPM_PER_MPH;
    match unit {
        SpeedUnit::Mph => fpm,
        SpeedUnit::Kph => fpm * METRES_PER_FOOT,
    }
}
