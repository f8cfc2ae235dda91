//! On-board status light.
//!
//! Toggled once per sample tick as a heartbeat: a light that stops
//! blinking means the sample clock has stalled.  Generic over any
//! `embedded-hal` stateful output so tests can drive it with a plain pin.

use embedded_hal::digital::StatefulOutputPin;

pub struct StatusLight<P> {
    pin: P,
    toggles: u32,
}

impl<P: StatefulOutputPin> StatusLight<P> {
    pub fn new(mut pin: P) -> Self {
        let _ = pin.set_low();
        Self { pin, toggles: 0 }
    }

    pub fn toggle(&mut self) {
        if self.pin.toggle().is_ok() {
            self.toggles = self.toggles.wrapping_add(1);
        }
    }

    pub fn is_on(&mut self) -> bool {
        self.pin.is_set_high().unwrap_or(false)
    }

    /// Heartbeats since boot.
    pub fn toggles(&self) -> u32 {
        self.toggles
    }
}
