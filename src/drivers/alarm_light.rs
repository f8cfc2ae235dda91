//! Front-panel alarm light.
//!
//! Steady on/off is a direct pin write.  Flashing is owned by the
//! [`FlashTimer`], whose ISR toggles the same pin; the driver only
//! starts, re-times and stops it.

use embedded_hal::digital::OutputPin;
use log::debug;

use crate::drivers::hw_timer::FlashTimer;
use crate::error::TimerError;

pub struct AlarmLight<P> {
    pin: P,
    flash: FlashTimer,
}

impl<P: OutputPin> AlarmLight<P> {
    /// Light starts dark with the flash timer stopped.
    pub fn new(mut pin: P, flash: FlashTimer) -> Self {
        let _ = pin.set_low();
        Self { pin, flash }
    }

    pub fn set(&mut self, on: bool) {
        let result = if on { self.pin.set_high() } else { self.pin.set_low() };
        if result.is_err() {
            debug!("alarm_light: pin write failed");
        }
    }

    pub fn flash(&mut self, period_ms: u32) -> Result<(), TimerError> {
        self.flash.program(period_ms)
    }

    pub fn stop_flash(&mut self) -> Result<(), TimerError> {
        self.flash.disable()
    }

    /// Programmed flash period, `None` when steady or off.
    pub fn flash_period_ms(&self) -> Option<u32> {
        self.flash.period_ms()
    }
}
