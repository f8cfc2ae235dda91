//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the alarm light, the auxiliary output and the status light.  It
//! exposes them, together with the pulse hand-off and the GPS UART, through
//! [`SpeedInputPort`], [`AlarmOutputPort`] and [`StatusLightPort`].  This is the only module
//! in the system that touches actual hardware.  On non-espidf targets the
//! GPS UART is replaced by an in-memory byte feed ([`HardwareAdapter::feed_gps`]).

#[cfg(not(target_os = "espidf"))]
use std::collections::VecDeque;

use embedded_hal::digital::{OutputPin, StatefulOutputPin};
use log::debug;

use crate::app::ports::{AlarmOutputPort, SpeedInputPort, StatusLightPort};
use crate::config::InputSource;
use crate::drivers::alarm_light::AlarmLight;
use crate::drivers::hw_init;
use crate::drivers::status_light::StatusLight;
use crate::error::{Error, TimerError};
use crate::sensors::pulse::{PULSE_EPOCHS, PulseEpochSample};

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<A, S> {
    alarm: AlarmLight<A>,
    /// Panel lamp relay; shares the alarm light's pin type.
    aux: A,
    status: StatusLight<S>,
    source: InputSource,
    #[cfg(not(target_os = "espidf"))]
    gps_feed: VecDeque<u8>,
}

impl<A: OutputPin, S: StatefulOutputPin> HardwareAdapter<A, S> {
    pub fn new(alarm: AlarmLight<A>, mut aux: A, status: StatusLight<S>) -> Self {
        let _ = aux.set_low();
        Self {
            alarm,
            aux,
            status,
            source: InputSource::Pulse,
            #[cfg(not(target_os = "espidf"))]
            gps_feed: VecDeque::new(),
        }
    }

    pub fn input_source(&self) -> InputSource {
        self.source
    }

    pub fn alarm_light(&self) -> &AlarmLight<A> {
        &self.alarm
    }

    pub fn status_light(&mut self) -> &mut StatusLight<S> {
        &mut self.status
    }

    /// Host-only: queue bytes as if the GPS receiver had sent them.
    #[cfg(not(target_os = "espidf"))]
    pub fn feed_gps(&mut self, bytes: &[u8]) {
        self.gps_feed.extend(bytes);
        crate::events::push_event(crate::events::Event::GpsRx);
    }
}

// ── SpeedInputPort implementation ─────────────────────────────

impl<A: OutputPin, S: StatefulOutputPin> SpeedInputPort for HardwareAdapter<A, S> {
    fn take_pulse_sample(&mut self) -> Option<PulseEpochSample> {
        PULSE_EPOCHS.take_sample()
    }

    fn read_gps(&mut self, buf: &mut [u8]) -> usize {
        if self.source != InputSource::Gps {
            return 0;
        }

        #[cfg(target_os = "espidf")]
        {
            hw_init::gps_read(buf)
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let n = buf.len().min(self.gps_feed.len());
            for (slot, byte) in buf.iter_mut().zip(self.gps_feed.drain(..n)) {
                *slot = byte;
            }
            n
        }
    }

    fn select_input(&mut self, source: InputSource) -> Result<(), Error> {
        hw_init::select_input(source)?;
        self.source = source;
        // Epoch counts gathered under the old routing are meaningless.
        let _ = PULSE_EPOCHS.take_sample();
        Ok(())
    }
}

// ── AlarmOutputPort implementation ────────────────────────────

impl<A: OutputPin, S: StatefulOutputPin> AlarmOutputPort for HardwareAdapter<A, S> {
    fn set_alarm_light(&mut self, on: bool) {
        self.alarm.set(on);
    }

    fn program_flash(&mut self, period_ms: u32) -> Result<(), TimerError> {
        self.alarm.flash(period_ms)
    }

    fn disable_flash(&mut self) -> Result<(), TimerError> {
        self.alarm.stop_flash()
    }

    fn set_aux_output(&mut self, on: bool) {
        let result = if on { self.aux.set_high() } else { self.aux.set_low() };
        if result.is_err() {
            debug!("aux output: pin write failed");
        }
    }
}

// ── StatusLightPort implementation ────────────────────────────

impl<A: OutputPin, S: StatefulOutputPin> StatusLightPort for HardwareAdapter<A, S> {
    fn toggle_status_light(&mut self) {
        self.status.toggle();
    }
}
