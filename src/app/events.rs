//! Outbound application events.
//!
//! The [`MonitorService`](super::service::MonitorService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.

use crate::alarm::AlarmMode;
use crate::config::{InputSource, SpeedUnit};
use crate::error::{CalibrationError, SentenceError};
use crate::speed::{FieldPhase, VelocityReading};

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started.
    Started {
        source: InputSource,
        unit: SpeedUnit,
        calibration: u32,
    },

    /// A new velocity reading was published.
    Reading(VelocityReading),

    /// The alarm output changed mode.
    AlarmChanged { from: AlarmMode, to: AlarmMode },

    /// The calibration constant was replaced.
    CalibrationChanged { from: u32, to: u32 },

    /// A manual or field-run calibration value was out of range.
    CalibrationRejected(CalibrationError),

    /// The field run moved between phases.
    FieldPhaseChanged { from: FieldPhase, to: FieldPhase },

    /// The speed input was switched.
    InputChanged(InputSource),

    /// A GPS sentence was thrown away.
    SentenceDiscarded(SentenceError),

    /// Settings were committed to storage.
    SettingsSaved,
}
