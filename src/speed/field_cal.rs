//! Field calibration: derive the calibration constant from a 300 ft run.
//!
//! ```text
//!            Start              End (n > min)          Save
//!   Idle ───────────▶ Running ────────────────▶ Stopped ──────▶ Idle
//!     ▲                 │  │                       │               (constant := n)
//!     │   End (n ≤ min) │  │ Cancel                │ Cancel
//!     └─────────────────┴──┴───────────────────────┘
//! ```
//!
//! The session never touches the pulse ISR.  While `Running`, the service
//! routes each epoch's count here instead of to the estimator.

use log::{info, warn};

use crate::error::CalibrationError;
use crate::speed::calibration::{self, Calibration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPhase {
    Idle,
    Running { pulses: u32 },
    Stopped { pulses: u32 },
}

pub struct FieldCalibrationSession {
    phase: FieldPhase,
    minimum: u32,
}

impl FieldCalibrationSession {
    pub fn new(minimum: u32) -> Self {
        Self {
            phase: FieldPhase::Idle,
            minimum,
        }
    }

    pub fn phase(&self) -> FieldPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, FieldPhase::Running { .. })
    }

    /// Pulses captured so far (0 when idle).
    pub fn captured(&self) -> u32 {
        match self.phase {
            FieldPhase::Idle => 0,
            FieldPhase::Running { pulses } | FieldPhase::Stopped { pulses } => pulses,
        }
    }

    /// Begin (or restart) a run from zero.
    pub fn start(&mut self) {
        info!("field cal: run started");
        self.phase = FieldPhase::Running { pulses: 0 };
    }

    /// Add one epoch's pulses.  Ignored unless running.
    pub fn accumulate(&mut self, pulse_count: u32) {
        if let FieldPhase::Running { pulses } = &mut self.phase {
            *pulses = pulses.saturating_add(pulse_count);
        }
    }

    /// Stop accumulating and validate the run.
    ///
    /// A run at or below the minimum, or too long for the five-digit
    /// constant, is discarded and the session returns to `Idle`.
    pub fn end(&mut self) -> Result<u32, CalibrationError> {
        let FieldPhase::Running { pulses } = self.phase else {
            return Err(CalibrationError::NoRunInProgress);
        };
        match calibration::check(pulses, self.minimum) {
            Ok(n) => {
                info!("field cal: run ended with {n} pulses");
                self.phase = FieldPhase::Stopped { pulses: n };
                Ok(n)
            }
            Err(e) => {
                warn!("field cal: run of {pulses} pulses discarded ({e})");
                self.phase = FieldPhase::Idle;
                Err(e)
            }
        }
    }

    /// Replace the calibration constant with the captured run.
    pub fn save(&mut self, calibration: &mut Calibration) -> Result<u32, CalibrationError> {
        let FieldPhase::Stopped { pulses } = self.phase else {
            return Err(CalibrationError::NoRunCaptured);
        };
        let saved = calibration.set(pulses)?;
        self.phase = FieldPhase::Idle;
        Ok(saved)
    }

    /// Abandon the run; the calibration constant is untouched.
    pub fn cancel(&mut self) {
        if self.phase != FieldPhase::Idle {
            info!("field cal: cancelled at {} pulses", self.captured());
        }
        self.phase = FieldPhase::Idle;
    }

    pub fn set_minimum(&mut self, minimum: u32) {
        self.minimum = minimum;
    }
}
