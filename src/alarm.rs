//! Target-speed alarm.
//!
//! The mode is a pure function of `(enabled, threshold, velocity)`:
//!
//! | Condition                          | Mode                          |
//! |------------------------------------|-------------------------------|
//! | alarm disabled                     | `Off`                         |
//! | velocity ≤ 0                       | `Off`                         |
//! | velocity ≥ threshold               | `Steady`                      |
//! | threshold − velocity ≤ 1.0         | `Flashing(table[gap])`        |
//! | otherwise                          | `Off`                         |
//!
//! In `Flashing` the flash timer ISR toggles the light every period; the
//! controller only rewrites that period when the mode changes.  A reprogram
//! may race one in-flight tick of the old period, which is accepted.
//!
//! The auxiliary output is simpler: on while the alarm is enabled and the
//! velocity is strictly above the threshold, off otherwise.

use log::info;

use crate::app::ports::AlarmOutputPort;
use crate::config::{FLASH_WINDOW, FlashTable, GAP_TOLERANCE};
use crate::error::TimerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmMode {
    Off,
    Steady,
    Flashing { period_ms: u32 },
}

impl core::fmt::Display for AlarmMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Off => write!(f, "Off"),
            Self::Steady => write!(f, "Steady"),
            Self::Flashing { period_ms } => write!(f, "Flashing({period_ms}ms)"),
        }
    }
}

/// Compute the alarm mode.  No side effects.
pub fn evaluate(enabled: bool, threshold: f32, velocity: f32, table: &FlashTable) -> AlarmMode {
    if !enabled || velocity.is_nan() || velocity <= 0.0 {
        return AlarmMode::Off;
    }
    if velocity >= threshold {
        return AlarmMode::Steady;
    }
    let gap = threshold - velocity;
    if gap > FLASH_WINDOW + GAP_TOLERANCE {
        return AlarmMode::Off;
    }
    table
        .period_for(gap)
        .map_or(AlarmMode::Off, |period_ms| AlarmMode::Flashing { period_ms })
}

/// Whether the auxiliary output should be on.  No side effects.
pub fn over_target(enabled: bool, threshold: f32, velocity: f32) -> bool {
    enabled && velocity > threshold
}

/// Owns the flash table and the state currently driven onto the outputs.
pub struct AlarmController {
    table: FlashTable,
    programmed: AlarmMode,
    aux_on: bool,
}

impl AlarmController {
    pub fn new(table: FlashTable) -> Self {
        Self {
            table,
            programmed: AlarmMode::Off,
            aux_on: false,
        }
    }

    pub fn mode(&self) -> AlarmMode {
        self.programmed
    }

    pub fn aux_on(&self) -> bool {
        self.aux_on
    }

    pub fn table(&self) -> &FlashTable {
        &self.table
    }

    pub fn set_table(&mut self, table: FlashTable) {
        self.table = table;
    }

    pub fn evaluate(&self, enabled: bool, threshold: f32, velocity: f32) -> AlarmMode {
        evaluate(enabled, threshold, velocity, &self.table)
    }

    /// Evaluate and drive the output.  Returns `(from, to)` when the mode
    /// changed.
    pub fn update<O: AlarmOutputPort + ?Sized>(
        &mut self,
        enabled: bool,
        threshold: f32,
        velocity: f32,
        out: &mut O,
    ) -> Result<Option<(AlarmMode, AlarmMode)>, TimerError> {
        let next = self.evaluate(enabled, threshold, velocity);
        self.apply(next, out)
    }

    /// Drive `next` onto the output if it differs from what is programmed.
    pub fn apply<O: AlarmOutputPort + ?Sized>(
        &mut self,
        next: AlarmMode,
        out: &mut O,
    ) -> Result<Option<(AlarmMode, AlarmMode)>, TimerError> {
        let prev = self.programmed;
        if next == prev {
            return Ok(None);
        }

        match next {
            AlarmMode::Off => {
                out.disable_flash()?;
                out.set_alarm_light(false);
            }
            AlarmMode::Steady => {
                out.disable_flash()?;
                out.set_alarm_light(true);
            }
            AlarmMode::Flashing { period_ms } => {
                out.program_flash(period_ms)?;
            }
        }

        info!("alarm: {prev} -> {next}");
        self.programmed = next;
        Ok(Some((prev, next)))
    }

    /// Switch the auxiliary output.  The pin is written only on a change;
    /// returns `true` when it was.
    pub fn drive_aux<O: AlarmOutputPort + ?Sized>(&mut self, on: bool, out: &mut O) -> bool {
        if on == self.aux_on {
            return false;
        }
        out.set_aux_output(on);
        info!("alarm: aux output {}", if on { "on" } else { "off" });
        self.aux_on = on;
        true
    }

    /// Force the output dark regardless of speed.
    pub fn silence<O: AlarmOutputPort + ?Sized>(
        &mut self,
        out: &mut O,
    ) -> Result<Option<(AlarmMode, AlarmMode)>, TimerError> {
        self.apply(AlarmMode::Off, out)
    }
}
