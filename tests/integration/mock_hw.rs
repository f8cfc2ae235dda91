//! Mock adapters for integration tests.
//!
//! Records every alarm output call so tests can assert on the full command
//! history without touching real GPIO or timer registers.

use std::collections::VecDeque;

use speedwatch::app::events::AppEvent;
use speedwatch::app::ports::{
    AlarmOutputPort, ConfigError, ConfigPort, EventSink, SpeedInputPort, StatusLightPort,
};
use speedwatch::config::{InputSource, SystemConfig};
use speedwatch::error::{Error, TimerError};
use speedwatch::sensors::pulse::PulseEpochSample;

// ── Alarm output call record ──────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmCall {
    Light(bool),
    Flash(u32),
    StopFlash,
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    samples: VecDeque<PulseEpochSample>,
    gps: VecDeque<u8>,
    epoch: u32,
    pub alarm_calls: Vec<AlarmCall>,
    pub selected: Vec<InputSource>,
    pub status_toggles: u32,
    /// Every write to the auxiliary output, in order.
    pub aux_writes: Vec<bool>,
    /// Next program/disable of the flash timer fails.
    pub fail_timer: bool,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::new(),
            gps: VecDeque::new(),
            epoch: 0,
            alarm_calls: Vec::new(),
            selected: Vec::new(),
            status_toggles: 0,
            aux_writes: Vec::new(),
            fail_timer: false,
        }
    }

    /// Queue one completed epoch with `pulses` edges.
    pub fn push_epoch(&mut self, pulses: u32) {
        self.epoch += 1;
        self.samples
            .push_back(PulseEpochSample::single(pulses, self.epoch));
    }

    pub fn feed_gps(&mut self, bytes: &[u8]) {
        self.gps.extend(bytes);
    }

    /// Flash period currently running, if any.
    pub fn flash_period(&self) -> Option<u32> {
        self.alarm_calls.iter().rev().find_map(|c| match c {
            AlarmCall::Flash(p) => Some(Some(*p)),
            AlarmCall::StopFlash => Some(None),
            AlarmCall::Light(_) => None,
        })?
    }

    pub fn aux_on(&self) -> bool {
        self.aux_writes.last().copied().unwrap_or(false)
    }

    pub fn light_on(&self) -> bool {
        self.alarm_calls
            .iter()
            .rev()
            .find_map(|c| match c {
                AlarmCall::Light(on) => Some(*on),
                _ => None,
            })
            .unwrap_or(false)
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeedInputPort for MockHardware {
    fn take_pulse_sample(&mut self) -> Option<PulseEpochSample> {
        self.samples.pop_front()
    }

    fn read_gps(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.gps.len());
        for (slot, byte) in buf.iter_mut().zip(self.gps.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn select_input(&mut self, source: InputSource) -> Result<(), Error> {
        self.selected.push(source);
        Ok(())
    }
}

impl AlarmOutputPort for MockHardware {
    fn set_alarm_light(&mut self, on: bool) {
        self.alarm_calls.push(AlarmCall::Light(on));
    }

    fn program_flash(&mut self, period_ms: u32) -> Result<(), TimerError> {
        if self.fail_timer {
            return Err(TimerError::ProgramFailed(-1));
        }
        self.alarm_calls.push(AlarmCall::Flash(period_ms));
        Ok(())
    }

    fn disable_flash(&mut self) -> Result<(), TimerError> {
        if self.fail_timer {
            return Err(TimerError::ProgramFailed(-1));
        }
        self.alarm_calls.push(AlarmCall::StopFlash);
        Ok(())
    }

    fn set_aux_output(&mut self, on: bool) {
        self.aux_writes.push(on);
    }
}

impl StatusLightPort for MockHardware {
    fn toggle_status_light(&mut self) {
        self.status_toggles += 1;
    }
}

// ── MockStore ─────────────────────────────────────────────────

/// In-memory settings store that validates like the NVS adapter.
pub struct MockStore {
    pub saved: Option<SystemConfig>,
    pub saves: u32,
    pub fail_saves: bool,
}

#[allow(dead_code)]
impl MockStore {
    pub fn new() -> Self {
        Self {
            saved: None,
            saves: 0,
            fail_saves: false,
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigPort for MockStore {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        Ok(self.saved.clone().unwrap_or_default())
    }

    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError> {
        speedwatch::config::validate(config)?;
        if self.fail_saves {
            return Err(ConfigError::IoError);
        }
        self.saved = Some(config.clone());
        self.saves += 1;
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
