//! Monitor service: the hexagonal core.
//!
//! [`MonitorService`] owns calibration, the estimator, the GPS assembler,
//! the alarm controller and the field calibration session.  It exposes a
//! hardware-agnostic API: one [`tick`](MonitorService::tick) per 250 ms
//! sample, one [`handle_command`](MonitorService::handle_command) per UI
//! request and a pull-based [`readout`](MonitorService::readout).
//!
//! ```text
//!  SpeedInputPort ──▶ ┌─────────────────────────────┐ ──▶ EventSink
//!                     │        MonitorService       │
//! AlarmOutputPort ◀── │ Estimator · Alarm · FieldCal│ ◀─▶ ConfigPort
//!                     └─────────────────────────────┘
//! ```
//!
//! The instrument [`Mode`] is the single foreground-owned flag that decides
//! where an epoch's pulses go: live speed (`Run`), the field run
//! (`FieldCalibration`), or nowhere (`ManualEntry`).  Interrupts never read
//! it.

use log::{debug, info, warn};

use crate::alarm::{self, AlarmController, AlarmMode};
use crate::config::{self, InputSource, PRESET_COUNT, SpeedUnit, SystemConfig, TARGET_RANGE};
use crate::diagnostics;
use crate::error::{CalibrationError, Error};
use crate::sensors::gps::GpsSpeedSource;
use crate::speed::estimator::{format_speed, kph_to_mph};
use crate::speed::odometer::per_minute;
use crate::speed::{
    Calibration, CalibrationEntry, FieldCalibrationSession, FieldPhase, Odometer, SpeedEstimator,
    VelocityReading,
};

use super::commands::{AppCommand, CommandReply};
use super::events::AppEvent;
use super::ports::{AlarmOutputPort, ConfigPort, EventSink, SpeedInputPort, StatusLightPort};

/// GPS read chunk per UART poll.
const GPS_CHUNK: usize = 64;
/// UART polls per tick.  Bounds the foreground's parsing work.
const GPS_READS_PER_TICK: usize = 8;

/// Readout text while the GPS is searching.
const NO_READING: &str = "--.-";

/// What the instrument is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Live speed display and alarm.
    Run,
    /// Manual 5-digit calibration entry is open.
    ManualEntry(CalibrationEntry),
    /// Field calibration screen is open (see [`FieldPhase`]).
    FieldCalibration,
}

/// Pull-based snapshot for the display.
#[derive(Debug, Clone, PartialEq)]
pub struct Readout {
    pub reading: VelocityReading,
    /// Formatted speed, the live field-run count, or a no-reading marker.
    pub text: heapless::String<12>,
    /// `None` on pulse input.
    pub fix_valid: Option<bool>,
    /// Feet (mph mode) or metres (kph mode).
    pub distance: f32,
    /// Feet or metres per minute.
    pub per_minute: f32,
    pub alarm: AlarmMode,
    /// Pulses captured by the field run while one is open.
    pub field_pulses: Option<u32>,
    pub calibration: u32,
    pub unit: SpeedUnit,
}

// ───────────────────────────────────────────────────────────────
// MonitorService
// ───────────────────────────────────────────────────────────────

pub struct MonitorService {
    config: SystemConfig,
    calibration: Calibration,
    estimator: SpeedEstimator,
    gps: GpsSpeedSource,
    alarm: AlarmController,
    field: FieldCalibrationSession,
    odometer: Odometer,
    mode: Mode,
    fix_valid: bool,
    last_epoch: u32,
    tick_count: u64,
    settings_dirty: bool,
}

impl MonitorService {
    /// Construct the service from validated configuration.
    pub fn new(config: SystemConfig) -> Result<Self, Error> {
        config::validate(&config)?;
        let calibration = Calibration::new(config.calibration_constant, config.min_calibration)?;

        Ok(Self {
            estimator: SpeedEstimator::new(config.unit, config.speed_averaging, config.input_source),
            gps: GpsSpeedSource::new(config.gps_min_speed_mph),
            alarm: AlarmController::new(config.flash_table.clone()),
            field: FieldCalibrationSession::new(config.min_calibration),
            odometer: Odometer::new(),
            mode: Mode::Run,
            fix_valid: false,
            last_epoch: 0,
            tick_count: 0,
            settings_dirty: false,
            calibration,
            config,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Route the speed input and announce startup.
    pub fn start(
        &mut self,
        hw: &mut impl SpeedInputPort,
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        hw.select_input(self.config.input_source)?;
        info!(
            "MonitorService started: input={:?} unit={} cal={}",
            self.config.input_source,
            self.config.unit.label(),
            self.calibration.pulses_per_run()
        );
        sink.emit(&AppEvent::Started {
            source: self.config.input_source,
            unit: self.config.unit,
            calibration: self.calibration.pulses_per_run(),
        });
        Ok(())
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one sample-clock cycle: heartbeat → sample/GPS → alarm → aux.
    ///
    /// Only a timer fault is returned as an error; everything else is
    /// recovered here.
    pub fn tick(
        &mut self,
        hw: &mut (impl SpeedInputPort + AlarmOutputPort + StatusLightPort),
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        self.tick_count += 1;
        hw.toggle_status_light();

        // 1. Pulse epoch (always drained so it can't go stale)
        let sample = hw.take_pulse_sample();
        if let Some(s) = sample {
            diagnostics::record_sample();
            self.last_epoch = s.epoch;
        }

        // 2. Route by mode and input
        match (self.mode, self.config.input_source) {
            (Mode::FieldCalibration, _) => {
                if let Some(s) = sample {
                    self.field.accumulate(s.pulse_count);
                }
            }
            (Mode::Run, InputSource::Pulse) => {
                if let Some(s) = sample {
                    let reading = self
                        .estimator
                        .on_pulse_sample(s, self.calibration.speed_constant());
                    self.odometer
                        .add_pulses(s.pulse_count, self.calibration.pulse_distance_in());
                    sink.emit(&AppEvent::Reading(reading));
                }
            }
            (_, InputSource::Gps) => self.poll_gps(hw, sink),
            (Mode::ManualEntry(_), InputSource::Pulse) => {}
        }

        // 3. Alarm
        let next = if self.mode == Mode::Run {
            self.alarm.evaluate(
                self.config.alarm_enabled,
                self.config.speed_target,
                self.estimator.current().value_or_zero(),
            )
        } else {
            AlarmMode::Off
        };
        if let Some((from, to)) = self.alarm.apply(next, hw)? {
            diagnostics::record_alarm_reprogram();
            sink.emit(&AppEvent::AlarmChanged { from, to });
        }

        // 4. Auxiliary output
        let over = self.mode == Mode::Run
            && alarm::over_target(
                self.config.alarm_enabled,
                self.config.speed_target,
                self.estimator.current().value_or_zero(),
            );
        self.alarm.drive_aux(over, hw);

        Ok(())
    }

    /// Drain buffered GPS bytes between ticks.  No-op on pulse input.
    pub fn poll_gps_input(&mut self, hw: &mut impl SpeedInputPort, sink: &mut impl EventSink) {
        if self.config.input_source == InputSource::Gps {
            self.poll_gps(hw, sink);
        }
    }

    fn poll_gps(&mut self, hw: &mut impl SpeedInputPort, sink: &mut impl EventSink) {
        let mut buf = [0u8; GPS_CHUNK];
        for _ in 0..GPS_READS_PER_TICK {
            let n = hw.read_gps(&mut buf);
            if n == 0 {
                break;
            }
            for &byte in &buf[..n.min(GPS_CHUNK)] {
                match self.gps.push(byte) {
                    None => {}
                    Some(Ok(fix)) => {
                        diagnostics::record_sentence(true);
                        if fix.fix_valid != self.fix_valid {
                            info!("gps: fix {}", if fix.fix_valid { "acquired" } else { "lost" });
                        }
                        self.fix_valid = fix.fix_valid;
                        let reading = self.estimator.on_gps_fix(fix, self.last_epoch);
                        sink.emit(&AppEvent::Reading(reading));
                    }
                    Some(Err(e)) => {
                        diagnostics::record_sentence(false);
                        debug!("gps: sentence discarded: {e}");
                        sink.emit(&AppEvent::SentenceDiscarded(e));
                    }
                }
            }
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process one UI command.  Accepted settings changes are committed
    /// through `store` immediately.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        hw: &mut impl SpeedInputPort,
        store: &mut impl ConfigPort,
        sink: &mut impl EventSink,
    ) -> CommandReply {
        let result = self.dispatch(cmd, hw, sink);
        match result {
            Ok(true) => self.persist(store, sink),
            Ok(false) => {}
            Err(e) => warn!("command {:?} rejected: {}", cmd, e),
        }
        CommandReply {
            result: result.map(|_| ()),
            calibration: self.calibration.pulses_per_run(),
        }
    }

    /// Apply a command.  `Ok(true)` means persisted settings changed.
    fn dispatch(
        &mut self,
        cmd: AppCommand,
        hw: &mut impl SpeedInputPort,
        sink: &mut impl EventSink,
    ) -> Result<bool, Error> {
        match cmd {
            AppCommand::SetUnit(unit) => {
                self.config.unit = unit;
                self.estimator.set_unit(unit);
                info!("unit: {}", unit.label());
                Ok(true)
            }
            AppCommand::SetAveraging(on) => {
                self.config.speed_averaging = on;
                self.estimator.set_averaging(on);
                Ok(true)
            }
            AppCommand::SetInputSource(source) => self.switch_input(source, hw, sink),
            AppCommand::ResetDistance => {
                self.odometer.reset();
                Ok(false)
            }

            AppCommand::SetAlarmEnabled(on) => {
                self.config.alarm_enabled = on;
                info!("alarm: {}", if on { "enabled" } else { "disabled" });
                Ok(true)
            }
            AppCommand::SetThreshold(value) => {
                check_target(value)?;
                self.config.speed_target = value;
                info!("alarm: threshold {value:.1}");
                Ok(true)
            }
            AppCommand::SelectPreset(n) => {
                let idx = preset_index(n)?;
                self.config.speed_target = self.config.alarm_presets[idx];
                info!("alarm: preset {n} -> threshold {:.1}", self.config.speed_target);
                Ok(true)
            }
            AppCommand::SetPreset { index, value } => {
                let idx = preset_index(index)?;
                check_target(value)?;
                self.config.alarm_presets[idx] = value;
                Ok(true)
            }

            AppCommand::OpenEntry => {
                self.close_field(sink);
                self.mode = Mode::ManualEntry(CalibrationEntry::open(
                    self.calibration.pulses_per_run(),
                ));
                Ok(false)
            }
            AppCommand::EntryIncrement(place) => {
                self.entry_mut()?.increment(place);
                Ok(false)
            }
            AppCommand::EntryDecrement(place) => {
                self.entry_mut()?.decrement(place);
                Ok(false)
            }
            AppCommand::EntrySave => {
                let Mode::ManualEntry(entry) = &mut self.mode else {
                    return Err(CalibrationError::EntryNotOpen.into());
                };
                let from = self.calibration.pulses_per_run();
                match entry.commit(&mut self.calibration) {
                    Ok(to) => {
                        self.mode = Mode::Run;
                        self.calibration_changed(from, to, sink);
                        Ok(true)
                    }
                    Err(e) => Err(self.calibration_rejected(e, sink)),
                }
            }
            AppCommand::EntryCancel => {
                self.entry_mut()?;
                self.mode = Mode::Run;
                Ok(false)
            }

            AppCommand::FieldStart => {
                if self.config.input_source != InputSource::Pulse {
                    return Err(Error::Config("field calibration needs the pulse input"));
                }
                self.mode = Mode::FieldCalibration;
                self.field_transition(sink, FieldCalibrationSession::start);
                Ok(false)
            }
            AppCommand::FieldEnd => {
                let from = self.field.phase();
                let result = self.field.end();
                self.emit_field_phase(from, sink);
                result
                    .map(|_| false)
                    .map_err(|e| self.calibration_rejected(e, sink))
            }
            AppCommand::FieldSave => {
                let from_phase = self.field.phase();
                let from = self.calibration.pulses_per_run();
                let to = self
                    .field
                    .save(&mut self.calibration)
                    .map_err(|e| self.calibration_rejected(e, sink))?;
                self.emit_field_phase(from_phase, sink);
                self.mode = Mode::Run;
                self.calibration_changed(from, to, sink);
                Ok(true)
            }
            AppCommand::FieldCancel => {
                self.close_field(sink);
                Ok(false)
            }
        }
    }

    fn switch_input(
        &mut self,
        source: InputSource,
        hw: &mut impl SpeedInputPort,
        sink: &mut impl EventSink,
    ) -> Result<bool, Error> {
        if source == self.config.input_source {
            return Ok(false);
        }
        hw.select_input(source)?;
        if source == InputSource::Gps {
            self.close_field(sink);
        }
        self.config.input_source = source;
        self.estimator.reset(source);
        self.gps.reset();
        self.fix_valid = false;
        info!("input: {:?}", source);
        sink.emit(&AppEvent::InputChanged(source));
        Ok(true)
    }

    fn entry_mut(&mut self) -> Result<&mut CalibrationEntry, Error> {
        match &mut self.mode {
            Mode::ManualEntry(entry) => Ok(entry),
            _ => Err(CalibrationError::EntryNotOpen.into()),
        }
    }

    /// Cancel any field run and leave the field screen.
    fn close_field(&mut self, sink: &mut impl EventSink) {
        self.field_transition(sink, FieldCalibrationSession::cancel);
        if self.mode == Mode::FieldCalibration {
            self.mode = Mode::Run;
        }
    }

    fn field_transition(
        &mut self,
        sink: &mut impl EventSink,
        step: impl FnOnce(&mut FieldCalibrationSession),
    ) {
        let from = self.field.phase();
        step(&mut self.field);
        self.emit_field_phase(from, sink);
    }

    fn emit_field_phase(&self, from: FieldPhase, sink: &mut impl EventSink) {
        let to = self.field.phase();
        if from != to {
            sink.emit(&AppEvent::FieldPhaseChanged { from, to });
        }
    }

    fn calibration_changed(&mut self, from: u32, to: u32, sink: &mut impl EventSink) {
        self.config.calibration_constant = to;
        if from != to {
            sink.emit(&AppEvent::CalibrationChanged { from, to });
        }
    }

    fn calibration_rejected(&self, e: CalibrationError, sink: &mut impl EventSink) -> Error {
        if matches!(
            e,
            CalibrationError::BelowMinimum { .. } | CalibrationError::AboveMaximum { .. }
        ) {
            diagnostics::record_calibration_rejected();
            sink.emit(&AppEvent::CalibrationRejected(e));
        }
        e.into()
    }

    // ── Persistence ───────────────────────────────────────────

    fn persist(&mut self, store: &mut impl ConfigPort, sink: &mut impl EventSink) {
        match store.save(&self.config) {
            Ok(()) => {
                self.settings_dirty = false;
                sink.emit(&AppEvent::SettingsSaved);
            }
            Err(e) => {
                self.settings_dirty = true;
                diagnostics::record_settings_save_failure();
                warn!("settings save failed ({e}); will retry");
            }
        }
    }

    /// Retry a failed commit.  Returns `true` if settings were saved.
    pub fn save_if_dirty(
        &mut self,
        store: &mut impl ConfigPort,
        sink: &mut impl EventSink,
    ) -> bool {
        if !self.settings_dirty {
            return false;
        }
        self.persist(store, sink);
        !self.settings_dirty
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn readout(&self) -> Readout {
        let reading = self.estimator.current();
        let unit = self.config.unit;

        let field_pulses = match (self.mode, self.field.phase()) {
            (Mode::FieldCalibration, FieldPhase::Running { pulses } | FieldPhase::Stopped { pulses }) => {
                Some(pulses)
            }
            _ => None,
        };

        let text = if let Some(pulses) = field_pulses {
            let mut s = heapless::String::new();
            let _ = core::fmt::Write::write_fmt(&mut s, format_args!("{pulses}"));
            s
        } else if let Some(v) = reading.value {
            format_speed(v, self.config.display_decimal_limit)
        } else {
            let mut s = heapless::String::new();
            let _ = s.push_str(NO_READING);
            s
        };

        let mph = reading.value.map_or(0.0, |v| match reading.unit {
            SpeedUnit::Mph => v,
            SpeedUnit::Kph => kph_to_mph(v),
        });

        Readout {
            reading,
            text,
            fix_valid: (self.config.input_source == InputSource::Gps).then_some(self.fix_valid),
            distance: self.odometer.distance(unit),
            per_minute: per_minute(mph, unit),
            alarm: self.alarm.mode(),
            field_pulses,
            calibration: self.calibration.pulses_per_run(),
            unit,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn field_phase(&self) -> FieldPhase {
        self.field.phase()
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn alarm_mode(&self) -> AlarmMode {
        self.alarm.mode()
    }

    pub fn aux_output_on(&self) -> bool {
        self.alarm.aux_on()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn is_settings_dirty(&self) -> bool {
        self.settings_dirty
    }
}

fn check_target(value: f32) -> Result<(), Error> {
    if TARGET_RANGE.contains(&value) {
        Ok(())
    } else {
        Err(Error::Config("alarm target must be 0.5–30.0"))
    }
}

/// 1-based preset number → array index.
fn preset_index(n: usize) -> Result<usize, Error> {
    if (1..=PRESET_COUNT).contains(&n) {
        Ok(n - 1)
    } else {
        Err(Error::Config("preset must be 1–4"))
    }
}
