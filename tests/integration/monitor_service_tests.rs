//! Integration tests for the MonitorService → estimator / alarm / calibration
//! pipeline.
//!
//! These run on the host (x86_64) and drive the service through mock
//! adapters exactly as the foreground loop does: one `tick` per sample
//! clock expiry, one `handle_command` per UI request.

use crate::mock_hw::{AlarmCall, MockHardware, MockStore, RecordingSink};

use speedwatch::alarm::AlarmMode;
use speedwatch::app::commands::AppCommand;
use speedwatch::app::events::AppEvent;
use speedwatch::app::service::{Mode, MonitorService};
use speedwatch::config::{InputSource, SpeedUnit, SystemConfig};
use speedwatch::error::{CalibrationError, Error, SentenceError, TimerError};
use speedwatch::speed::FieldPhase;

struct Rig {
    svc: MonitorService,
    hw: MockHardware,
    store: MockStore,
    sink: RecordingSink,
}

impl Rig {
    fn with(config: SystemConfig) -> Self {
        let mut svc = MonitorService::new(config).unwrap();
        let mut hw = MockHardware::new();
        let mut sink = RecordingSink::new();
        svc.start(&mut hw, &mut sink).unwrap();
        Self {
            svc,
            hw,
            store: MockStore::new(),
            sink,
        }
    }

    /// Calibration 3600 → 1 inch per pulse, 4.4 pulses per epoch per mph.
    fn unsmoothed() -> Self {
        Self::with(SystemConfig {
            calibration_constant: 3600,
            speed_averaging: false,
            ..Default::default()
        })
    }

    fn epoch(&mut self, pulses: u32) {
        self.hw.push_epoch(pulses);
        self.svc.tick(&mut self.hw, &mut self.sink).unwrap();
    }

    fn idle_tick(&mut self) {
        self.svc.tick(&mut self.hw, &mut self.sink).unwrap();
    }

    fn cmd(&mut self, cmd: AppCommand) -> Result<(), Error> {
        self.svc
            .handle_command(cmd, &mut self.hw, &mut self.store, &mut self.sink)
            .result
    }

    fn speed(&self) -> f32 {
        self.svc.readout().reading.value.unwrap()
    }
}

// ── Start-up ──────────────────────────────────────────────────

#[test]
fn start_routes_input_and_announces() {
    let rig = Rig::with(SystemConfig::default());
    assert_eq!(rig.hw.selected, vec![InputSource::Pulse]);
    assert_eq!(
        rig.sink.events[0],
        AppEvent::Started {
            source: InputSource::Pulse,
            unit: SpeedUnit::Mph,
            calibration: 17_896,
        }
    );
}

#[test]
fn every_tick_toggles_the_status_light() {
    let mut rig = Rig::unsmoothed();
    rig.epoch(10);
    rig.idle_tick();
    rig.idle_tick();
    assert_eq!(rig.hw.status_toggles, 3);
    assert_eq!(rig.svc.tick_count(), 3);
}

// ── Pulse speed ───────────────────────────────────────────────

#[test]
fn pulse_epoch_produces_reading_and_readout() {
    let mut rig = Rig::with(SystemConfig {
        calibration_constant: 3000,
        speed_averaging: false,
        ..Default::default()
    });
    rig.epoch(22);

    let r = rig.svc.readout();
    assert!((rig.speed() - 6.0).abs() < 1e-3);
    assert_eq!(r.text.as_str(), " 6.0");
    assert_eq!(r.reading.source, InputSource::Pulse);
    assert_eq!(r.reading.epoch, 1);
    assert_eq!(r.fix_valid, None);
    assert!(
        rig.sink
            .events
            .iter()
            .any(|e| matches!(e, AppEvent::Reading(r) if r.epoch == 1))
    );
}

#[test]
fn stable_speed_converges_with_smoothing() {
    let mut rig = Rig::with(SystemConfig {
        calibration_constant: 3600,
        ..Default::default()
    });
    for _ in 0..20 {
        rig.epoch(40);
    }
    assert!((rig.speed() - 40.0 / 4.4).abs() < 1e-3);
}

#[test]
fn abrupt_stop_is_not_masked_by_smoothing() {
    let mut rig = Rig::with(SystemConfig {
        calibration_constant: 3600,
        ..Default::default()
    });
    for _ in 0..5 {
        rig.epoch(40);
    }
    rig.epoch(0);
    assert_eq!(rig.speed(), 0.0);
}

#[test]
fn unit_switch_converts_reading_and_distance() {
    let mut rig = Rig::unsmoothed();
    for _ in 0..3 {
        rig.epoch(40);
    }
    let mph = rig.speed();
    let r = rig.svc.readout();
    assert!((r.distance - 10.0).abs() < 1e-4, "120 in = 10 ft");
    assert!((r.per_minute - mph * 88.0).abs() < 1e-2);

    rig.cmd(AppCommand::SetUnit(SpeedUnit::Kph)).unwrap();
    let r = rig.svc.readout();
    assert_eq!(r.unit, SpeedUnit::Kph);
    assert!((rig.speed() - mph * 1.609_344).abs() < 1e-3);
    assert!((r.distance - 3.048).abs() < 1e-4);
    assert_eq!(rig.store.saved.as_ref().unwrap().unit, SpeedUnit::Kph);
}

#[test]
fn reset_distance_zeroes_the_odometer() {
    let mut rig = Rig::unsmoothed();
    rig.epoch(120);
    assert!(rig.svc.readout().distance > 0.0);
    rig.cmd(AppCommand::ResetDistance).unwrap();
    assert_eq!(rig.svc.readout().distance, 0.0);
    assert_eq!(rig.store.saves, 0, "distance is not a persisted setting");
}

// ── Alarm ─────────────────────────────────────────────────────

#[test]
fn alarm_sweep_off_flashing_steady() {
    let mut rig = Rig::unsmoothed();
    // Threshold 10 mph; v = pulses / 4.4.
    let sweep = [
        (39, AlarmMode::Off),
        (40, AlarmMode::Flashing { period_ms: 700 }),
        (41, AlarmMode::Flashing { period_ms: 500 }),
        (42, AlarmMode::Flashing { period_ms: 300 }),
        (43, AlarmMode::Flashing { period_ms: 150 }),
        (45, AlarmMode::Steady),
    ];
    for (pulses, expected) in sweep {
        rig.epoch(pulses);
        assert_eq!(rig.svc.alarm_mode(), expected, "{pulses} pulses");
    }

    assert_eq!(
        rig.hw.alarm_calls,
        vec![
            AlarmCall::Flash(700),
            AlarmCall::Flash(500),
            AlarmCall::Flash(300),
            AlarmCall::Flash(150),
            AlarmCall::StopFlash,
            AlarmCall::Light(true),
        ]
    );
}

#[test]
fn unchanged_mode_does_not_reprogram_the_timer() {
    let mut rig = Rig::unsmoothed();
    rig.epoch(42);
    rig.epoch(42);
    rig.epoch(42);
    assert_eq!(rig.hw.alarm_calls, vec![AlarmCall::Flash(300)]);
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::AlarmChanged { .. })),
        1
    );
}

#[test]
fn stopping_turns_the_alarm_off() {
    let mut rig = Rig::unsmoothed();
    rig.epoch(45);
    assert_eq!(rig.svc.alarm_mode(), AlarmMode::Steady);
    rig.epoch(0);
    assert_eq!(rig.svc.alarm_mode(), AlarmMode::Off);
    assert!(!rig.hw.light_on());
    assert_eq!(rig.hw.flash_period(), None);
}

#[test]
fn disabled_alarm_stays_off() {
    let mut rig = Rig::unsmoothed();
    rig.cmd(AppCommand::SetAlarmEnabled(false)).unwrap();
    rig.epoch(45);
    assert_eq!(rig.svc.alarm_mode(), AlarmMode::Off);
    assert!(rig.hw.alarm_calls.is_empty());
}

#[test]
fn alarm_is_off_while_calibrating() {
    let mut rig = Rig::unsmoothed();
    rig.epoch(45);
    assert_eq!(rig.svc.alarm_mode(), AlarmMode::Steady);

    rig.cmd(AppCommand::OpenEntry).unwrap();
    rig.idle_tick();
    assert_eq!(rig.svc.alarm_mode(), AlarmMode::Off);
    assert!(!rig.hw.light_on());
}

#[test]
fn aux_output_follows_over_target() {
    let mut rig = Rig::unsmoothed();
    // Threshold 10 mph: 43 pulses is just under it, 45 is above it.
    rig.epoch(43);
    assert!(!rig.svc.aux_output_on());
    rig.epoch(45);
    assert!(rig.svc.aux_output_on());
    rig.epoch(46);
    rig.epoch(20);
    assert!(!rig.hw.aux_on());
    assert_eq!(rig.hw.aux_writes, vec![true, false]);
}

#[test]
fn aux_output_is_off_when_alarm_disabled_or_calibrating() {
    let mut rig = Rig::unsmoothed();
    rig.epoch(50);
    assert!(rig.hw.aux_on());

    rig.cmd(AppCommand::SetAlarmEnabled(false)).unwrap();
    rig.epoch(50);
    assert!(!rig.hw.aux_on());

    rig.cmd(AppCommand::SetAlarmEnabled(true)).unwrap();
    rig.epoch(50);
    assert!(rig.hw.aux_on());
    rig.cmd(AppCommand::OpenEntry).unwrap();
    rig.idle_tick();
    assert!(!rig.hw.aux_on());
}

#[test]
fn timer_failure_is_fatal() {
    let mut rig = Rig::unsmoothed();
    rig.hw.fail_timer = true;
    rig.hw.push_epoch(42);
    let err = rig.svc.tick(&mut rig.hw, &mut rig.sink).unwrap_err();
    assert_eq!(err, Error::Timer(TimerError::ProgramFailed(-1)));
}

// ── Presets and threshold ─────────────────────────────────────

#[test]
fn presets_select_and_edit() {
    let mut rig = Rig::unsmoothed();
    rig.cmd(AppCommand::SelectPreset(3)).unwrap();
    assert_eq!(rig.svc.config().speed_target, 15.0);

    rig.cmd(AppCommand::SetPreset {
        index: 2,
        value: 12.5,
    })
    .unwrap();
    rig.cmd(AppCommand::SelectPreset(2)).unwrap();
    assert_eq!(rig.svc.config().speed_target, 12.5);
    assert_eq!(rig.store.saved.as_ref().unwrap().alarm_presets[1], 12.5);
}

#[test]
fn out_of_range_presets_and_targets_are_rejected() {
    let mut rig = Rig::unsmoothed();
    assert!(
        rig.cmd(AppCommand::SetPreset {
            index: 1,
            value: 31.0
        })
        .is_err()
    );
    assert!(rig.cmd(AppCommand::SelectPreset(5)).is_err());
    assert!(rig.cmd(AppCommand::SetThreshold(0.4)).is_err());
    assert_eq!(rig.svc.config().speed_target, 10.0);
    assert_eq!(rig.store.saves, 0);
}

#[test]
fn failed_save_is_retried() {
    let mut rig = Rig::unsmoothed();
    rig.store.fail_saves = true;
    assert!(rig.cmd(AppCommand::SetThreshold(8.0)).is_ok());
    assert!(rig.svc.is_settings_dirty());
    assert!(!rig.svc.save_if_dirty(&mut rig.store, &mut rig.sink));

    rig.store.fail_saves = false;
    assert!(rig.svc.save_if_dirty(&mut rig.store, &mut rig.sink));
    assert!(!rig.svc.is_settings_dirty());
    assert_eq!(rig.store.saved.as_ref().unwrap().speed_target, 8.0);
}

// ── Manual calibration entry ──────────────────────────────────

#[test]
fn manual_entry_accepts_value_above_minimum() {
    let mut rig = Rig::with(SystemConfig::default());
    rig.cmd(AppCommand::OpenEntry).unwrap();
    rig.cmd(AppCommand::EntryDecrement(4)).unwrap();
    let Mode::ManualEntry(entry) = rig.svc.mode() else {
        panic!("entry should be open");
    };
    assert_eq!(entry.display().as_str(), "07896");

    rig.cmd(AppCommand::EntrySave).unwrap();
    assert_eq!(rig.svc.mode(), Mode::Run);
    assert_eq!(rig.svc.calibration().pulses_per_run(), 7896);
    assert_eq!(rig.store.saved.as_ref().unwrap().calibration_constant, 7896);
    assert!(rig.sink.events.contains(&AppEvent::CalibrationChanged {
        from: 17_896,
        to: 7896
    }));
}

#[test]
fn manual_entry_rejects_value_at_or_below_minimum() {
    let mut rig = Rig::with(SystemConfig {
        calibration_constant: 7896,
        ..Default::default()
    });
    rig.cmd(AppCommand::OpenEntry).unwrap();
    for _ in 0..6 {
        rig.cmd(AppCommand::EntryDecrement(3)).unwrap();
    }
    let err = rig.cmd(AppCommand::EntrySave).unwrap_err();
    assert_eq!(
        err,
        Error::Calibration(CalibrationError::BelowMinimum {
            value: 1896,
            minimum: 2500
        })
    );
    assert_eq!(rig.svc.calibration().pulses_per_run(), 7896);
    let Mode::ManualEntry(entry) = rig.svc.mode() else {
        panic!("entry stays open after a rejection");
    };
    assert_eq!(entry.value(), 7896);

    rig.cmd(AppCommand::EntryCancel).unwrap();
    assert_eq!(rig.svc.mode(), Mode::Run);
    assert_eq!(rig.store.saves, 0);
}

#[test]
fn entry_commands_need_an_open_entry() {
    let mut rig = Rig::unsmoothed();
    assert_eq!(
        rig.cmd(AppCommand::EntrySave),
        Err(Error::Calibration(CalibrationError::EntryNotOpen))
    );
}

// ── Field calibration ─────────────────────────────────────────

#[test]
fn field_run_of_3000_pulses_is_saved() {
    let mut rig = Rig::with(SystemConfig::default());
    rig.cmd(AppCommand::FieldStart).unwrap();
    for _ in 0..3 {
        rig.epoch(1000);
    }
    let r = rig.svc.readout();
    assert_eq!(r.field_pulses, Some(3000));
    assert_eq!(r.text.as_str(), "3000");

    rig.cmd(AppCommand::FieldEnd).unwrap();
    assert_eq!(rig.svc.field_phase(), FieldPhase::Stopped { pulses: 3000 });
    rig.epoch(500);
    assert_eq!(rig.svc.field_phase(), FieldPhase::Stopped { pulses: 3000 });

    rig.cmd(AppCommand::FieldSave).unwrap();
    assert_eq!(rig.svc.calibration().pulses_per_run(), 3000);
    assert_eq!(rig.svc.mode(), Mode::Run);
    assert_eq!(rig.store.saved.as_ref().unwrap().calibration_constant, 3000);
}

#[test]
fn field_run_of_1000_pulses_is_rejected() {
    let mut rig = Rig::with(SystemConfig::default());
    rig.cmd(AppCommand::FieldStart).unwrap();
    rig.epoch(1000);

    let err = rig.cmd(AppCommand::FieldEnd).unwrap_err();
    assert_eq!(
        err,
        Error::Calibration(CalibrationError::BelowMinimum {
            value: 1000,
            minimum: 2500
        })
    );
    assert!(rig.sink.events.contains(&AppEvent::CalibrationRejected(
        CalibrationError::BelowMinimum {
            value: 1000,
            minimum: 2500
        }
    )));
    assert_eq!(
        rig.cmd(AppCommand::FieldSave),
        Err(Error::Calibration(CalibrationError::NoRunCaptured))
    );
    assert_eq!(rig.svc.calibration().pulses_per_run(), 17_896);
}

#[test]
fn field_run_pulses_do_not_move_the_speed_reading() {
    let mut rig = Rig::unsmoothed();
    rig.epoch(40);
    let before = rig.speed();
    rig.cmd(AppCommand::FieldStart).unwrap();
    rig.epoch(400);
    assert_eq!(rig.speed(), before);
    assert!((rig.svc.readout().distance - 40.0 / 12.0).abs() < 1e-4);
}

#[test]
fn field_cancel_keeps_calibration() {
    let mut rig = Rig::with(SystemConfig::default());
    rig.cmd(AppCommand::FieldStart).unwrap();
    rig.epoch(5000);
    rig.cmd(AppCommand::FieldCancel).unwrap();
    assert_eq!(rig.svc.mode(), Mode::Run);
    assert_eq!(rig.svc.field_phase(), FieldPhase::Idle);
    assert_eq!(rig.svc.calibration().pulses_per_run(), 17_896);
}

#[test]
fn field_end_without_a_run_is_an_error() {
    let mut rig = Rig::unsmoothed();
    assert_eq!(
        rig.cmd(AppCommand::FieldEnd),
        Err(Error::Calibration(CalibrationError::NoRunInProgress))
    );
}

#[test]
fn field_run_too_long_for_the_entry_is_rejected() {
    let mut rig = Rig::with(SystemConfig::default());
    rig.cmd(AppCommand::FieldStart).unwrap();
    rig.epoch(60_000);
    rig.epoch(60_000);

    assert_eq!(
        rig.cmd(AppCommand::FieldEnd),
        Err(Error::Calibration(CalibrationError::AboveMaximum {
            value: 120_000,
            maximum: 99_999
        }))
    );
    assert_eq!(rig.svc.field_phase(), FieldPhase::Idle);
    assert_eq!(rig.svc.calibration().pulses_per_run(), 17_896);

    // The entry screen opens on the active constant, so an unedited save
    // is a no-op.
    rig.cmd(AppCommand::FieldCancel).unwrap();
    rig.cmd(AppCommand::OpenEntry).unwrap();
    rig.cmd(AppCommand::EntrySave).unwrap();
    assert_eq!(rig.svc.calibration().pulses_per_run(), 17_896);
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::CalibrationChanged { .. })),
        0
    );
}

// ── GPS input ─────────────────────────────────────────────────

#[test]
fn gps_fix_scenario() {
    let mut rig = Rig::unsmoothed();
    rig.cmd(AppCommand::SetInputSource(InputSource::Gps)).unwrap();
    assert_eq!(rig.hw.selected.last(), Some(&InputSource::Gps));
    assert_eq!(rig.svc.readout().text.as_str(), "--.-");

    rig.hw.feed_gps(b"$GPRMC,,A,,,,,12.3,\r\n");
    rig.idle_tick();
    let r = rig.svc.readout();
    assert_eq!(r.fix_valid, Some(true));
    assert!((rig.speed() - 14.155).abs() < 0.01);
    assert_eq!(r.reading.source, InputSource::Gps);

    rig.hw.feed_gps(b"$GPRMC,,V,,,,,,\r\n");
    rig.idle_tick();
    let r = rig.svc.readout();
    assert_eq!(r.fix_valid, Some(false));
    assert_eq!(r.reading.value, None);
    assert_eq!(r.text.as_str(), "--.-");
}

#[test]
fn gps_drives_the_alarm() {
    let mut rig = Rig::unsmoothed();
    rig.cmd(AppCommand::SetInputSource(InputSource::Gps)).unwrap();
    // 10 knots ≈ 11.5 mph, above the 10 mph target.
    rig.hw.feed_gps(b"$GPRMC,,A,,,,,10.0,\r\n");
    rig.idle_tick();
    assert_eq!(rig.svc.alarm_mode(), AlarmMode::Steady);
}

#[test]
fn malformed_sentences_are_discarded() {
    let mut rig = Rig::unsmoothed();
    rig.cmd(AppCommand::SetInputSource(InputSource::Gps)).unwrap();
    rig.hw.feed_gps(b"$GPRMC,,A,,,,,fast,\r\n$GPRMC,,A\r\n");
    rig.idle_tick();
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::SentenceDiscarded(_))),
        2
    );
    assert_eq!(rig.svc.readout().reading.value, None);
}

#[test]
fn implausible_gps_speed_keeps_the_last_reading() {
    let mut rig = Rig::unsmoothed();
    rig.cmd(AppCommand::SetInputSource(InputSource::Gps)).unwrap();
    rig.hw.feed_gps(b"$GPRMC,,A,,,,,12.3,\r\n");
    rig.idle_tick();
    rig.hw.feed_gps(b"$GPRMC,,A,,,,,100000000000000000000000000000,\r\n");
    rig.idle_tick();

    assert!(rig.sink.events.contains(&AppEvent::SentenceDiscarded(SentenceError::BadSpeed)));
    let r = rig.svc.readout();
    assert!((rig.speed() - 14.155).abs() < 0.01);
    assert_eq!(r.text.as_str(), "14.2");
}

#[test]
fn gps_bytes_between_ticks_are_polled() {
    let mut rig = Rig::unsmoothed();
    rig.cmd(AppCommand::SetInputSource(InputSource::Gps)).unwrap();
    rig.hw.feed_gps(b"$GPRMC,,A,,,,,5.0,\r\n");
    rig.svc.poll_gps_input(&mut rig.hw, &mut rig.sink);
    assert_eq!(rig.svc.readout().fix_valid, Some(true));
}

#[test]
fn switching_to_gps_cancels_a_field_run() {
    let mut rig = Rig::unsmoothed();
    rig.cmd(AppCommand::FieldStart).unwrap();
    rig.epoch(100);
    rig.cmd(AppCommand::SetInputSource(InputSource::Gps)).unwrap();
    assert_eq!(rig.svc.mode(), Mode::Run);
    assert_eq!(rig.svc.field_phase(), FieldPhase::Idle);
    assert!(rig.sink.events.contains(&AppEvent::InputChanged(InputSource::Gps)));
    assert_eq!(rig.store.saved.as_ref().unwrap().input_source, InputSource::Gps);
}

#[test]
fn field_run_needs_pulse_input() {
    let mut rig = Rig::unsmoothed();
    rig.cmd(AppCommand::SetInputSource(InputSource::Gps)).unwrap();
    assert!(rig.cmd(AppCommand::FieldStart).is_err());
    assert_eq!(rig.svc.mode(), Mode::Run);
}

#[test]
fn switching_back_to_pulse_restarts_from_zero() {
    let mut rig = Rig::unsmoothed();
    rig.cmd(AppCommand::SetInputSource(InputSource::Gps)).unwrap();
    rig.hw.feed_gps(b"$GPRMC,,A,,,,,12.3,\r\n");
    rig.idle_tick();
    rig.cmd(AppCommand::SetInputSource(InputSource::Pulse)).unwrap();
    let r = rig.svc.readout();
    assert_eq!(r.reading.value, Some(0.0));
    assert_eq!(r.fix_valid, None);
}
