//! Settings persistence through the NVS adapter (simulation backend).
//!
//! Drives the service with the real [`NvsAdapter`] and checks that what a
//! restart reads back matches what the operator last committed.

use crate::mock_hw::{MockHardware, RecordingSink};

use speedwatch::adapters::nvs::NvsAdapter;
use speedwatch::app::commands::AppCommand;
use speedwatch::app::events::AppEvent;
use speedwatch::app::ports::{ConfigPort, StoragePort};
use speedwatch::app::service::MonitorService;
use speedwatch::config::{InputSource, SpeedUnit, SystemConfig};

fn boot(store: &NvsAdapter) -> (MonitorService, MockHardware, RecordingSink) {
    let config = store.load().unwrap();
    let mut svc = MonitorService::new(config).unwrap();
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();
    svc.start(&mut hw, &mut sink).unwrap();
    (svc, hw, sink)
}

#[test]
fn first_boot_uses_defaults() {
    let store = NvsAdapter::new().unwrap();
    let (svc, hw, _) = boot(&store);
    assert_eq!(svc.config(), &SystemConfig::default());
    assert_eq!(hw.selected, vec![InputSource::Pulse]);
}

#[test]
fn committed_settings_survive_a_restart() {
    let mut store = NvsAdapter::new().unwrap();
    {
        let (mut svc, mut hw, mut sink) = boot(&store);
        for cmd in [
            AppCommand::SetUnit(SpeedUnit::Kph),
            AppCommand::SetAveraging(false),
            AppCommand::SetAlarmEnabled(false),
            AppCommand::SetPreset {
                index: 4,
                value: 22.5,
            },
            AppCommand::SelectPreset(4),
            AppCommand::SetInputSource(InputSource::Gps),
        ] {
            assert!(svc.handle_command(cmd, &mut hw, &mut store, &mut sink).is_ok());
        }
        assert_eq!(sink.count(|e| *e == AppEvent::SettingsSaved), 6);
    }

    let (svc, hw, _) = boot(&store);
    let cfg = svc.config();
    assert_eq!(cfg.unit, SpeedUnit::Kph);
    assert!(!cfg.speed_averaging);
    assert!(!cfg.alarm_enabled);
    assert_eq!(cfg.alarm_presets, [5.0, 10.0, 15.0, 22.5]);
    assert_eq!(cfg.speed_target, 22.5);
    assert_eq!(cfg.input_source, InputSource::Gps);
    assert_eq!(hw.selected, vec![InputSource::Gps]);
}

#[test]
fn field_calibration_survives_a_restart() {
    let mut store = NvsAdapter::new().unwrap();
    {
        let (mut svc, mut hw, mut sink) = boot(&store);
        svc.handle_command(AppCommand::FieldStart, &mut hw, &mut store, &mut sink);
        hw.push_epoch(2600);
        hw.push_epoch(1400);
        svc.tick(&mut hw, &mut sink).unwrap();
        svc.tick(&mut hw, &mut sink).unwrap();
        assert!(svc.handle_command(AppCommand::FieldEnd, &mut hw, &mut store, &mut sink).is_ok());
        let reply = svc.handle_command(AppCommand::FieldSave, &mut hw, &mut store, &mut sink);
        assert_eq!(reply.calibration, 4000);
    }

    let (svc, _, _) = boot(&store);
    assert_eq!(svc.calibration().pulses_per_run(), 4000);
}

#[test]
fn rejected_entry_leaves_storage_untouched() {
    let mut store = NvsAdapter::new().unwrap();
    let (mut svc, mut hw, mut sink) = boot(&store);
    svc.handle_command(AppCommand::OpenEntry, &mut hw, &mut store, &mut sink);
    // 17896 → 07896 → 00896
    svc.handle_command(AppCommand::EntryDecrement(4), &mut hw, &mut store, &mut sink);
    for _ in 0..7 {
        svc.handle_command(AppCommand::EntryDecrement(3), &mut hw, &mut store, &mut sink);
    }
    let reply = svc.handle_command(AppCommand::EntrySave, &mut hw, &mut store, &mut sink);
    assert!(!reply.is_ok());
    assert_eq!(reply.calibration, 17_896);
    assert!(!store.exists("speedwatch", "cal"));
}

#[test]
fn a_corrupted_setting_falls_back_alone() {
    let mut store = NvsAdapter::new().unwrap();
    store
        .save(&SystemConfig {
            calibration_constant: 6000,
            speed_target: 12.0,
            unit: SpeedUnit::Kph,
            alarm_presets: [2.0, 4.0, 6.0, 8.0],
            ..Default::default()
        })
        .unwrap();
    // An f32 needs four bytes; one byte cannot decode.
    store.write("speedwatch", "target", &[0x07]).unwrap();

    let (mut svc, mut hw, mut sink) = boot(&store);
    assert_eq!(svc.calibration().pulses_per_run(), 6000);
    assert_eq!(svc.config().unit, SpeedUnit::Kph);
    assert_eq!(svc.config().alarm_presets, [2.0, 4.0, 6.0, 8.0]);
    assert_eq!(svc.config().speed_target, SystemConfig::default().speed_target);

    // The next commit rewrites the damaged key and keeps the measured
    // calibration.
    assert!(
        svc.handle_command(AppCommand::SelectPreset(3), &mut hw, &mut store, &mut sink)
            .is_ok()
    );
    let reloaded = store.load().unwrap();
    assert_eq!(reloaded.calibration_constant, 6000);
    assert_eq!(reloaded.speed_target, 6.0);
}

#[test]
fn an_out_of_range_calibration_falls_back_alone() {
    let mut store = NvsAdapter::new().unwrap();
    store
        .save(&SystemConfig {
            speed_target: 12.0,
            ..Default::default()
        })
        .unwrap();
    // Varint 1000: below the 2500 minimum.
    store.write("speedwatch", "cal", &[0xE8, 0x07]).unwrap();

    let (svc, _, _) = boot(&store);
    assert_eq!(svc.calibration().pulses_per_run(), 17_896);
    assert_eq!(svc.config().speed_target, 12.0);
}
