//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production).  Readings arrive
//! four times a second, so they go out at `debug`; everything else is
//! `info` or `warn`.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started {
                source,
                unit,
                calibration,
            } => {
                info!(
                    "START | src={:?} unit={} cal={}",
                    source,
                    unit.label(),
                    calibration
                );
            }
            AppEvent::Reading(r) => match r.value {
                Some(v) => debug!(
                    "READ  | {:.1} {} src={:?} epoch={}",
                    v,
                    r.unit.label(),
                    r.source,
                    r.epoch
                ),
                None => debug!("READ  | no fix src={:?} epoch={}", r.source, r.epoch),
            },
            AppEvent::AlarmChanged { from, to } => {
                info!("ALARM | {} -> {}", from, to);
            }
            AppEvent::CalibrationChanged { from, to } => {
                info!("CAL   | {} -> {}", from, to);
            }
            AppEvent::CalibrationRejected(e) => {
                warn!("CAL   | rejected: {}", e);
            }
            AppEvent::FieldPhaseChanged { from, to } => {
                info!("FIELD | {:?} -> {:?}", from, to);
            }
            AppEvent::InputChanged(source) => {
                info!("INPUT | {:?}", source);
            }
            AppEvent::SentenceDiscarded(e) => {
                debug!("GPS   | discarded: {}", e);
            }
            AppEvent::SettingsSaved => {
                info!("NVS   | settings committed");
            }
        }
    }
}
