//! Runtime diagnostics.
//!
//! Interrupt-side conditions are never surfaced as errors; they are counted
//! here (or in [`PulseEpochs`](crate::sensors::pulse::PulseEpochs)) and read
//! back on demand.  All counters are relaxed atomics: they are monotonic
//! tallies with no ordering relationship to other state.

use core::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;

static SAMPLES: AtomicU32 = AtomicU32::new(0);
static SENTENCES_OK: AtomicU32 = AtomicU32::new(0);
static SENTENCES_DISCARDED: AtomicU32 = AtomicU32::new(0);
static CALIBRATIONS_REJECTED: AtomicU32 = AtomicU32::new(0);
static ALARM_REPROGRAMS: AtomicU32 = AtomicU32::new(0);
static SETTINGS_SAVE_FAILURES: AtomicU32 = AtomicU32::new(0);
static SETTINGS_FALLBACKS: AtomicU32 = AtomicU32::new(0);

pub fn record_sample() {
    SAMPLES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_sentence(ok: bool) {
    if ok {
        SENTENCES_OK.fetch_add(1, Ordering::Relaxed);
    } else {
        SENTENCES_DISCARDED.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn record_calibration_rejected() {
    CALIBRATIONS_REJECTED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_alarm_reprogram() {
    ALARM_REPROGRAMS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_settings_save_failure() {
    SETTINGS_SAVE_FAILURES.fetch_add(1, Ordering::Relaxed);
}

/// A stored setting was unreadable and its default was used instead.
pub fn record_settings_fallback() {
    SETTINGS_FALLBACKS.fetch_add(1, Ordering::Relaxed);
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeMetrics {
    pub samples: u32,
    pub sample_overruns: u32,
    pub epochs: u32,
    pub sentences_ok: u32,
    pub sentences_discarded: u32,
    pub calibrations_rejected: u32,
    pub alarm_reprograms: u32,
    pub settings_save_failures: u32,
    pub settings_fallbacks: u32,
    pub events_dropped: u32,
}

impl RuntimeMetrics {
    pub fn collect() -> Self {
        let pulses = &crate::sensors::pulse::PULSE_EPOCHS;
        Self {
            samples: SAMPLES.load(Ordering::Relaxed),
            sample_overruns: pulses.overruns(),
            epochs: pulses.epochs(),
            sentences_ok: SENTENCES_OK.load(Ordering::Relaxed),
            sentences_discarded: SENTENCES_DISCARDED.load(Ordering::Relaxed),
            calibrations_rejected: CALIBRATIONS_REJECTED.load(Ordering::Relaxed),
            alarm_reprograms: ALARM_REPROGRAMS.load(Ordering::Relaxed),
            settings_save_failures: SETTINGS_SAVE_FAILURES.load(Ordering::Relaxed),
            settings_fallbacks: SETTINGS_FALLBACKS.load(Ordering::Relaxed),
            events_dropped: crate::events::dropped_events(),
        }
    }

    /// Single-line JSON for the periodic diagnostics log.
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}
