//! Speed pulse counter and 250 ms sample clock hand-off.
//!
//! Two interrupt contexts share this state:
//!
//! | Field      | Written by                         | Read by                     |
//! |------------|------------------------------------|-----------------------------|
//! | `live`     | edge ISR (`fetch_add`)             | sample ISR (`swap(0)`)      |
//! | `handoff`  | sample ISR (inside critical sect.) | foreground (`take_sample`)  |
//! | `epoch`    | sample ISR                         | diagnostics                 |
//! | `overruns` | sample ISR                         | diagnostics                 |
//!
//! The foreground never touches `live`.  It only ever sees a
//! [`PulseEpochSample`] that was copied out by the sample ISR, and each
//! sample is taken exactly once.  If the foreground misses a tick, the
//! next sample absorbs the unconsumed one (`epochs` > 1) so no pulse is
//! lost or counted twice.

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::CriticalSectionMutex;

/// Length of one sample epoch in milliseconds.
pub const EPOCH_MS: u32 = 250;

/// Pulse count for one (or more, after an overrun) completed epochs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseEpochSample {
    /// Rising edges counted in the window.
    pub pulse_count: u32,
    /// Index of the newest epoch in the window (wraps).
    pub epoch: u32,
    /// Number of epochs the window spans.  1 unless the foreground fell behind.
    pub epochs: u32,
}

impl PulseEpochSample {
    /// A single-epoch sample (the normal case).
    pub const fn single(pulse_count: u32, epoch: u32) -> Self {
        Self {
            pulse_count,
            epoch,
            epochs: 1,
        }
    }

    /// Window length in milliseconds.
    pub fn duration_ms(&self) -> u32 {
        self.epochs.max(1) * EPOCH_MS
    }
}

/// Interrupt-shared pulse state.  See the module table for access rules.
pub struct PulseEpochs {
    live: AtomicU32,
    handoff: CriticalSectionMutex<Cell<Option<PulseEpochSample>>>,
    epoch: AtomicU32,
    overruns: AtomicU32,
}

impl PulseEpochs {
    pub const fn new() -> Self {
        Self {
            live: AtomicU32::new(0),
            handoff: CriticalSectionMutex::new(Cell::new(None)),
            epoch: AtomicU32::new(0),
            overruns: AtomicU32::new(0),
        }
    }

    /// Edge ISR body.  Returns `true` on the first edge of an epoch so the
    /// caller can zero the sample timer and align the window to the pulse.
    pub fn on_edge(&self) -> bool {
        self.live.fetch_add(1, Ordering::AcqRel) == 0
    }

    /// Sample-clock ISR body: copy the live count out, reset it, and publish
    /// the sample for the foreground.
    pub fn on_sample_tick(&self) -> PulseEpochSample {
        let epoch = self.epoch.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let count = self.live.swap(0, Ordering::AcqRel);

        self.handoff.lock(|slot| {
            let sample = match slot.take() {
                // Foreground missed the previous tick: fold it in.
                Some(prev) => {
                    self.overruns.fetch_add(1, Ordering::Relaxed);
                    PulseEpochSample {
                        pulse_count: prev.pulse_count.saturating_add(count),
                        epoch,
                        epochs: prev.epochs.saturating_add(1),
                    }
                }
                None => PulseEpochSample::single(count, epoch),
            };
            slot.set(Some(sample));
            sample
        })
    }

    /// Foreground: take the pending sample, if any.  Each sample is
    /// returned exactly once.
    pub fn take_sample(&self) -> Option<PulseEpochSample> {
        self.handoff.lock(Cell::take)
    }

    /// Completed epochs since boot (wraps).
    pub fn epochs(&self) -> u32 {
        self.epoch.load(Ordering::Relaxed)
    }

    /// Samples the foreground failed to consume before the next tick.
    pub fn overruns(&self) -> u32 {
        self.overruns.load(Ordering::Relaxed)
    }
}

impl Default for PulseEpochs {
    fn default() -> Self {
        Self::new()
    }
}

/// Global instance.  `static` because ESP-IDF ISR callbacks cannot capture.
pub static PULSE_EPOCHS: PulseEpochs = PulseEpochs::new();

/// Called from the GPIO ISR on each rising edge of the speed input.
/// Returns `true` when the sample clock should be re-aligned.
pub fn pulse_isr_handler() -> bool {
    PULSE_EPOCHS.on_edge()
}

/// Called from the 250 ms sample timer ISR.
pub fn sample_tick_isr_handler() {
    let _ = PULSE_EPOCHS.on_sample_tick();
}

/// Host-only: inject `n` edges as if they arrived on the pulse input.
#[cfg(not(target_os = "espidf"))]
pub fn sim_pulses(n: u32) {
    for _ in 0..n {
        let _ = PULSE_EPOCHS.on_edge();
    }
}
