//! Velocity estimation from pulse epochs or GPS fixes.
//!
//! Pulse path, per 250 ms epoch:
//!
//! ```text
//! raw    = pulses / (speed_constant / 4) / epochs
//! smooth = (raw + 3 × old) / 4        if 0.5·old ≤ raw ≤ 1.5·old and averaging is on
//!        = raw                        otherwise
//! value  = smooth × 1.609344          if unit is kph
//! ```
//!
//! `old` is kept in mph so changing the display unit never disturbs the
//! filter.  GPS speeds are used as-is (no smoothing).

use core::fmt::Write;

use crate::config::{InputSource, SpeedUnit};
use crate::sensors::gps::GpsFix;
use crate::sensors::pulse::PulseEpochSample;

/// Statute mile → kilometre.
pub const KPH_PER_MPH: f32 = 1.609_344;

/// Epochs per second at the 250 ms sample rate.
const EPOCHS_PER_SEC: f32 = 4.0;

/// `pulses / (speed_constant / 4)`.  Zero pulses (or a degenerate
/// constant) give 0, never NaN or a negative value.
pub fn estimate(pulse_count: u32, speed_constant: f32) -> f32 {
    if pulse_count == 0 || speed_constant.is_nan() || speed_constant <= 0.0 {
        return 0.0;
    }
    pulse_count as f32 / (speed_constant / EPOCHS_PER_SEC)
}

/// Weighted average biased toward the previous value, applied only when
/// `new` is within [0.5×, 1.5×] of `old`.  Larger jumps pass through.
pub fn smooth(new: f32, old: f32) -> f32 {
    if new >= 0.5 * old && new <= 1.5 * old {
        (new + 3.0 * old) / 4.0
    } else {
        new
    }
}

pub fn mph_to_kph(mph: f32) -> f32 {
    mph * KPH_PER_MPH
}

pub fn kph_to_mph(kph: f32) -> f32 {
    kph / KPH_PER_MPH
}

pub fn to_unit(mph: f32, unit: SpeedUnit) -> f32 {
    match unit {
        SpeedUnit::Mph => mph,
        SpeedUnit::Kph => mph_to_kph(mph),
    }
}

/// Largest value the readout shows; anything faster is pinned here.
pub const DISPLAY_MAX: f32 = 9999.0;

/// Display string: one decimal up to `decimal_limit`, none above it.
/// Saturates at [`DISPLAY_MAX`], so the text always fits.
pub fn format_speed(value: f32, decimal_limit: f32) -> heapless::String<12> {
    let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, DISPLAY_MAX) };
    let mut s = heapless::String::new();
    let written = if value <= decimal_limit {
        write!(s, "{value:4.1}")
    } else {
        write!(s, "{value:4.0}")
    };
    if written.is_err() {
        s.clear();
    }
    s
}

/// The current reading.  Overwritten every epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityReading {
    /// `None` while the GPS is searching: show "no reading", not zero.
    pub value: Option<f32>,
    pub unit: SpeedUnit,
    pub epoch: u32,
    pub source: InputSource,
}

impl VelocityReading {
    pub const fn zero(unit: SpeedUnit, source: InputSource) -> Self {
        Self {
            value: Some(0.0),
            unit,
            epoch: 0,
            source,
        }
    }

    /// Velocity for alarm evaluation; a missing reading counts as stopped.
    pub fn value_or_zero(&self) -> f32 {
        self.value.unwrap_or(0.0)
    }
}

pub struct SpeedEstimator {
    unit: SpeedUnit,
    averaging: bool,
    old_velocity_mph: f32,
    current: VelocityReading,
}

impl SpeedEstimator {
    pub fn new(unit: SpeedUnit, averaging: bool, source: InputSource) -> Self {
        let mut est = Self {
            unit,
            averaging,
            old_velocity_mph: 0.0,
            current: VelocityReading::zero(unit, source),
        };
        est.reset(source);
        est
    }

    pub fn current(&self) -> VelocityReading {
        self.current
    }

    /// Last value fed to the smoothing filter (mph).
    pub fn old_velocity_mph(&self) -> f32 {
        self.old_velocity_mph
    }

    pub fn unit(&self) -> SpeedUnit {
        self.unit
    }

    pub fn set_unit(&mut self, unit: SpeedUnit) {
        self.unit = unit;
        self.current.unit = unit;
        if self.current.value.is_some() {
            self.current.value = Some(to_unit(self.old_velocity_mph, unit));
        }
    }

    pub fn set_averaging(&mut self, on: bool) {
        self.averaging = on;
    }

    /// Forget filter state (input source switched).  A GPS source starts
    /// with no reading until its first valid fix.
    pub fn reset(&mut self, source: InputSource) {
        self.old_velocity_mph = 0.0;
        self.current = VelocityReading {
            value: match source {
                InputSource::Pulse => Some(0.0),
                InputSource::Gps => None,
            },
            epoch: self.current.epoch,
            ..VelocityReading::zero(self.unit, source)
        };
    }

    /// Consume one pulse sample.
    pub fn on_pulse_sample(
        &mut self,
        sample: PulseEpochSample,
        speed_constant: f32,
    ) -> VelocityReading {
        let raw = estimate(sample.pulse_count, speed_constant) / sample.epochs.max(1) as f32;
        let mph = if self.averaging {
            smooth(raw, self.old_velocity_mph)
        } else {
            raw
        };
        self.publish(Some(mph), sample.epoch, InputSource::Pulse)
    }

    /// Consume one GPS fix.  A searching receiver yields no value.
    pub fn on_gps_fix(&mut self, fix: GpsFix, epoch: u32) -> VelocityReading {
        let mph = fix.fix_valid.then_some(fix.speed_mph);
        self.publish(mph, epoch, InputSource::Gps)
    }

    fn publish(&mut self, mph: Option<f32>, epoch: u32, source: InputSource) -> VelocityReading {
        if let Some(v) = mph {
            self.old_velocity_mph = v;
        }
        self.current = VelocityReading {
            value: mph.map(|v| to_unit(v, self.unit)),
            unit: self.unit,
            epoch,
            source,
        };
        self.current
    }
}
