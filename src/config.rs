//! System configuration parameters
//!
//! User settings (persisted as individual NVS keys) plus the firmware
//! tunables that govern calibration limits, alarm flash timing and display
//! formatting.  Tunables are not persisted; they come from `Default`.

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::speed::calibration::MAX_CALIBRATION;

/// Lowest and highest accepted alarm threshold / preset.
pub const TARGET_RANGE: core::ops::RangeInclusive<f32> = 0.5..=30.0;

/// Distance below threshold at which flashing begins.
pub const FLASH_WINDOW: f32 = 1.0;

/// Float slack when comparing a gap against a row boundary.
pub const GAP_TOLERANCE: f32 = 1e-4;

/// Number of alarm presets.
pub const PRESET_COUNT: usize = 4;

/// Maximum rows in a [`FlashTable`].
pub const MAX_FLASH_STEPS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedUnit {
    Mph,
    Kph,
}

impl SpeedUnit {
    pub fn label(self) -> &'static str {
        match self {
            Self::Mph => "mph",
            Self::Kph => "kph",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputSource {
    /// Wheel or radar pulse train.
    Pulse,
    /// GPS speed-over-ground sentences.
    Gps,
}

/// One row of the flash table: gaps up to `max_gap` flash at `period_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlashStep {
    pub max_gap: f32,
    pub period_ms: u32,
}

/// Distance-below-threshold → flash half-period, ascending by gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashTable {
    steps: Vec<FlashStep, MAX_FLASH_STEPS>,
}

impl FlashTable {
    /// Build a table from rows.  Rows beyond [`MAX_FLASH_STEPS`] are an error.
    pub fn from_steps(rows: &[FlashStep]) -> Result<Self, ConfigError> {
        let steps = Vec::from_slice(rows)
            .map_err(|()| ConfigError::ValidationFailed("flash_table has too many rows"))?;
        let table = Self { steps };
        table.validate()?;
        Ok(table)
    }

    pub fn steps(&self) -> &[FlashStep] {
        &self.steps
    }

    /// Period for `gap` (threshold − velocity), or `None` past the last row.
    pub fn period_for(&self, gap: f32) -> Option<u32> {
        self.steps
            .iter()
            .find(|s| gap <= s.max_gap + GAP_TOLERANCE)
            .map(|s| s.period_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let Some(last) = self.steps.last() else {
            return Err(ConfigError::ValidationFailed("flash_table is empty"));
        };
        if last.max_gap < FLASH_WINDOW {
            return Err(ConfigError::ValidationFailed(
                "flash_table must cover the 1.0 flash window",
            ));
        }
        if self.steps.iter().any(|s| s.period_ms == 0 || s.max_gap <= 0.0) {
            return Err(ConfigError::ValidationFailed(
                "flash_table gaps and periods must be positive",
            ));
        }
        let ascending = self
            .steps
            .windows(2)
            .all(|w| w[0].max_gap < w[1].max_gap && w[0].period_ms < w[1].period_ms);
        if !ascending {
            return Err(ConfigError::ValidationFailed(
                "flash_table gaps and periods must both strictly increase",
            ));
        }
        Ok(())
    }
}

impl Default for FlashTable {
    fn default() -> Self {
        let mut steps = Vec::new();
        for (max_gap, period_ms) in [(0.2, 75), (0.4, 150), (0.6, 300), (0.8, 500), (1.0, 700)] {
            let _ = steps.push(FlashStep { max_gap, period_ms });
        }
        Self { steps }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Persisted user settings ---
    pub unit: SpeedUnit,
    /// Pulses per 300 ft reference run.
    pub calibration_constant: u32,
    /// Alarm threshold, in the display unit.
    pub speed_target: f32,
    pub alarm_enabled: bool,
    /// Weighted smoothing of pulse-derived speed.
    pub speed_averaging: bool,
    pub alarm_presets: [f32; PRESET_COUNT],
    pub input_source: InputSource,

    // --- Tunables ---
    /// Calibration values at or below this are rejected.
    pub min_calibration: u32,
    pub flash_table: FlashTable,
    /// Speeds above this are displayed without a decimal.
    pub display_decimal_limit: f32,
    /// GPS speeds below this are reported as 0.
    pub gps_min_speed_mph: f32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            unit: SpeedUnit::Mph,
            calibration_constant: 17_896,
            speed_target: 10.0,
            alarm_enabled: true,
            speed_averaging: true,
            alarm_presets: [5.0, 10.0, 15.0, 20.0],
            input_source: InputSource::Pulse,

            min_calibration: 2500,
            flash_table: FlashTable::default(),
            display_decimal_limit: 50.0,
            gps_min_speed_mph: 0.5,
        }
    }
}

/// Range-check every field.
pub fn validate(cfg: &SystemConfig) -> Result<(), ConfigError> {
    if cfg.min_calibration == 0 {
        return Err(ConfigError::ValidationFailed("min_calibration must be > 0"));
    }
    if cfg.calibration_constant <= cfg.min_calibration {
        return Err(ConfigError::ValidationFailed(
            "calibration_constant must be above min_calibration",
        ));
    }
    if cfg.calibration_constant > MAX_CALIBRATION {
        return Err(ConfigError::ValidationFailed(
            "calibration_constant must fit five digits",
        ));
    }
    if !TARGET_RANGE.contains(&cfg.speed_target) {
        return Err(ConfigError::ValidationFailed("speed_target must be 0.5–30.0"));
    }
    if !cfg.alarm_presets.iter().all(|p| TARGET_RANGE.contains(p)) {
        return Err(ConfigError::ValidationFailed("alarm presets must be 0.5–30.0"));
    }
    if !(1.0..=1000.0).contains(&cfg.display_decimal_limit) {
        return Err(ConfigError::ValidationFailed(
            "display_decimal_limit must be 1.0–1000.0",
        ));
    }
    if !(0.0..=5.0).contains(&cfg.gps_min_speed_mph) {
        return Err(ConfigError::ValidationFailed("gps_min_speed_mph must be 0.0–5.0"));
    }
    cfg.flash_table.validate()
}
