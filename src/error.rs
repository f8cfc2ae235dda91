//! Unified error types for the Speedwatch firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! foreground loop's error handling uniform.  All variants are `Copy` so
//! they can be returned from the per-tick pipeline without allocation.
//!
//! Only [`TimerError`] is fatal.  Calibration and sentence errors are
//! recovered locally (old value kept, buffer discarded) and surfaced to
//! the UI or counted in [`diagnostics`](crate::diagnostics).

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A calibration value or calibration procedure was rejected.
    Calibration(CalibrationError),
    /// A GPS sentence was truncated or malformed.
    Sentence(SentenceError),
    /// A hardware timer could not be created or reprogrammed.
    Timer(TimerError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Calibration(e) => write!(f, "calibration: {e}"),
            Self::Sentence(e) => write!(f, "gps sentence: {e}"),
            Self::Timer(e) => write!(f, "timer: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Calibration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    /// Pulses-per-run is at or below the minimum viable value.
    BelowMinimum { value: u32, minimum: u32 },
    /// Pulses-per-run does not fit the five-digit entry.
    AboveMaximum { value: u32, maximum: u32 },
    /// `End` was requested but no field run is in progress.
    NoRunInProgress,
    /// `Save` was requested but no accepted run is waiting.
    NoRunCaptured,
    /// A digit edit or save arrived while manual entry is closed.
    EntryNotOpen,
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowMinimum { value, minimum } => {
                write!(f, "calibration number {value} must be greater than {minimum}")
            }
            Self::AboveMaximum { value, maximum } => {
                write!(f, "calibration number {value} must not exceed {maximum}")
            }
            Self::NoRunInProgress => write!(f, "no field run in progress"),
            Self::NoRunCaptured => write!(f, "no field run captured"),
            Self::EntryNotOpen => write!(f, "manual entry not open"),
        }
    }
}

impl From<CalibrationError> for Error {
    fn from(e: CalibrationError) -> Self {
        Self::Calibration(e)
    }
}

// ---------------------------------------------------------------------------
// GPS sentence errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentenceError {
    /// Line exceeded the assembly buffer before a terminator arrived.
    Overrun,
    /// The sentence ended before the given field index.
    MissingField(usize),
    /// The speed-over-ground field is not a number, or not a plausible one.
    BadSpeed,
    /// A `*hh` checksum suffix did not match the payload.
    BadChecksum,
    /// The line contains non-UTF-8 bytes.
    NotUtf8,
}

impl fmt::Display for SentenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overrun => write!(f, "line buffer overrun"),
            Self::MissingField(idx) => write!(f, "missing field {idx}"),
            Self::BadSpeed => write!(f, "speed field not numeric or out of range"),
            Self::BadChecksum => write!(f, "checksum mismatch"),
            Self::NotUtf8 => write!(f, "non-UTF-8 bytes"),
        }
    }
}

impl From<SentenceError> for Error {
    fn from(e: SentenceError) -> Self {
        Self::Sentence(e)
    }
}

// ---------------------------------------------------------------------------
// Timer errors
// ---------------------------------------------------------------------------

/// Hardware timer faults.  Treated as fatal: they indicate a device-level
/// problem that the firmware cannot recover from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// Timer allocation or callback registration failed (ESP-IDF rc).
    CreateFailed(i32),
    /// Stopping, re-arming or restarting the timer failed (ESP-IDF rc).
    ProgramFailed(i32),
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateFailed(rc) => write!(f, "create failed (rc={rc})"),
            Self::ProgramFailed(rc) => write!(f, "reprogram failed (rc={rc})"),
        }
    }
}

impl From<TimerError> for Error {
    fn from(e: TimerError) -> Self {
        Self::Timer(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_minimum_message_names_both_values() {
        let e: Error = CalibrationError::BelowMinimum {
            value: 1000,
            minimum: 2500,
        }
        .into();
        let msg = e.to_string();
        assert!(msg.contains("1000"));
        assert!(msg.contains("2500"));
    }

    #[test]
    fn timer_error_converts() {
        let e: Error = TimerError::ProgramFailed(-1).into();
        assert_eq!(e, Error::Timer(TimerError::ProgramFailed(-1)));
    }
}
