//! Speed measurement: calibration, estimation and distance.

pub mod calibration;
pub mod estimator;
pub mod field_cal;
pub mod odometer;

pub use calibration::{Calibration, CalibrationEntry};
pub use estimator::{SpeedEstimator, VelocityReading};
pub use field_cal::{FieldCalibrationSession, FieldPhase};
pub use odometer::Odometer;
