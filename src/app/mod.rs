//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the rules of the speed monitor: routing epoch
//! samples to live speed or to a field calibration run, alarm evaluation,
//! calibration commands and settings persistence.  All interaction with
//! hardware happens through **port traits** defined in [`ports`], keeping
//! this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
