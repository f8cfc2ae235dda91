//! Peripheral drivers: output lights, timers, input routing and the
//! task watchdog.

pub mod alarm_light;
pub mod hw_init;
pub mod hw_timer;
pub mod status_light;
pub mod watchdog;
