//! Speed input sources.
//!
//! Exactly one source feeds the estimator at a time, selected by
//! [`InputSource`](crate::config::InputSource):
//!
//! - [`pulse`]: wheel / radar pulse train counted in interrupt context and
//!   handed to the foreground once per 250 ms epoch.
//! - [`gps`]: line-terminated position/velocity sentences from a UART.

pub mod gps;
pub mod pulse;
