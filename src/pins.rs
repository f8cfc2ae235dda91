//! GPIO / peripheral assignments for the Speedwatch display board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  The speed input is shared: the pulse ISR and
//! the GPS UART RX use the same connector pin, and only one is active at a
//! time (see `drivers::hw_init::select_input`).

// ---------------------------------------------------------------------------
// Speed input connector
// ---------------------------------------------------------------------------

/// Wheel / radar pulse input, rising-edge interrupt.  Doubles as GPS RX.
pub const SPEED_INPUT_GPIO: i32 = 25;

// ---------------------------------------------------------------------------
// GPS receiver (UART2, 19200 8N1)
// ---------------------------------------------------------------------------

pub const GPS_UART_PORT: i32 = 2;
pub const GPS_RX_GPIO: i32 = SPEED_INPUT_GPIO;
pub const GPS_TX_GPIO: i32 = 22;
pub const GPS_BAUD: i32 = 19_200;
/// UART driver RX ring size (bytes).
pub const GPS_RX_BUF_LEN: i32 = 256;

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Front-panel alarm light.  HIGH = lit.
pub const ALARM_LIGHT_GPIO: i32 = 26;
/// On-board status LED, toggled once per sample tick.
pub const STATUS_LIGHT_GPIO: i32 = 2;
/// Auxiliary output for an external 12 V panel lamp.  HIGH = over target.
pub const AUX_OUTPUT_GPIO: i32 = 27;

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

/// General-purpose timer resolution: 1 MHz → 1 tick = 1 µs.
pub const TIMER_RESOLUTION_HZ: u32 = 1_000_000;
/// Speed sample epoch (µs).
pub const SAMPLE_PERIOD_US: u64 = 250_000;
