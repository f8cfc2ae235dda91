//! One-shot hardware peripheral initialization and speed-input routing.
//!
//! Configures the light outputs and the GPIO ISR service using raw ESP-IDF
//! sys calls.  Called once from `main()` before the event loop starts.
//!
//! The speed input connector is shared: [`select_input`] either attaches
//! the rising-edge pulse ISR to it or hands the pin to the GPS UART.
//! Exactly one of the two owns the pin at any time.  The UART driver is
//! installed and deleted under a lock that the RX poll in the esp_timer
//! task only ever try-locks, so the poll never queries a deleted driver.
//!
//! On host targets GPIO levels live in an in-memory table so the light
//! drivers and the simulated flash timer behave like the real thing.

use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, TryLockError};

use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
use log::info;

use crate::config::InputSource;
#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during peripheral initialization or input switching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
    UartInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
            Self::UartInstallFailed(rc) => write!(f, "GPS UART install failed (rc={})", rc),
        }
    }
}

impl From<HwInitError> for crate::error::Error {
    fn from(e: HwInitError) -> Self {
        match e {
            HwInitError::GpioConfigFailed(_) => Self::Init("GPIO config failed"),
            HwInitError::IsrInstallFailed(_) => Self::Init("GPIO ISR service install failed"),
            HwInitError::UartInstallFailed(_) => Self::Init("GPS UART install failed"),
        }
    }
}

/// `true` while the GPS UART owns the speed input pin.
static GPS_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Held by host unit tests that touch `GPS_ACTIVE`.
#[cfg(all(test, not(target_os = "espidf")))]
pub(crate) static ROUTING_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Held across GPS UART driver install and delete.
static GPS_UART: Mutex<()> = Mutex::new(());

pub fn gps_active() -> bool {
    GPS_ACTIVE.load(Ordering::Acquire)
}

/// Run `query` against the installed GPS UART.  Returns `None` without
/// blocking while the driver is absent or being torn down.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
fn with_gps_uart<R>(query: impl FnOnce() -> R) -> Option<R> {
    let _guard = match GPS_UART.try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::Poisoned(e)) => e.into_inner(),
        Err(TryLockError::WouldBlock) => return None,
    };
    gps_active().then(query)
}

/// Clear `GPS_ACTIVE`, then run `delete` once no query is in flight.
fn release_gps_uart(delete: impl FnOnce()) {
    let _guard = GPS_UART.lock().unwrap_or_else(|e| e.into_inner());
    if GPS_ACTIVE.swap(false, Ordering::AcqRel) {
        delete();
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before event loop; single-threaded.
    unsafe {
        init_gpio_outputs()?;
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }
    }
    info!("hw_init: outputs and ISR service configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    // The alarm light is read back by the flash ISR, so it needs the
    // input path enabled as well.
    let outputs = [
        (pins::ALARM_LIGHT_GPIO, gpio_mode_t_GPIO_MODE_INPUT_OUTPUT),
        (pins::STATUS_LIGHT_GPIO, gpio_mode_t_GPIO_MODE_INPUT_OUTPUT),
        (pins::AUX_OUTPUT_GPIO, gpio_mode_t_GPIO_MODE_OUTPUT),
    ];

    for (pin, mode) in outputs {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        unsafe { gpio_set_level(pin, 0) };
    }

    info!("hw_init: GPIO outputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin.
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: read-only register access on a configured pin; ISR-safe.
    (unsafe { gpio_get_level(pin) }) != 0
}

/// ISR-safe read-modify-write of an output pin.
#[cfg(target_os = "espidf")]
pub fn gpio_toggle(pin: i32) {
    let level = gpio_read(pin);
    gpio_write(pin, !level);
}

#[cfg(not(target_os = "espidf"))]
static SIM_LEVELS: [AtomicBool; 40] = [const { AtomicBool::new(false) }; 40];

#[cfg(not(target_os = "espidf"))]
fn sim_level(pin: i32) -> Option<&'static AtomicBool> {
    usize::try_from(pin).ok().and_then(|i| SIM_LEVELS.get(i))
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) {
    if let Some(level) = sim_level(pin) {
        level.store(high, Ordering::Relaxed);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(pin: i32) -> bool {
    sim_level(pin).is_some_and(|level| level.load(Ordering::Relaxed))
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_toggle(pin: i32) {
    if let Some(level) = sim_level(pin) {
        level.fetch_xor(true, Ordering::Relaxed);
    }
}

/// Configured output pin exposed through the `embedded-hal` traits.
///
/// The level is read back from the pad rather than cached, because the
/// flash timer ISR toggles the alarm pin behind the driver's back.
#[derive(Debug)]
pub struct GpioOutput {
    pin: i32,
}

impl GpioOutput {
    /// The pin must already be configured as an output by
    /// [`init_peripherals`].
    pub fn new(pin: i32) -> Self {
        Self { pin }
    }

    pub fn pin(&self) -> i32 {
        self.pin
    }
}

impl ErrorType for GpioOutput {
    type Error = Infallible;
}

impl OutputPin for GpioOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        gpio_write(self.pin, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        gpio_write(self.pin, true);
        Ok(())
    }
}

impl StatefulOutputPin for GpioOutput {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(gpio_read(self.pin))
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!gpio_read(self.pin))
    }
}

// ── Speed input routing ───────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn pulse_gpio_isr(_arg: *mut core::ffi::c_void) {
    if crate::sensors::pulse::pulse_isr_handler() {
        crate::drivers::hw_timer::realign_sample_clock();
    }
}

/// Hand the speed input pin to the pulse ISR or the GPS UART.
#[cfg(target_os = "espidf")]
pub fn select_input(source: InputSource) -> Result<(), HwInitError> {
    // SAFETY: called from the main task only; the ISR handler is a static
    // function that touches only atomics and the critical-section hand-off.
    unsafe {
        match source {
            InputSource::Pulse => {
                release_gps_uart(|| {
                    uart_driver_delete(pins::GPS_UART_PORT);
                });
                let cfg = gpio_config_t {
                    pin_bit_mask: 1u64 << pins::SPEED_INPUT_GPIO,
                    mode: gpio_mode_t_GPIO_MODE_INPUT,
                    pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
                    pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_ENABLE,
                    intr_type: gpio_int_type_t_GPIO_INTR_POSEDGE,
                };
                let ret = gpio_config(&cfg);
                if ret != ESP_OK {
                    return Err(HwInitError::GpioConfigFailed(ret));
                }
                let ret = gpio_isr_handler_add(
                    pins::SPEED_INPUT_GPIO,
                    Some(pulse_gpio_isr),
                    core::ptr::null_mut(),
                );
                if ret != ESP_OK {
                    return Err(HwInitError::IsrInstallFailed(ret));
                }
                gpio_intr_enable(pins::SPEED_INPUT_GPIO);
                info!("hw_init: speed input -> pulse ISR (GPIO{})", pins::SPEED_INPUT_GPIO);
            }
            InputSource::Gps => {
                gpio_intr_disable(pins::SPEED_INPUT_GPIO);
                gpio_isr_handler_remove(pins::SPEED_INPUT_GPIO);
                let _uart = GPS_UART.lock().unwrap_or_else(|e| e.into_inner());
                if GPS_ACTIVE.load(Ordering::Acquire) {
                    return Ok(());
                }

                let uart_cfg = uart_config_t {
                    baud_rate: pins::GPS_BAUD,
                    data_bits: uart_word_length_t_UART_DATA_8_BITS,
                    parity: uart_parity_t_UART_PARITY_DISABLE,
                    stop_bits: uart_stop_bits_t_UART_STOP_BITS_1,
                    flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
                    ..Default::default()
                };
                let ret = uart_driver_install(
                    pins::GPS_UART_PORT,
                    pins::GPS_RX_BUF_LEN,
                    0,
                    0,
                    core::ptr::null_mut(),
                    0,
                );
                if ret != ESP_OK {
                    return Err(HwInitError::UartInstallFailed(ret));
                }
                let ret = uart_param_config(pins::GPS_UART_PORT, &uart_cfg);
                if ret != ESP_OK {
                    uart_driver_delete(pins::GPS_UART_PORT);
                    return Err(HwInitError::UartInstallFailed(ret));
                }
                let ret = uart_set_pin(
                    pins::GPS_UART_PORT,
                    pins::GPS_TX_GPIO,
                    pins::GPS_RX_GPIO,
                    UART_PIN_NO_CHANGE,
                    UART_PIN_NO_CHANGE,
                );
                if ret != ESP_OK {
                    uart_driver_delete(pins::GPS_UART_PORT);
                    return Err(HwInitError::UartInstallFailed(ret));
                }
                GPS_ACTIVE.store(true, Ordering::Release);
                info!(
                    "hw_init: speed input -> GPS UART{} @ {} baud",
                    pins::GPS_UART_PORT,
                    pins::GPS_BAUD
                );
            }
        }
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn select_input(source: InputSource) -> Result<(), HwInitError> {
    match source {
        InputSource::Pulse => release_gps_uart(|| {}),
        InputSource::Gps => {
            let _uart = GPS_UART.lock().unwrap_or_else(|e| e.into_inner());
            GPS_ACTIVE.store(true, Ordering::Release);
        }
    }
    info!("hw_init(sim): speed input -> {:?}", source);
    Ok(())
}

/// Non-blocking read of buffered GPS bytes.
#[cfg(target_os = "espidf")]
pub fn gps_read(buf: &mut [u8]) -> usize {
    if !gps_active() || buf.is_empty() {
        return 0;
    }
    // SAFETY: the driver is installed while GPS_ACTIVE is set; zero ticks
    // to wait makes this a plain copy out of the RX ring.
    let n = unsafe {
        uart_read_bytes(
            pins::GPS_UART_PORT,
            buf.as_mut_ptr().cast(),
            buf.len() as u32,
            0,
        )
    };
    usize::try_from(n).unwrap_or(0)
}

/// Bytes waiting in the GPS UART RX ring.
#[cfg(target_os = "espidf")]
pub fn gps_buffered() -> usize {
    with_gps_uart(|| {
        let mut len: usize = 0;
        // SAFETY: the driver cannot be deleted while with_gps_uart holds
        // the lock; callable from the esp_timer task.
        let ret = unsafe { uart_get_buffered_data_len(pins::GPS_UART_PORT, &mut len) };
        if ret == ESP_OK { len } else { 0 }
    })
    .unwrap_or(0)
}
