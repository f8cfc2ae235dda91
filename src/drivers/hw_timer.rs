//! Hardware timers.
//!
//! - **Sample clock**: a gptimer with a 250 ms auto-reload alarm.  Its ISR
//!   closes the pulse epoch and queues [`Event::SampleReady`].  The pulse
//!   ISR zeroes the count on the first edge of an epoch
//!   ([`realign_sample_clock`]).
//! - **Flash timer**: a second gptimer whose ISR toggles the alarm light.
//!   The foreground re-times it through [`FlashTimer::program`]; a
//!   reprogram is stop, re-arm, restart.  One toggle at the stale period
//!   may still fire while that happens.
//! - **Housekeeping**: esp_timer callbacks (timer task context, not ISR)
//!   that push [`Event::WatchdogTick`] at 1 Hz and [`Event::GpsRx`] when
//!   GPS bytes are buffered.
//!
//! On simulation targets nothing is armed: tests and the host loop call
//! [`sim_sample_tick`] and read [`FlashTimer::period_ms`] instead.

use log::info;

use crate::error::TimerError;
use crate::events::{Event, push_event};

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicPtr, Ordering};
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use crate::pins;

/// Housekeeping tick period (µs).
#[cfg(target_os = "espidf")]
const WATCHDOG_TICK_US: u64 = 1_000_000;
/// GPS RX poll period (µs).  19200 baud fills ~100 bytes in 50 ms.
#[cfg(target_os = "espidf")]
const GPS_POLL_US: u64 = 50_000;

#[cfg(target_os = "espidf")]
static SAMPLE_TIMER: AtomicPtr<gptimer_t> = AtomicPtr::new(core::ptr::null_mut());

// ── Sample clock ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn sample_alarm_cb(
    _timer: gptimer_handle_t,
    _edata: *const gptimer_alarm_event_data_t,
    _ctx: *mut core::ffi::c_void,
) -> bool {
    crate::sensors::pulse::sample_tick_isr_handler();
    push_event(Event::SampleReady);
    false
}

#[cfg(target_os = "espidf")]
unsafe fn new_gptimer(
    on_alarm: gptimer_alarm_cb_t,
    period_us: u64,
) -> Result<gptimer_handle_t, TimerError> {
    let cfg = gptimer_config_t {
        clk_src: soc_periph_gptimer_clk_src_t_GPTIMER_CLK_SRC_DEFAULT,
        direction: gptimer_count_direction_t_GPTIMER_COUNT_UP,
        resolution_hz: pins::TIMER_RESOLUTION_HZ,
        ..Default::default()
    };
    let mut handle: gptimer_handle_t = core::ptr::null_mut();
    // SAFETY: handle is a valid out-pointer; callbacks are static fns.
    unsafe {
        let ret = gptimer_new_timer(&cfg, &mut handle);
        if ret != ESP_OK {
            return Err(TimerError::CreateFailed(ret));
        }
        let cbs = gptimer_event_callbacks_t { on_alarm };
        let ret = gptimer_register_event_callbacks(handle, &cbs, core::ptr::null_mut());
        if ret != ESP_OK {
            return Err(TimerError::CreateFailed(ret));
        }
        set_alarm(handle, period_us).map_err(|e| match e {
            TimerError::ProgramFailed(rc) => TimerError::CreateFailed(rc),
            other => other,
        })?;
        let ret = gptimer_enable(handle);
        if ret != ESP_OK {
            return Err(TimerError::CreateFailed(ret));
        }
    }
    Ok(handle)
}

#[cfg(target_os = "espidf")]
unsafe fn set_alarm(handle: gptimer_handle_t, period_us: u64) -> Result<(), TimerError> {
    let mut alarm = gptimer_alarm_config_t {
        alarm_count: period_us,
        reload_count: 0,
        ..Default::default()
    };
    alarm.flags.set_auto_reload_on_alarm(1);
    // SAFETY: handle came from gptimer_new_timer.
    let ret = unsafe { gptimer_set_alarm_action(handle, &alarm) };
    if ret != ESP_OK {
        return Err(TimerError::ProgramFailed(ret));
    }
    Ok(())
}

/// Create and start the 250 ms sample clock.
#[cfg(target_os = "espidf")]
pub fn start_sample_clock() -> Result<(), TimerError> {
    // SAFETY: single call from main before the event loop.
    unsafe {
        let handle = new_gptimer(Some(sample_alarm_cb), pins::SAMPLE_PERIOD_US)?;
        let ret = gptimer_start(handle);
        if ret != ESP_OK {
            return Err(TimerError::CreateFailed(ret));
        }
        SAMPLE_TIMER.store(handle, Ordering::Release);
    }
    info!("hw_timer: sample clock @ {} ms", pins::SAMPLE_PERIOD_US / 1000);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn start_sample_clock() -> Result<(), TimerError> {
    info!("hw_timer(sim): sample clock driven by sim_sample_tick()");
    Ok(())
}

/// Zero the sample clock's count so the epoch starts at this edge.
/// Called from the pulse ISR.
#[cfg(target_os = "espidf")]
pub fn realign_sample_clock() {
    let handle = SAMPLE_TIMER.load(Ordering::Acquire);
    if !handle.is_null() {
        // SAFETY: gptimer_set_raw_count is ISR-safe on a live handle.
        unsafe {
            gptimer_set_raw_count(handle, 0);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn realign_sample_clock() {}

/// Host-only: one sample clock expiry, as the ISR would run it.
#[cfg(not(target_os = "espidf"))]
pub fn sim_sample_tick() {
    crate::sensors::pulse::sample_tick_isr_handler();
    push_event(Event::SampleReady);
}

// ── Alarm flash timer ─────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn flash_alarm_cb(
    _timer: gptimer_handle_t,
    _edata: *const gptimer_alarm_event_data_t,
    _ctx: *mut core::ffi::c_void,
) -> bool {
    crate::drivers::hw_init::gpio_toggle(pins::ALARM_LIGHT_GPIO);
    false
}

/// Reprogrammable periodic timer that blinks the alarm light.
pub struct FlashTimer {
    #[cfg(target_os = "espidf")]
    handle: gptimer_handle_t,
    /// Programmed period; `None` while stopped.
    period_ms: Option<u32>,
}

impl FlashTimer {
    /// Allocate the timer, stopped.
    pub fn new() -> Result<Self, TimerError> {
        #[cfg(target_os = "espidf")]
        {
            // Period is a placeholder until the first program().
            let handle = unsafe { new_gptimer(Some(flash_alarm_cb), 1_000_000)? };
            info!("hw_timer: flash timer allocated");
            Ok(Self {
                handle,
                period_ms: None,
            })
        }

        #[cfg(not(target_os = "espidf"))]
        {
            Ok(Self { period_ms: None })
        }
    }

    /// Start toggling every `period_ms`, or re-time a running flash.
    pub fn program(&mut self, period_ms: u32) -> Result<(), TimerError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: handle is live for the lifetime of self.
            unsafe {
                if self.period_ms.is_some() {
                    let ret = gptimer_stop(self.handle);
                    if ret != ESP_OK {
                        return Err(TimerError::ProgramFailed(ret));
                    }
                    self.period_ms = None;
                }
                set_alarm(self.handle, u64::from(period_ms) * 1_000)?;
                let ret = gptimer_set_raw_count(self.handle, 0);
                if ret != ESP_OK {
                    return Err(TimerError::ProgramFailed(ret));
                }
                let ret = gptimer_start(self.handle);
                if ret != ESP_OK {
                    return Err(TimerError::ProgramFailed(ret));
                }
            }
        }
        self.period_ms = Some(period_ms);
        info!("hw_timer: flash period {} ms", period_ms);
        Ok(())
    }

    /// Stop flashing.  The light keeps whatever level it had.
    pub fn disable(&mut self) -> Result<(), TimerError> {
        if self.period_ms.is_none() {
            return Ok(());
        }
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: handle is live for the lifetime of self.
            let ret = unsafe { gptimer_stop(self.handle) };
            if ret != ESP_OK {
                return Err(TimerError::ProgramFailed(ret));
            }
        }
        self.period_ms = None;
        info!("hw_timer: flash stopped");
        Ok(())
    }

    /// Period currently programmed, `None` while stopped.
    pub fn period_ms(&self) -> Option<u32> {
        self.period_ms
    }

    pub fn is_running(&self) -> bool {
        self.period_ms.is_some()
    }
}

// ── Housekeeping (esp_timer task context) ─────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn watchdog_tick_cb(_arg: *mut core::ffi::c_void) {
    push_event(Event::WatchdogTick);
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn gps_poll_cb(_arg: *mut core::ffi::c_void) {
    if crate::drivers::hw_init::gps_buffered() > 0 {
        push_event(Event::GpsRx);
    }
}

#[cfg(target_os = "espidf")]
unsafe fn start_periodic(
    name: &'static [u8],
    callback: unsafe extern "C" fn(*mut core::ffi::c_void),
    period_us: u64,
) -> Result<(), TimerError> {
    let args = esp_timer_create_args_t {
        callback: Some(callback),
        arg: core::ptr::null_mut(),
        dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
        name: name.as_ptr() as *const _,
        skip_unhandled_events: true,
    };
    let mut handle: esp_timer_handle_t = core::ptr::null_mut();
    // SAFETY: args and handle outlive the call; callback only pushes events.
    let ret = unsafe { esp_timer_create(&args, &mut handle) };
    if ret != ESP_OK {
        return Err(TimerError::CreateFailed(ret));
    }
    let ret = unsafe { esp_timer_start_periodic(handle, period_us) };
    if ret != ESP_OK {
        return Err(TimerError::CreateFailed(ret));
    }
    Ok(())
}

/// Start the watchdog heartbeat and GPS RX poll timers.
#[cfg(target_os = "espidf")]
pub fn start_housekeeping() -> Result<(), TimerError> {
    // SAFETY: called once from main; names are static and null-terminated.
    unsafe {
        start_periodic(b"wdt_tick\0", watchdog_tick_cb, WATCHDOG_TICK_US)?;
        start_periodic(b"gps_poll\0", gps_poll_cb, GPS_POLL_US)?;
    }
    info!("hw_timer: housekeeping timers started");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn start_housekeeping() -> Result<(), TimerError> {
    info!("hw_timer(sim): housekeeping driven by the host loop");
    Ok(())
}
