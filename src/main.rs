//! Speedwatch Firmware: Main Entry Point
//!
//! Hexagonal architecture with interrupt-driven execution.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter            LogEventSink       NvsAdapter      │
//! │  (SpeedInput+Alarm+Status)  (EventSink)        (Config+NVS)    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            MonitorService (pure logic)                 │    │
//! │  │  Estimator · Alarm · Calibration · Field run           │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  ISRs: pulse edge · 250 ms sample clock · alarm flash          │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use log::{error, info, warn};

use speedwatch::adapters::hardware::HardwareAdapter;
use speedwatch::adapters::log_sink::LogEventSink;
use speedwatch::adapters::nvs::NvsAdapter;
use speedwatch::app::commands::take_command;
use speedwatch::app::ports::ConfigPort;
use speedwatch::app::service::MonitorService;
use speedwatch::config::SystemConfig;
use speedwatch::diagnostics::RuntimeMetrics;
use speedwatch::drivers::alarm_light::AlarmLight;
use speedwatch::drivers::hw_init::{self, GpioOutput};
use speedwatch::drivers::hw_timer::{self, FlashTimer};
use speedwatch::drivers::status_light::StatusLight;
use speedwatch::drivers::watchdog::{self, Watchdog};
use speedwatch::error::Error;
use speedwatch::events::{self, Event};
use speedwatch::pins;

/// Watchdog ticks (1 Hz) between diagnostics dumps.
const DIAGNOSTICS_INTERVAL_TICKS: u32 = 60;
/// Idle delay when the event queue is empty.
const IDLE_DELAY_MS: u32 = 10;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Speedwatch v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Peripherals ────────────────────────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        error!("HAL init failed: {}", e);
        watchdog::halt("peripheral init");
    }
    let mut wdt = Watchdog::new();

    // ── 3. Settings (NVS or defaults) ─────────────────────────
    let mut nvs = NvsAdapter::new().map_err(Error::from)?;
    let config = nvs.load().unwrap_or_else(|e| {
        warn!("NVS storage unavailable ({}), using defaults", e);
        SystemConfig::default()
    });

    // ── 4. Adapters + service ─────────────────────────────────
    let flash = FlashTimer::new().map_err(Error::from)?;
    let mut hw = HardwareAdapter::new(
        AlarmLight::new(GpioOutput::new(pins::ALARM_LIGHT_GPIO), flash),
        GpioOutput::new(pins::AUX_OUTPUT_GPIO),
        StatusLight::new(GpioOutput::new(pins::STATUS_LIGHT_GPIO)),
    );
    let mut log_sink = LogEventSink::new();

    let mut monitor = MonitorService::new(config)?;
    monitor.start(&mut hw, &mut log_sink)?;

    hw_timer::start_sample_clock().map_err(Error::from)?;
    hw_timer::start_housekeeping().map_err(Error::from)?;

    info!("System ready. Entering event loop.");

    // ── 5. Event loop ─────────────────────────────────────────
    let mut housekeeping_ticks: u32 = 0;
    loop {
        let mut fault: Option<Error> = None;

        events::drain_events(|event| {
            if fault.is_some() {
                return;
            }
            match event {
                Event::SampleReady => {
                    if let Err(e) = monitor.tick(&mut hw, &mut log_sink) {
                        fault = Some(e);
                    }
                }

                Event::GpsRx => monitor.poll_gps_input(&mut hw, &mut log_sink),

                Event::CommandReceived => {
                    while let Some(cmd) = take_command() {
                        let reply = monitor.handle_command(cmd, &mut hw, &mut nvs, &mut log_sink);
                        if !reply.is_ok() {
                            info!("command {:?} -> {:?}", cmd, reply.result);
                        }
                    }
                }

                Event::WatchdogTick => {
                    wdt.feed();
                    monitor.save_if_dirty(&mut nvs, &mut log_sink);
                    housekeeping_ticks += 1;
                    if housekeeping_ticks >= DIAGNOSTICS_INTERVAL_TICKS {
                        housekeeping_ticks = 0;
                        if let Some(json) = RuntimeMetrics::collect().to_json() {
                            info!("DIAG  | {}", json);
                        }
                    }
                }
            }
        });

        // Timer faults are unrecoverable: stop feeding and let the
        // watchdog reset the board.
        if let Some(e) = fault {
            error!("fatal: {}", e);
            watchdog::halt("timer fault");
        }

        if events::queue_is_empty() {
            FreeRtos::delay_ms(IDLE_DELAY_MS);
        }
    }
}
