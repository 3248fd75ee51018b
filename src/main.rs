//! PondGate firmware entry point
//!
//! Hexagonal architecture with a single cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   NvsAdapter   Esp32Time       │
//! │  (Relay+Sensor)    (EventSink)    (Config x2)  (Clocks)        │
//! │  UartBus ── ModbusSensorReader    intake (command channel)     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            GateController (pure logic)                 │    │
//! │  │  Gate · Takeover · Automation · Alarms · Sensors       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use embedded_hal::delay::DelayNs;
use esp_idf_svc::sntp::EspSntp;
use log::{info, warn};

use pondgate::adapters::hardware::HardwareAdapter;
use pondgate::adapters::log_sink::LogEventSink;
use pondgate::adapters::nvs::NvsAdapter;
use pondgate::adapters::time::{Esp32TimeAdapter, SystemDelay};
use pondgate::adapters::uart::UartBus;
use pondgate::app::events::AppEvent;
use pondgate::app::intake;
use pondgate::app::ports::{ConfigPort, EventSink, MonotonicClock};
use pondgate::app::service::GateController;
use pondgate::config::GateConfig;
use pondgate::drivers::relay::RelayBank;
use pondgate::drivers::watchdog::Watchdog;
use pondgate::sensors::modbus::ModbusSensorReader;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  PondGate v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Initialise hardware peripherals ────────────────────
    // Relays must be low before anything else runs.
    pondgate::drivers::hw_init::init_peripherals()?;

    // ── 3. Load config from NVS (or defaults) ─────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::default()
        }
    };
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            GateConfig::default()
        }
    };

    let watchdog = Watchdog::for_config(&config);

    // ── 4. Build adapters ─────────────────────────────────────
    let clock = Esp32TimeAdapter::new();
    let bus = UartBus::new()?;
    let reader = ModbusSensorReader::new(bus, Esp32TimeAdapter::new(), SystemDelay, &config);
    let mut hw = HardwareAdapter::new(RelayBank::new(), reader);
    let mut sink = LogEventSink::new();
    let mut delay = SystemDelay;

    // Wall time for daily rules; syncs once the transport brings a network up.
    let _sntp = match start_sntp() {
        Ok(sntp) => Some(sntp),
        Err(e) => {
            warn!("SNTP unavailable ({}), daily rules wait for wall time", e);
            None
        }
    };

    // ── 5. Controller ─────────────────────────────────────────
    let mut controller = GateController::new(config.clone());
    controller.start(clock.now_ms(), &mut hw, &nvs, &mut sink);

    info!("System ready. Entering control loop.");

    // ── 6. Control loop ───────────────────────────────────────
    let telemetry_period_ms = config.telemetry_interval_secs.saturating_mul(1_000);
    let mut last_telemetry_ms = clock.now_ms();

    loop {
        let now = clock.now_ms();

        intake::drain(|cmd| {
            if let Err(e) = controller.handle_command(cmd, now, &mut hw, &nvs, &mut sink) {
                warn!("command rejected: {}", e);
            }
        });

        controller.tick(now, &mut hw, &clock, &nvs, &mut sink);

        if now.wrapping_sub(last_telemetry_ms) >= telemetry_period_ms {
            last_telemetry_ms = now;
            sink.emit(&AppEvent::Telemetry(controller.telemetry(now)));
        }

        watchdog.feed();
        delay.delay_ms(config.control_loop_interval_ms);
    }
}

fn start_sntp() -> Result<EspSntp<'static>> {
    esp_idf_svc::sys::esp!(unsafe { esp_idf_svc::sys::esp_netif_init() })?;
    let sntp = EspSntp::new_default()?;
    info!("SNTP started");
    Ok(sntp)
}
