//! BuildFlag Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  FlagHardware            LogEventSink   NvsConfigStore         │
//! │  (limits, stepper, LEDs) WsEventSink    WifiStation            │
//! │  HttpApi (REST + WS)     HttpAnnouncer (directory)             │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              FlagService (pure logic)                  │    │
//! │  │  calibration FSM · LED pattern engine                  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  TickScheduler (500 ms) · CommandBus (HTTP ▶ control loop)     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Threads: the control loop runs on the main task, chunks are pulsed
//! by the stepper worker, directory POSTs by the announce worker, and
//! httpd serves requests on its own task.
#![deny(unused_must_use)]

use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::Ets;
use esp_idf_svc::hal::gpio::{AnyInputPin, AnyOutputPin, PinDriver, Pull};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};

use buildflag::adapters::directory::HttpAnnouncer;
use buildflag::adapters::hardware::FlagHardware;
use buildflag::adapters::http::HttpApi;
use buildflag::adapters::log_sink::LogEventSink;
use buildflag::adapters::nvs::NvsConfigStore;
use buildflag::adapters::wifi::{Credentials, WifiStation};
use buildflag::announce::{
    ANNOUNCE_LABEL, AnnounceJob, AnnounceLink, AnnounceTrigger, spawn_announce_worker,
};
use buildflag::app::bus::CommandBus;
use buildflag::app::ports::load_or_provision;
use buildflag::app::service::FlagService;
use buildflag::config::FlagConfig;
use buildflag::drivers::led_strip::LedStrip;
use buildflag::drivers::limit_switch::LimitSwitch;
use buildflag::drivers::stepper::{StepperDriver, StepperHandle, StepperLink, spawn_stepper_worker};
use buildflag::drivers::watchdog::Watchdog;
use buildflag::error::Limit;
use buildflag::pins;
use buildflag::scheduler::{Schedule, ScheduleKind, TickScheduler};

/// How often the control loop checks the Wi-Fi link (in ticks).
const LINK_CHECK_TICKS: u64 = 20;

/// Strip handle for the shutdown hook.
static STRIP: OnceLock<Arc<Mutex<LedStrip>>> = OnceLock::new();

/// Blank the strip before a software reset so the flag never restarts
/// showing a stale status.
unsafe extern "C" fn lights_off_on_shutdown() {
    if let Some(strip) = STRIP.get() {
        if let Ok(mut strip) = strip.try_lock() {
            if let Err(e) = strip.clear() {
                warn!("Shutdown: could not blank the strip: {}", e);
            }
        }
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("BuildFlag v{}", env!("CARGO_PKG_VERSION"));

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Config from NVS (or defaults) ──────────────────────
    let config = match NvsConfigStore::new(nvs_partition.clone()) {
        Ok(mut store) => load_or_provision(&mut store),
        Err(e) => {
            warn!("NVS unavailable ({}), using defaults", e);
            FlagConfig::default()
        }
    };
    info!(
        "Config: host={} step_range={} tick={}ms leds={}+{}",
        config.hostname,
        config.step_range,
        config.tick_interval_ms,
        config.leds.bottom_leds,
        config.leds.top_leds
    );

    // ── 3. LED strip first, so it is dark during the rest of boot ─
    let mut strip = LedStrip::new(
        peripherals.rmt.channel0,
        // SAFETY: every GPIO number in `pins` is claimed exactly once.
        unsafe { AnyOutputPin::new(pins::LED_DATA_GPIO) },
        config.leds.strip_len(),
    )?;
    strip.clear()?;
    let strip = Arc::new(Mutex::new(strip));
    if STRIP.set(strip.clone()).is_ok() {
        // SAFETY: registers a plain `extern "C" fn` with no captured state.
        let ret = unsafe {
            esp_idf_svc::sys::esp_register_shutdown_handler(Some(lights_off_on_shutdown))
        };
        if ret != esp_idf_svc::sys::ESP_OK as i32 {
            warn!("Shutdown handler not registered ({})", ret);
        }
    }

    // ── 4. Network ────────────────────────────────────────────
    let mut wifi = WifiStation::new(
        peripherals.modem,
        sysloop,
        nvs_partition,
        Credentials::from_build_env()?,
    )?;
    let ip = match wifi.connect() {
        Ok(ip) => Some(ip),
        Err(e) => {
            warn!("{}; continuing offline, will retry", e);
            None
        }
    };

    // ── 5. Limit switches ─────────────────────────────────────
    // SAFETY: see step 3.
    let mut bottom_pin = PinDriver::input(unsafe { AnyInputPin::new(pins::BOTTOM_LIMIT_GPIO) })?;
    bottom_pin.set_pull(Pull::Down)?;
    let mut top_pin = PinDriver::input(unsafe { AnyInputPin::new(pins::TOP_LIMIT_GPIO) })?;
    top_pin.set_pull(Pull::Down)?;

    // ── 6. Stepper ────────────────────────────────────────────
    let mut enable = PinDriver::output(unsafe { AnyOutputPin::new(pins::STEPPER_ENABLE_GPIO) })?;
    enable.set_low()?;
    let driver = StepperDriver::new(
        PinDriver::output(unsafe { AnyOutputPin::new(pins::STEPPER_STEP_GPIO) })?,
        PinDriver::output(unsafe { AnyOutputPin::new(pins::STEPPER_DIR_GPIO) })?,
        Ets,
        config.steps_per_revolution,
        config.motor_rpm,
    );
    let stepper_link = Arc::new(StepperLink::new());
    spawn_stepper_worker(driver, stepper_link.clone())?;

    let mut hw = FlagHardware::new(
        LimitSwitch::new(bottom_pin, Limit::Bottom, config.limit_active_high),
        LimitSwitch::new(top_pin, Limit::Top, config.limit_active_high),
        StepperHandle::new(stepper_link),
        strip,
    );

    // ── 7. Command surface ────────────────────────────────────
    let bus = Arc::new(CommandBus::new());
    let http = HttpApi::start(&config, bus.clone())?;
    let mut sink = (LogEventSink::new(), http.event_sink());

    // ── 8. Directory announce ─────────────────────────────────
    let announce_link = Arc::new(AnnounceLink::new());
    spawn_announce_worker(
        AnnounceJob::new(HttpAnnouncer::new(), &config),
        announce_link.clone(),
    )?;
    let mut announce = AnnounceTrigger::new(announce_link);
    announce.set_ip(ip);

    // ── 9. Service + scheduler ────────────────────────────────
    let mut service = FlagService::new(&config);
    if let Err(e) = service.lights_off(&mut hw) {
        error!("LED strip unusable at boot: {}", e);
    }
    service.start(&mut sink);

    let mut scheduler = TickScheduler::new(config.tick_interval_ms);
    scheduler.add(Schedule {
        label: ANNOUNCE_LABEL,
        kind: ScheduleKind::OneShot { delay_ticks: 0 },
        enabled: true,
    });
    scheduler.add(Schedule {
        label: ANNOUNCE_LABEL,
        kind: ScheduleKind::Periodic {
            interval_ticks: config.announce_interval_ticks(),
        },
        enabled: true,
    });

    let watchdog = Watchdog::new(config.watchdog_timeout_ms);

    info!(
        "Entering control loop ({:?} per tick, {} schedules, watchdog {} ms)",
        scheduler.interval(),
        scheduler.active_count(),
        watchdog.timeout_ms()
    );

    // ── 10. Control loop ──────────────────────────────────────
    loop {
        let started = Instant::now();

        scheduler.run_tick(&mut service, &bus, &mut hw, &mut sink, &mut announce);
        watchdog.feed();

        if scheduler.ticks() % LINK_CHECK_TICKS == 0 {
            announce.set_ip(wifi.ensure_connected());
        }

        let pause = scheduler.remaining(started.elapsed());
        std::thread::sleep(pause.max(Duration::from_millis(1)));
    }
}
