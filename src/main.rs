//! Sonotify firmware entry point
//!
//! Hexagonal architecture with a single-consumer event loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiAdapter      NvsAdapter     TableSource     LogEventSink  │
//! │  (Connectivity)   (Config)       (HTTPS/SPIFFS)  (EventSink)   │
//! │  ReaderPoller ──▶ EventQueue ◀── notifier worker ◀── Outbox    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │           DispatchSession (pure logic)                 │    │
//! │  │  FSM · scan admission · parse · resolve · build        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::AnyIOPin;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::uart::{UartDriver, config::Config as UartConfig};
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use sonotify::adapters::log_sink::LogEventSink;
use sonotify::adapters::notifier::{HttpNotifier, QueuedNotifier, run_notifier_worker};
use sonotify::adapters::nvs::NvsAdapter;
use sonotify::adapters::reader::ReaderPoller;
use sonotify::adapters::storage;
use sonotify::adapters::table_source;
use sonotify::adapters::wifi::{ConnectivityPort, WifiAdapter};
use sonotify::app::ports::ConfigPort;
use sonotify::app::service::DispatchSession;
use sonotify::config::{DispatchConfig, DispatchMode};
use sonotify::events::{EventQueue, NotifyOutbox};

/// Reader module UART baud rate.
const READER_BAUD: u32 = 115_200;

static SESSION_EVENTS: EventQueue = EventQueue::new();
static OUTBOX: NotifyOutbox = NotifyOutbox::new();

fn load_config(nvs_partition: &EspDefaultNvsPartition) -> DispatchConfig {
    let nvs = match NvsAdapter::new(nvs_partition.clone()) {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS open failed ({}), running with defaults", e);
            return DispatchConfig::default();
        }
    };
    match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            DispatchConfig::default()
        }
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Sonotify v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Config (NVS or defaults) ───────────────────────────
    let config = load_config(&nvs_partition);
    info!(
        "Mode {:?}, table {:?}, target {}",
        config.mode, config.table_source, config.target_device
    );

    // ── 3. Network ────────────────────────────────────────────
    // A failed join is not fatal: the local table may still serve.
    let mut wifi = WifiAdapter::new(
        peripherals.modem,
        sysloop,
        Some(nvs_partition),
        config.wifi_max_retries,
    )?;
    if let Err(e) = wifi
        .set_credentials(&config.wifi_ssid, &config.wifi_password)
        .and_then(|()| wifi.connect())
    {
        warn!("WiFi unavailable ({}), continuing offline", e);
    }

    // ── 4. Local storage ──────────────────────────────────────
    if let Err(e) = storage::mount_spiffs() {
        warn!("SPIFFS unavailable: {}", e);
    }

    // ── 5. Collaborator threads ───────────────────────────────
    let notify_timeout_ms = config.notify_timeout_ms;
    std::thread::Builder::new()
        .name("notifier".into())
        .stack_size(8 * 1024)
        .spawn(move || {
            let mut transport = HttpNotifier::new(notify_timeout_ms);
            run_notifier_worker(&OUTBOX, &mut transport, &SESSION_EVENTS);
        })?;

    if config.mode == DispatchMode::Matched {
        let uart = UartDriver::new(
            peripherals.uart1,
            peripherals.pins.gpio17,
            peripherals.pins.gpio16,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &UartConfig::default().baudrate(Hertz(READER_BAUD)),
        )?;
        let format = config.tag_format;
        let release_polls = config.reader_release_polls;
        let poll_ms = config.poll_interval_ms;
        std::thread::Builder::new()
            .name("reader".into())
            .stack_size(4 * 1024)
            .spawn(move || {
                ReaderPoller::new(uart, format, release_polls).run(&SESSION_EVENTS, poll_ms);
            })?;
    }

    // ── 6. Session ────────────────────────────────────────────
    let mut source = table_source::from_config(&config);
    let mut notifier = QueuedNotifier::new(&OUTBOX);
    let mut sink = LogEventSink::new();
    let mut session = DispatchSession::new(config.clone());
    session.start(&mut source, &mut notifier, &mut FreeRtos, &mut sink);

    let refresh_every = (config.table_refresh_secs > 0).then(|| {
        (u64::from(config.table_refresh_secs) * 1000 / u64::from(config.poll_interval_ms)).max(1)
    });

    // ── 7. Event loop ─────────────────────────────────────────
    let mut ticks: u64 = 0;
    loop {
        SESSION_EVENTS.drain(|event| session.handle_event(event, &mut notifier, &mut sink));
        if session.is_finished() {
            break;
        }
        session.tick(&mut notifier, &mut sink);

        ticks += 1;
        if refresh_every.is_some_and(|every| ticks % every == 0) {
            session.refresh_table(&mut source, &mut sink);
        }
        FreeRtos::delay_ms(config.poll_interval_ms);
    }

    match session.last_notification() {
        Some(Ok(status)) => info!("Session finished (last notification HTTP {})", status),
        Some(Err(e)) => error!("Session finished (last notification failed: {})", e),
        None => error!("Session finished in {:?} without dispatching", session.state()),
    }
    Ok(())
}
