//! Host build of the thermostat: the coordination core on a dedicated
//! thread, fed by tokio tasks standing in for the timer and input
//! interrupts of the real board.
//!
//! ```text
//!  sample timer ─┐
//!  rtc tick ─────┤                 ┌──────────────┐
//!  idle timer ───┼─▶ EVENT_QUEUE ─▶│  Dispatcher  │─▶ HostBoard (sim + MQTT)
//!  front panel ──┘   + interrupt   │  (std thread)│
//!                                  └──────────────┘
//! ```

mod config;
mod devices;
mod mqtt;
mod panel;

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, Condvar, Mutex, PoisonError,
    },
    time::{Duration, Instant},
};

use anyhow::Context;
use rumqttc::{AsyncClient, MqttOptions};
use tokio::{net::TcpListener, sync::Notify};
use tracing::{info, warn};

use thermostat_core::{Dispatcher, Event, EventQueue, Frame, Outputs};

use self::{
    config::{ConfigStore, RuntimeConfig},
    devices::{HostBoard, SimClock, SimDisplay, SimEquipment, SimPlatform, SimSensor},
    mqtt::{HostLogger, HostMessenger, ServerCache},
};

/// The one queue between producers and the dispatcher.
static EVENT_QUEUE: EventQueue = EventQueue::new();

/// Wake-up line for the dispatcher's low-power wait.
///
/// A raise that lands between the dispatcher's emptiness check and its wait
/// is latched, so the wait returns at once.
#[derive(Default)]
pub struct InterruptLine {
    raised: Mutex<bool>,
    wake: Condvar,
}

impl InterruptLine {
    pub fn raise(&self) {
        let mut raised = self.raised.lock().unwrap_or_else(PoisonError::into_inner);
        *raised = true;
        self.wake.notify_one();
    }

    pub fn wait(&self, queue: &EventQueue) {
        let mut raised = self.raised.lock().unwrap_or_else(PoisonError::into_inner);
        while !*raised && queue.is_empty() {
            raised = self
                .wake
                .wait(raised)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *raised = false;
    }
}

/// State touched by both the dispatcher thread and the async side.
pub struct HostShared {
    pub line: InterruptLine,
    pub motion: AtomicBool,
    pub sample_period_secs: AtomicU32,
    pub sample_period_changed: Notify,
    pub idle_deadline: Mutex<Option<Instant>>,
    pub idle_changed: Notify,
    pub outputs: Mutex<Outputs>,
    pub screen_on: AtomicBool,
    pub frame: Mutex<Option<Frame>>,
}

impl HostShared {
    fn new(sample_period_secs: u32) -> Self {
        Self {
            line: InterruptLine::default(),
            motion: AtomicBool::new(false),
            sample_period_secs: AtomicU32::new(sample_period_secs),
            sample_period_changed: Notify::new(),
            idle_deadline: Mutex::new(None),
            idle_changed: Notify::new(),
            outputs: Mutex::new(Outputs::OFF),
            screen_on: AtomicBool::new(false),
            frame: Mutex::new(None),
        }
    }

    /// What an interrupt handler does: enqueue and wake the dispatcher.
    pub fn interrupt(&self, event: Event) {
        if let Err(err) = EVENT_QUEUE.push(event) {
            warn!("interrupt dropped: {err}");
        }
        self.line.raise();
    }

    pub fn outputs(&self) -> Outputs {
        *self.outputs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = ConfigStore::new();
    let mut runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });
    runtime.apply_env();

    let timezone: chrono_tz::Tz = runtime.timezone.parse().unwrap_or_else(|err| {
        warn!("unknown timezone {:?} ({err}), using UTC", runtime.timezone);
        chrono_tz::UTC
    });

    let network = &runtime.network;
    let mut mqtt_options =
        MqttOptions::new(network.client_id.clone(), network.mqtt_host.clone(), network.mqtt_port);
    if !network.mqtt_user.is_empty() {
        mqtt_options.set_credentials(network.mqtt_user.clone(), network.mqtt_pass.clone());
    }
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    let (client, eventloop) = AsyncClient::new(mqtt_options, 64);

    let cache = Arc::new(ServerCache::default());
    mqtt::subscribe_topics(&client).await?;
    mqtt::spawn_mqtt_loop(cache.clone(), eventloop);

    let shared = Arc::new(HostShared::new(
        runtime.thermostat.default_sample_period_secs,
    ));

    let board = HostBoard {
        sensor: SimSensor::new(&runtime.room, shared.clone()),
        clock: SimClock::new(timezone),
        display: SimDisplay::new(shared.clone()),
        messenger: HostMessenger::new(client.clone(), cache),
        logger: HostLogger::new(client),
        equipment: SimEquipment::new(shared.clone()),
        platform: SimPlatform::new(shared.clone()),
    };

    let thermostat = runtime.thermostat.clone();
    std::thread::Builder::new()
        .name("dispatcher".to_string())
        .spawn(move || Dispatcher::new(&EVENT_QUEUE, board, thermostat).run())
        .context("failed to start dispatcher thread")?;

    spawn_sample_timer(shared.clone());
    spawn_rtc_tick(shared.clone(), Duration::from_secs(runtime.rtc_update_secs.max(1)));
    spawn_idle_timer(shared.clone());

    let app = panel::router(shared);
    let addr = SocketAddr::from(([0, 0, 0, 0], runtime.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind front panel at {addr}"))?;

    info!("front panel listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("ctrl-c handler failed: {err}");
            }
            info!("shutting down");
        })
        .await?;
    Ok(())
}

/// Periodic `SampleAir`; reprogrammed through `sample_period_changed`.
fn spawn_sample_timer(shared: Arc<HostShared>) {
    tokio::spawn(async move {
        loop {
            let period = shared.sample_period_secs.load(Ordering::Relaxed).max(1);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(u64::from(period))) => {
                    shared.interrupt(Event::SampleAir);
                }
                _ = shared.sample_period_changed.notified() => {
                    let period = shared.sample_period_secs.load(Ordering::Relaxed);
                    info!("sample period now {period}s");
                }
            }
        }
    });
}

fn spawn_rtc_tick(shared: Arc<HostShared>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The boot cascade already queues the first update.
        interval.tick().await;
        loop {
            interval.tick().await;
            shared.interrupt(Event::RtcUpdate);
        }
    });
}

/// One-shot idle timer raising `NoMotion` at the armed deadline.
fn spawn_idle_timer(shared: Arc<HostShared>) {
    tokio::spawn(async move {
        loop {
            let deadline = *shared
                .idle_deadline
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match deadline {
                Some(at) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(tokio::time::Instant::from_std(at)) => {
                            let mut armed = shared
                                .idle_deadline
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner);
                            if *armed == Some(at) {
                                *armed = None;
                                drop(armed);
                                shared.interrupt(Event::NoMotion);
                            }
                        }
                        _ = shared.idle_changed.notified() => {}
                    }
                }
                None => shared.idle_changed.notified().await,
            }
        }
    });
}
