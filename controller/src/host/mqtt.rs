//! MQTT-backed messenger and device log.
//!
//! The server publishes its data (epoch, schedule, forecast, override) as
//! retained messages; the event loop caches the latest of each so a
//! `request` is a lookup that never blocks the dispatcher.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::{Duration, Instant},
};

use rumqttc::{AsyncClient, Event, Incoming, QoS};
use tracing::{debug, error, info, warn};

use thermostat_core::{
    Forecast, InboxMessage, Logger, Messenger, Reply, Request, Schedule, Telemetry,
    TOPIC_DEVICE_LOG, TOPIC_SERVER_ANNOUNCE, TOPIC_SERVER_EPOCH, TOPIC_SERVER_FORECAST,
    TOPIC_SERVER_NOTIFY, TOPIC_SERVER_OVERRIDE, TOPIC_SERVER_SCHEDULE,
};

const MAX_MQTT_PAYLOAD_BYTES: usize = 4096;
const MAX_INBOX: usize = 16;
const LOG_LINES: usize = 32;

/// Latest server data, written by the event loop and read by the messenger.
#[derive(Default)]
pub struct ServerCache {
    connected: AtomicBool,
    announced: AtomicBool,
    epoch: Mutex<Option<(u64, Instant)>>,
    schedule: Mutex<Option<Vec<u8>>>,
    forecast: Mutex<Option<Vec<u8>>>,
    override_f: Mutex<Option<Vec<u8>>>,
    inbox: Mutex<VecDeque<InboxMessage>>,
}

impl ServerCache {
    fn store(&self, topic: &str, payload: &[u8]) {
        match topic {
            TOPIC_SERVER_NOTIFY => {
                let Some(message) = std::str::from_utf8(payload).ok().and_then(InboxMessage::parse)
                else {
                    warn!("ignoring unknown notification {:?}", String::from_utf8_lossy(payload));
                    return;
                };
                let mut inbox = lock(&self.inbox);
                if inbox.len() == MAX_INBOX {
                    inbox.pop_front();
                }
                inbox.push_back(message);
            }
            TOPIC_SERVER_ANNOUNCE => {
                self.announced.store(!payload.is_empty(), Ordering::Relaxed);
            }
            TOPIC_SERVER_EPOCH => match serde_json::from_slice::<u64>(payload) {
                Ok(seconds) => *lock(&self.epoch) = Some((seconds, Instant::now())),
                Err(err) => warn!("bad epoch payload: {err}"),
            },
            TOPIC_SERVER_SCHEDULE => *lock(&self.schedule) = Some(payload.to_vec()),
            TOPIC_SERVER_FORECAST => *lock(&self.forecast) = Some(payload.to_vec()),
            TOPIC_SERVER_OVERRIDE => *lock(&self.override_f) = Some(payload.to_vec()),
            _ => debug!("unhandled topic {topic}"),
        }
    }

    fn reply(&self, request: Request) -> Option<Reply> {
        match request {
            Request::Epoch => {
                let (seconds, received) = (*lock(&self.epoch))?;
                Some(Reply::Epoch(seconds + received.elapsed().as_secs()))
            }
            Request::Schedule => {
                let raw = lock(&self.schedule).clone()?;
                Schedule::from_json(&raw)
                    .map_err(|err| warn!("bad schedule payload: {err}"))
                    .ok()
                    .map(Reply::Schedule)
            }
            Request::Forecast => {
                let raw = lock(&self.forecast).clone()?;
                serde_json::from_slice::<Forecast>(&raw)
                    .map_err(|err| warn!("bad forecast payload: {err}"))
                    .ok()
                    .map(Reply::Forecast)
            }
            Request::TemporaryOverride => {
                let raw = lock(&self.override_f).clone()?;
                serde_json::from_slice::<f32>(&raw)
                    .map_err(|err| warn!("bad override payload: {err}"))
                    .ok()
                    .map(Reply::TemporaryOverride)
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub async fn subscribe_topics(mqtt: &AsyncClient) -> anyhow::Result<()> {
    let topics = [
        TOPIC_SERVER_NOTIFY,
        TOPIC_SERVER_ANNOUNCE,
        TOPIC_SERVER_EPOCH,
        TOPIC_SERVER_SCHEDULE,
        TOPIC_SERVER_FORECAST,
        TOPIC_SERVER_OVERRIDE,
    ];

    for topic in topics {
        mqtt.subscribe(topic, QoS::AtMostOnce).await?;
    }
    Ok(())
}

pub fn spawn_mqtt_loop(cache: Arc<ServerCache>, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if message.payload.len() > MAX_MQTT_PAYLOAD_BYTES {
                        warn!(
                            "dropping oversized MQTT payload on topic {} ({} bytes)",
                            message.topic,
                            message.payload.len()
                        );
                        continue;
                    }
                    cache.store(&message.topic, &message.payload);
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    cache.connected.store(true, Ordering::Relaxed);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    cache.connected.store(false, Ordering::Relaxed);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

pub struct HostMessenger {
    client: AsyncClient,
    cache: Arc<ServerCache>,
}

impl HostMessenger {
    pub fn new(client: AsyncClient, cache: Arc<ServerCache>) -> Self {
        Self { client, cache }
    }
}

impl Messenger for HostMessenger {
    fn is_connected(&self) -> bool {
        self.cache.connected.load(Ordering::Relaxed)
    }

    /// The event loop reconnects on its own; this only reports the link.
    fn connect(&mut self) -> bool {
        self.is_connected()
    }

    fn disconnect(&mut self) {
        if let Err(err) = self.client.try_disconnect() {
            warn!("mqtt disconnect failed: {err}");
        }
        self.cache.connected.store(false, Ordering::Relaxed);
    }

    fn discover_server(&mut self) -> bool {
        self.cache.announced.load(Ordering::Relaxed)
    }

    fn check_inbox(&mut self) -> Option<InboxMessage> {
        lock(&self.cache.inbox).pop_front()
    }

    fn post(&mut self, telemetry: &Telemetry) {
        let body = match serde_json::to_vec(telemetry) {
            Ok(body) => body,
            Err(err) => {
                warn!("telemetry serialization failed: {err}");
                return;
            }
        };
        if let Err(err) = self
            .client
            .try_publish(telemetry.endpoint(), QoS::AtMostOnce, false, body)
        {
            warn!("telemetry publish failed: {err}");
        }
    }

    fn request(&mut self, request: Request) -> Option<Reply> {
        self.cache.reply(request)
    }
}

#[derive(Debug, Clone, Copy)]
enum Level {
    Info,
    Error,
}

type LogLine = heapless::String<64>;

/// Device log: buffered while handlers run, mirrored to tracing and
/// published when the dispatcher goes idle.
pub struct HostLogger {
    client: AsyncClient,
    lines: heapless::Deque<(Level, LogLine), LOG_LINES>,
}

impl HostLogger {
    pub fn new(client: AsyncClient) -> Self {
        Self {
            client,
            lines: heapless::Deque::new(),
        }
    }

    fn record(&mut self, level: Level, message: &str) {
        let mut line = LogLine::new();
        for ch in message.chars() {
            if line.push(ch).is_err() {
                break;
            }
        }
        if self.lines.is_full() {
            self.lines.pop_front();
        }
        let _ = self.lines.push_back((level, line));
    }
}

impl Logger for HostLogger {
    fn info(&mut self, message: &str) {
        self.record(Level::Info, message);
    }

    fn error(&mut self, message: &str) {
        self.record(Level::Error, message);
    }

    fn flush(&mut self) {
        while let Some((level, line)) = self.lines.pop_front() {
            match level {
                Level::Info => info!(target: "device", "{line}"),
                Level::Error => error!(target: "device", "{line}"),
            }
            let body = serde_json::json!({
                "level": match level {
                    Level::Info => "info",
                    Level::Error => "error",
                },
                "message": line.as_str(),
            });
            let published = self.client.try_publish(
                TOPIC_DEVICE_LOG,
                QoS::AtMostOnce,
                false,
                body.to_string(),
            );
            if let Err(err) = published {
                debug!("device log publish failed: {err}");
            }
        }
    }
}
