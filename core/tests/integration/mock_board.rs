//! Recording collaborators for dispatcher tests.
//!
//! Each mock keeps a history of the calls it received so tests can assert
//! on side effects without any real hardware or network.

use std::collections::VecDeque;

use thermostat_core::{
    menu::Frame, Board, Channel, Clock, ClockSnapshot, Display, Equipment, EventQueue, Forecast,
    InboxMessage, Logger, Messenger, Outputs, Platform, Reply, Request, Schedule, Sensor,
    SensorError, Telemetry,
};

// ── Sensor ────────────────────────────────────────────────────

pub struct MockSensor {
    pub next: Result<(f32, f32), SensorError>,
    pub reads: usize,
}

impl Sensor for MockSensor {
    fn read(&mut self) -> Result<(f32, f32), SensorError> {
        self.reads += 1;
        self.next
    }
}

// ── Clock ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockClock {
    pub epoch: Option<u64>,
    pub now: Option<ClockSnapshot>,
    pub uptime_ms: u64,
}

impl Clock for MockClock {
    fn epoch(&self) -> Option<u64> {
        self.epoch
    }

    fn set_epoch(&mut self, seconds: u64) {
        self.epoch = Some(seconds);
    }

    fn now(&self) -> Option<ClockSnapshot> {
        self.now
    }

    fn uptime_ms(&self) -> u64 {
        self.uptime_ms
    }
}

// ── Display ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockDisplay {
    pub powered: bool,
    pub frames: Vec<Frame>,
}

#[allow(dead_code)]
impl MockDisplay {
    pub fn last_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }
}

impl Display for MockDisplay {
    fn draw(&mut self, frame: &Frame) {
        self.frames.push(frame.clone());
    }

    fn power(&mut self, on: bool) {
        self.powered = on;
    }
}

// ── Messenger ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockMessenger {
    pub link: bool,
    pub server: bool,
    pub inbox: VecDeque<InboxMessage>,
    pub epoch: Option<u64>,
    pub schedule: Option<Schedule>,
    pub forecast: Option<Forecast>,
    pub override_f: Option<f32>,
    pub posted: Vec<Telemetry>,
    pub requests: Vec<Request>,
}

impl Messenger for MockMessenger {
    fn is_connected(&self) -> bool {
        self.link
    }

    fn connect(&mut self) -> bool {
        self.link
    }

    fn disconnect(&mut self) {
        self.link = false;
    }

    fn discover_server(&mut self) -> bool {
        self.server
    }

    fn check_inbox(&mut self) -> Option<InboxMessage> {
        self.inbox.pop_front()
    }

    fn post(&mut self, telemetry: &Telemetry) {
        self.posted.push(telemetry.clone());
    }

    fn request(&mut self, request: Request) -> Option<Reply> {
        self.requests.push(request);
        match request {
            Request::Epoch => self.epoch.map(Reply::Epoch),
            Request::Schedule => self.schedule.clone().map(Reply::Schedule),
            Request::Forecast => self.forecast.clone().map(Reply::Forecast),
            Request::TemporaryOverride => self.override_f.map(Reply::TemporaryOverride),
        }
    }
}

// ── Logger ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockLogger {
    pub infos: Vec<String>,
    pub errors: Vec<String>,
    pub flushes: usize,
}

#[allow(dead_code)]
impl MockLogger {
    pub fn count(&self, message: &str) -> usize {
        self.infos
            .iter()
            .chain(self.errors.iter())
            .filter(|line| line.as_str() == message)
            .count()
    }
}

impl Logger for MockLogger {
    fn info(&mut self, message: &str) {
        self.infos.push(message.to_owned());
    }

    fn error(&mut self, message: &str) {
        self.errors.push(message.to_owned());
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}

// ── Equipment ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockEquipment {
    pub applied: Vec<Outputs>,
    pub probes: Vec<Channel>,
    pub broken: Option<Channel>,
}

impl Equipment for MockEquipment {
    fn apply(&mut self, outputs: Outputs) {
        self.applied.push(outputs);
    }

    fn probe(&mut self, channel: Channel) -> bool {
        self.probes.push(channel);
        self.broken != Some(channel)
    }
}

// ── Platform ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MockPlatform {
    pub motion: bool,
    pub sample_period: Option<u32>,
    pub idle_timer: Option<u32>,
    pub idle_timer_stops: usize,
    /// Whether the queue was empty at each wait.
    pub waits: Vec<bool>,
}

impl Platform for MockPlatform {
    fn motion_sensed(&self) -> bool {
        self.motion
    }

    fn set_sample_period(&mut self, seconds: u32) {
        self.sample_period = Some(seconds);
    }

    fn start_idle_timer(&mut self, seconds: u32) {
        self.idle_timer = Some(seconds);
    }

    fn stop_idle_timer(&mut self) {
        self.idle_timer = None;
        self.idle_timer_stops += 1;
    }

    fn wait_for_interrupt(&mut self, queue: &EventQueue) {
        self.waits.push(queue.is_empty());
    }
}

// ── Board ─────────────────────────────────────────────────────

pub struct MockBoard {
    pub sensor: MockSensor,
    pub clock: MockClock,
    pub display: MockDisplay,
    pub messenger: MockMessenger,
    pub logger: MockLogger,
    pub equipment: MockEquipment,
    pub platform: MockPlatform,
}

impl MockBoard {
    pub fn new() -> Self {
        Self {
            sensor: MockSensor {
                next: Ok((70.0, 40.0)),
                reads: 0,
            },
            clock: MockClock::default(),
            display: MockDisplay::default(),
            messenger: MockMessenger::default(),
            logger: MockLogger::default(),
            equipment: MockEquipment::default(),
            platform: MockPlatform::default(),
        }
    }
}

impl Default for MockBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl Board for MockBoard {
    fn sensor(&mut self) -> &mut dyn Sensor {
        &mut self.sensor
    }

    fn clock(&mut self) -> &mut dyn Clock {
        &mut self.clock
    }

    fn display(&mut self) -> &mut dyn Display {
        &mut self.display
    }

    fn messenger(&mut self) -> &mut dyn Messenger {
        &mut self.messenger
    }

    fn logger(&mut self) -> &mut dyn Logger {
        &mut self.logger
    }

    fn equipment(&mut self) -> &mut dyn Equipment {
        &mut self.equipment
    }

    fn platform(&mut self) -> &mut dyn Platform {
        &mut self.platform
    }
}
