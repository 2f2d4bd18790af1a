//! Simulated peripherals for the host build.

use std::{
    sync::{atomic::Ordering, Arc, PoisonError},
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};

use thermostat_core::{
    Board, Channel, Clock, ClockSnapshot, Display, Equipment, EventQueue, Frame, Logger,
    Messenger, Outputs, Platform, Sensor, SensorError,
};

use super::{
    config::RoomConfig,
    mqtt::{HostLogger, HostMessenger},
    HostShared,
};

/// °F per minute.
const HEAT_RATE: f32 = 0.6;
const COOL_RATE: f32 = 0.5;
const FAN_RATE: f32 = 0.15;
/// Fraction of the indoor/outdoor gap closed per minute.
const LEAK_RATE: f32 = 0.01;

/// A room whose temperature follows the relays and leaks toward outdoors.
pub struct SimSensor {
    shared: Arc<HostShared>,
    temperature_f: f32,
    outdoor_f: f32,
    humidity: f32,
    last_read: Instant,
}

impl SimSensor {
    pub fn new(room: &RoomConfig, shared: Arc<HostShared>) -> Self {
        Self {
            shared,
            temperature_f: room.initial_temp_f,
            outdoor_f: room.outdoor_temp_f,
            humidity: room.humidity,
            last_read: Instant::now(),
        }
    }

    fn advance(&mut self, elapsed: Duration, outputs: Outputs) {
        let minutes = elapsed.as_secs_f32() / 60.0;
        let mut delta = (self.outdoor_f - self.temperature_f) * LEAK_RATE;
        if outputs.heat {
            delta += HEAT_RATE;
        } else if outputs.cool {
            delta -= COOL_RATE;
        } else if outputs.fan {
            delta -= FAN_RATE;
        }
        self.temperature_f += delta * minutes;
    }
}

impl Sensor for SimSensor {
    fn read(&mut self) -> Result<(f32, f32), SensorError> {
        let now = Instant::now();
        let outputs = self.shared.outputs();
        self.advance(now.duration_since(self.last_read), outputs);
        self.last_read = now;

        if !self.temperature_f.is_finite() {
            return Err(SensorError::NotFinite);
        }
        Ok((self.temperature_f, self.humidity))
    }
}

/// Wall clock that reports nothing until an epoch sync arrives, like an
/// RTC after a cold start.
pub struct SimClock {
    timezone: Tz,
    offset_secs: Option<i64>,
    boot: Instant,
}

impl SimClock {
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            offset_secs: None,
            boot: Instant::now(),
        }
    }

    fn system_secs() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|since| since.as_secs() as i64)
            .unwrap_or(0)
    }
}

impl Clock for SimClock {
    fn epoch(&self) -> Option<u64> {
        let offset = self.offset_secs?;
        u64::try_from(Self::system_secs() + offset).ok()
    }

    fn set_epoch(&mut self, seconds: u64) {
        let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
        self.offset_secs = Some(seconds.saturating_sub(Self::system_secs()));
    }

    fn now(&self) -> Option<ClockSnapshot> {
        let epoch = i64::try_from(self.epoch()?).ok()?;
        let utc = DateTime::<Utc>::from_timestamp(epoch, 0)?;
        Some(ClockSnapshot::from_datetime(&utc.with_timezone(&self.timezone)))
    }

    fn uptime_ms(&self) -> u64 {
        self.boot
            .elapsed()
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }
}

/// Keeps the last frame for the front panel.
pub struct SimDisplay {
    shared: Arc<HostShared>,
}

impl SimDisplay {
    pub fn new(shared: Arc<HostShared>) -> Self {
        Self { shared }
    }
}

impl Display for SimDisplay {
    fn draw(&mut self, frame: &Frame) {
        *self
            .shared
            .frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(frame.clone());
    }

    fn power(&mut self, on: bool) {
        debug!(on, "display power");
        self.shared.screen_on.store(on, Ordering::Relaxed);
    }
}

pub struct SimEquipment {
    shared: Arc<HostShared>,
}

impl SimEquipment {
    pub fn new(shared: Arc<HostShared>) -> Self {
        Self { shared }
    }
}

impl Equipment for SimEquipment {
    fn apply(&mut self, outputs: Outputs) {
        info!(
            heat = outputs.heat,
            cool = outputs.cool,
            fan = outputs.fan,
            "relays"
        );
        *self
            .shared
            .outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = outputs;
    }

    fn probe(&mut self, channel: Channel) -> bool {
        info!("probing {} relay", channel.as_str());
        true
    }
}

pub struct SimPlatform {
    shared: Arc<HostShared>,
}

impl SimPlatform {
    pub fn new(shared: Arc<HostShared>) -> Self {
        Self { shared }
    }

    fn arm_idle(&self, deadline: Option<Instant>) {
        *self
            .shared
            .idle_deadline
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = deadline;
        self.shared.idle_changed.notify_one();
    }
}

impl Platform for SimPlatform {
    fn motion_sensed(&self) -> bool {
        self.shared.motion.load(Ordering::Relaxed)
    }

    fn set_sample_period(&mut self, seconds: u32) {
        self.shared
            .sample_period_secs
            .store(seconds, Ordering::Relaxed);
        self.shared.sample_period_changed.notify_one();
    }

    fn start_idle_timer(&mut self, seconds: u32) {
        self.arm_idle(Some(Instant::now() + Duration::from_secs(u64::from(seconds))));
    }

    fn stop_idle_timer(&mut self) {
        self.arm_idle(None);
    }

    fn wait_for_interrupt(&mut self, queue: &EventQueue) {
        self.shared.line.wait(queue);
    }
}

pub struct HostBoard {
    pub sensor: SimSensor,
    pub clock: SimClock,
    pub display: SimDisplay,
    pub messenger: HostMessenger,
    pub logger: HostLogger,
    pub equipment: SimEquipment,
    pub platform: SimPlatform,
}

impl Board for HostBoard {
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
