//! Collaborator ports: the boundary between the coordination core and the
//! device it runs on.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Dispatcher / handlers
//! ```
//!
//! Every method must return promptly. Handlers run with interrupts
//! serialized against the drain loop, so nothing here may wait on I/O.

use crate::{
    error::SensorError,
    events::EventQueue,
    messages::{InboxMessage, Reply, Request, Telemetry},
    menu::Frame,
    types::{Channel, ClockSnapshot, Outputs},
};

pub trait Sensor {
    /// Raw `(temperature °F, humidity %)`.
    fn read(&mut self) -> Result<(f32, f32), SensorError>;
}

pub trait Clock {
    /// Seconds since the Unix epoch, or `None` while the RTC is unset.
    fn epoch(&self) -> Option<u64>;

    fn set_epoch(&mut self, seconds: u64);

    /// Local calendar fields, or `None` while the RTC is unset.
    fn now(&self) -> Option<ClockSnapshot>;

    /// Monotonic milliseconds since boot.
    fn uptime_ms(&self) -> u64;
}

pub trait Display {
    fn draw(&mut self, frame: &Frame);

    fn power(&mut self, on: bool);
}

pub trait Messenger {
    fn is_connected(&self) -> bool;

    /// Start or confirm the wireless link. Must not block.
    fn connect(&mut self) -> bool;

    fn disconnect(&mut self);

    /// Locate the server on the network.
    fn discover_server(&mut self) -> bool;

    fn check_inbox(&mut self) -> Option<InboxMessage>;

    /// Best-effort, fire-and-forget.
    fn post(&mut self, telemetry: &Telemetry);

    fn request(&mut self, request: Request) -> Option<Reply>;
}

/// User-visible device log, forwarded off-device on `flush`.
pub trait Logger {
    fn info(&mut self, message: &str);

    fn error(&mut self, message: &str);

    fn flush(&mut self);
}

pub trait Equipment {
    fn apply(&mut self, outputs: Outputs);

    /// Exercise one control path and report whether it responded.
    fn probe(&mut self, channel: Channel) -> bool;
}

/// Timers, input lines and the low-power wait.
pub trait Platform {
    /// Current level of the motion sensor line.
    fn motion_sensed(&self) -> bool;

    fn set_sample_period(&mut self, seconds: u32);

    /// (Re)arm the one-shot idle timer that raises `NoMotion`.
    fn start_idle_timer(&mut self, seconds: u32);

    fn stop_idle_timer(&mut self);

    /// Park until an interrupt is raised. Must return at once if one was
    /// raised after `queue` was last observed empty.
    fn wait_for_interrupt(&mut self, queue: &EventQueue);
}

/// Everything the dispatcher talks to.
pub trait Board {
    fn sensor(&mut self) -> &mut dyn Sensor;
    fn clock(&mut self) -> &mut dyn Clock;
    fn display(&mut self) -> &mut dyn Display;
    fn messenger(&mut self) -> &mut dyn Messenger;
    fn logger(&mut self) -> &mut dyn Logger;
    fn equipment(&mut self) -> &mut dyn Equipment;
    fn platform(&mut self) -> &mut dyn Platform;
}
