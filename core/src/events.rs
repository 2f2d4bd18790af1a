//! Event codes and the interrupt-safe FIFO that carries them.
//!
//! Events are produced by:
//! - timer interrupts (sample period, RTC tick, screen idle timeout)
//! - input interrupts (rotary encoder, push button, motion sensor)
//! - handlers, as follow-up events of the one being serviced
//!
//! and consumed one at a time, oldest first, by the dispatcher.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Timer ISR    │────▶│              │     │              │
//! │ Input ISR    │────▶│  EventQueue  │────▶│  Dispatcher  │
//! │ Handlers     │────▶│  (u8 codes)  │     │  (consumer)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! Events carry no payload. Each handler reads the shared state it needs
//! from the dispatcher context when it runs.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Deque;

use crate::error::QueueFull;

/// Number of pending codes the queue can hold.
///
/// The deepest cascade (a sample cycle with equipment change and a running
/// self-test) adds seven events; network requests are de-duplicated, so 64
/// leaves ample room for concurrent producers.
pub const EVENT_QUEUE_CAP: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Event {
    // ── Sampling and control ──────────────────────────────
    /// Sample period timer fired.
    SampleAir = 0,
    /// Periodic RTC sync tick.
    RtcUpdate = 1,
    /// Sample period setting changed; reprogram the timer.
    UpdateSamplePeriod = 2,
    /// Smoothing filter setting changed.
    SetFilter = 3,

    // ── Occupancy and screen timeout ──────────────────────
    MotionDetected = 10,
    /// Idle timer expired.
    NoMotion = 11,
    StartScreenTimeout = 12,

    // ── Network sync ──────────────────────────────────────
    GetEpoch = 20,
    CheckInbox = 21,
    UpdateSchedule = 22,
    GetForecast = 23,
    GetTemporaryOverride = 24,
    StartTemporaryOverride = 25,
    ClearTemporaryOverride = 26,
    ConnectToWifi = 27,
    ConnectToServer = 28,
    DisconnectWifi = 29,

    // ── Telemetry ─────────────────────────────────────────
    SendServerTemperature = 30,
    SendServerStats = 31,
    SendServerMotion = 32,
    SendServerRuntime = 33,
    SendServerEquipmentState = 34,

    // ── Display and menu input ────────────────────────────
    OledOn = 40,
    OledOff = 41,
    OledUpdate = 42,
    OledNextMenu = 43,
    OledPrevMenu = 44,
    OledEditMenu = 45,
    OledRotaryCcw = 46,
    OledRotaryCw = 47,

    // ── Diagnostics ───────────────────────────────────────
    SelfTest = 50,
    SelfTestDone = 51,
}

impl Event {
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decode a raw queue code. Unknown codes yield `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        let event = match code {
            0 => Self::SampleAir,
            1 => Self::RtcUpdate,
            2 => Self::UpdateSamplePeriod,
            3 => Self::SetFilter,
            10 => Self::MotionDetected,
            11 => Self::NoMotion,
            12 => Self::StartScreenTimeout,
            20 => Self::GetEpoch,
            21 => Self::CheckInbox,
            22 => Self::UpdateSchedule,
            23 => Self::GetForecast,
            24 => Self::GetTemporaryOverride,
            25 => Self::StartTemporaryOverride,
            26 => Self::ClearTemporaryOverride,
            27 => Self::ConnectToWifi,
            28 => Self::ConnectToServer,
            29 => Self::DisconnectWifi,
            30 => Self::SendServerTemperature,
            31 => Self::SendServerStats,
            32 => Self::SendServerMotion,
            33 => Self::SendServerRuntime,
            34 => Self::SendServerEquipmentState,
            40 => Self::OledOn,
            41 => Self::OledOff,
            42 => Self::OledUpdate,
            43 => Self::OledNextMenu,
            44 => Self::OledPrevMenu,
            45 => Self::OledEditMenu,
            46 => Self::OledRotaryCcw,
            47 => Self::OledRotaryCw,
            50 => Self::SelfTest,
            51 => Self::SelfTestDone,
            _ => return None,
        };
        Some(event)
    }
}

struct Slots {
    codes: Deque<u8, EVENT_QUEUE_CAP>,
    overflows: u32,
}

/// Bounded FIFO of event codes.
///
/// `push` takes a critical section, so it may be called from interrupt
/// context as well as from handlers. The dispatcher is the only consumer.
pub struct EventQueue {
    slots: Mutex<RefCell<Slots>>,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(RefCell::new(Slots {
                codes: Deque::new(),
                overflows: 0,
            })),
        }
    }

    pub fn push(&self, event: Event) -> Result<(), QueueFull> {
        self.push_code(event.code())
    }

    /// Push a raw code, as read from an input register or a wire.
    pub fn push_code(&self, code: u8) -> Result<(), QueueFull> {
        critical_section::with(|cs| {
            let mut slots = self.slots.borrow_ref_mut(cs);
            if slots.codes.push_back(code).is_err() {
                slots.overflows = slots.overflows.saturating_add(1);
                return Err(QueueFull { code });
            }
            Ok(())
        })
    }

    pub fn pop(&self) -> Option<u8> {
        critical_section::with(|cs| self.slots.borrow_ref_mut(cs).codes.pop_front())
    }

    pub fn is_empty(&self) -> bool {
        critical_section::with(|cs| self.slots.borrow_ref(cs).codes.is_empty())
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.slots.borrow_ref(cs).codes.len())
    }

    /// Pushes rejected because the queue was full, since startup.
    pub fn overflows(&self) -> u32 {
        critical_section::with(|cs| self.slots.borrow_ref(cs).overflows)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
