//! Shapes exchanged with the messaging collaborator.

use serde::Serialize;

use crate::{
    schedule::Schedule,
    topics::{
        TOPIC_TELEMETRY_EQUIPMENT, TOPIC_TELEMETRY_MOTION, TOPIC_TELEMETRY_RUNTIME,
        TOPIC_TELEMETRY_STATS, TOPIC_TELEMETRY_TEMPERATURE,
    },
    types::Forecast,
};

/// Notification kinds the server can leave in the device inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboxMessage {
    TemporaryOverride,
    ScheduleUpdated,
    ServerAnnounce,
}

impl InboxMessage {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "temporary" | "override" => Some(Self::TemporaryOverride),
            "schedule" | "schedule-updated" => Some(Self::ScheduleUpdated),
            "announce" | "server-up" => Some(Self::ServerAnnounce),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Epoch,
    Schedule,
    Forecast,
    TemporaryOverride,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Epoch(u64),
    Schedule(Schedule),
    Forecast(Forecast),
    TemporaryOverride(f32),
}

/// Fire-and-forget telemetry posted to the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Telemetry {
    Temperature {
        temperature: f32,
        humidity: f32,
    },
    Stats {
        target: f32,
        lower: f32,
        upper: f32,
    },
    Motion {
        motion: u8,
    },
    Runtime {
        #[serde(rename = "runtimeMin")]
        runtime_min: u64,
    },
    Equipment {
        state: &'static str,
    },
}

impl Telemetry {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Temperature { .. } => TOPIC_TELEMETRY_TEMPERATURE,
            Self::Stats { .. } => TOPIC_TELEMETRY_STATS,
            Self::Motion { .. } => TOPIC_TELEMETRY_MOTION,
            Self::Runtime { .. } => TOPIC_TELEMETRY_RUNTIME,
            Self::Equipment { .. } => TOPIC_TELEMETRY_EQUIPMENT,
        }
    }
}
