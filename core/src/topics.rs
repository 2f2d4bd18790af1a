pub const TOPIC_SERVER_NOTIFY: &str = "thermostat/server/notify";
pub const TOPIC_SERVER_ANNOUNCE: &str = "thermostat/server/announce";
pub const TOPIC_SERVER_EPOCH: &str = "thermostat/server/epoch";
pub const TOPIC_SERVER_SCHEDULE: &str = "thermostat/server/schedule";
pub const TOPIC_SERVER_FORECAST: &str = "thermostat/server/forecast";
pub const TOPIC_SERVER_OVERRIDE: &str = "thermostat/server/override";

pub const TOPIC_TELEMETRY_TEMPERATURE: &str = "thermostat/telemetry/temperature";
pub const TOPIC_TELEMETRY_STATS: &str = "thermostat/telemetry/stats";
pub const TOPIC_TELEMETRY_MOTION: &str = "thermostat/telemetry/motion";
pub const TOPIC_TELEMETRY_RUNTIME: &str = "thermostat/telemetry/runtime";
pub const TOPIC_TELEMETRY_EQUIPMENT: &str = "thermostat/telemetry/equipment";

pub const TOPIC_DEVICE_LOG: &str = "thermostat/device/log";
