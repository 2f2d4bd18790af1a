use std::{io::ErrorKind, path::PathBuf};

use serde::{Deserialize, Serialize};
use thermostat_core::ThermostatConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub client_id: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "192.168.1.100".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            client_id: "thermostat-device".to_string(),
        }
    }
}

/// Starting conditions for the simulated room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    pub initial_temp_f: f32,
    pub outdoor_temp_f: f32,
    pub humidity: f32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            initial_temp_f: 66.0,
            outdoor_temp_f: 50.0,
            humidity: 42.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub thermostat: ThermostatConfig,
    pub timezone: String,
    pub network: NetworkConfig,
    pub http_port: u16,
    pub rtc_update_secs: u64,
    pub room: RoomConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            thermostat: ThermostatConfig::default(),
            timezone: "America/Los_Angeles".to_string(),
            network: NetworkConfig::default(),
            http_port: 8080,
            rtc_update_secs: 60,
            room: RoomConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Environment wins over the file for connection settings.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("MQTT_HOST") {
            self.network.mqtt_host = host;
        }
        if let Some(port) = lookup("MQTT_PORT").and_then(|value| value.parse::<u16>().ok()) {
            self.network.mqtt_port = port;
        }
        if let Some(user) = lookup("MQTT_USER") {
            self.network.mqtt_user = user;
        }
        if let Some(pass) = lookup("MQTT_PASS") {
            self.network.mqtt_pass = pass;
        }
        if let Some(port) =
            lookup("CONTROLLER_HTTP_PORT").and_then(|value| value.parse::<u16>().ok())
        {
            self.http_port = port;
        }
    }
}

/// Read-only view of the data directory. Nothing is written back; the
/// device rebuilds its settings at every start.
#[derive(Clone)]
pub struct ConfigStore {
    runtime_path: PathBuf,
}

impl ConfigStore {
    pub fn new() -> Self {
        let data_dir = std::env::var("THERMOSTAT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.thermostat"));

        Self {
            runtime_path: data_dir.join("runtime.json"),
        }
    }

    pub async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let mut runtime = match tokio::fs::read(&self.runtime_path).await {
            Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)?,
            Err(err) if err.kind() == ErrorKind::NotFound => RuntimeConfig::default(),
            Err(err) => return Err(err.into()),
        };
        runtime.thermostat.sanitize();
        Ok(runtime)
    }
}
