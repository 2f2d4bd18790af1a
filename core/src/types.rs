use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};

use crate::schedule::DayOfWeek;

/// One validated sensor sample, rounded to a tenth of a degree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorReading {
    #[serde(rename = "temperature")]
    pub temperature_f: f32,
    pub humidity: f32,
}

impl SensorReading {
    pub fn new(temperature_f: f32, humidity: f32) -> Self {
        Self {
            temperature_f: (temperature_f * 10.0).round() / 10.0,
            humidity: (humidity * 10.0).round() / 10.0,
        }
    }
}

/// Calendar fields copied from the RTC on each sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSnapshot {
    pub year: i32,
    /// 1..=12
    pub month: u8,
    /// 1..=31
    pub day_of_month: u8,
    /// 1..=366
    pub day_of_year: u16,
    pub weekday: DayOfWeek,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl ClockSnapshot {
    pub fn from_datetime<T: Datelike + Timelike>(now: &T) -> Self {
        Self {
            year: now.year(),
            month: now.month() as u8,
            day_of_month: now.day() as u8,
            day_of_year: now.ordinal() as u16,
            weekday: DayOfWeek::from_chrono(now.weekday()),
            hour: now.hour() as u8,
            minute: now.minute() as u8,
            second: now.second() as u8,
        }
    }

    pub fn minute_of_day(&self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquipmentState {
    Idle,
    Heating,
    Cooling,
    FanOnly,
}

impl EquipmentState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Heating => "HEATING",
            Self::Cooling => "COOLING",
            Self::FanOnly => "FAN_ONLY",
        }
    }

    pub fn outputs(self) -> Outputs {
        match self {
            Self::Idle => Outputs::OFF,
            Self::Heating => Outputs {
                heat: true,
                cool: false,
                fan: true,
            },
            Self::Cooling => Outputs {
                heat: false,
                cool: true,
                fan: true,
            },
            Self::FanOnly => Outputs {
                heat: false,
                cool: false,
                fan: true,
            },
        }
    }
}

/// Relay levels driven to the equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Outputs {
    pub heat: bool,
    pub cool: bool,
    pub fan: bool,
}

impl Outputs {
    pub const OFF: Self = Self {
        heat: false,
        cool: false,
        fan: false,
    };
}

/// Equipment control path exercised by the self-test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Heat,
    Cool,
    Fan,
}

impl Channel {
    pub const SELF_TEST_SEQUENCE: [Channel; 3] = [Channel::Heat, Channel::Cool, Channel::Fan];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heat => "heat",
            Self::Cool => "cool",
            Self::Fan => "fan",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfTestState {
    Idle,
    Running,
    Passed,
    Failed,
}

impl SelfTestState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeatherCondition {
    Clear,
    Cloudy,
    Rain,
    Snow,
    Storm,
    Fog,
}

impl WeatherCondition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::Cloudy => "Cloudy",
            Self::Rain => "Rain",
            Self::Snow => "Snow",
            Self::Storm => "Storm",
            Self::Fog => "Fog",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub hour: u8,
    #[serde(rename = "temperature")]
    pub temperature_f: f32,
    pub condition: WeatherCondition,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Forecast {
    pub hourly: heapless::Vec<HourlyForecast, 24>,
}

impl Forecast {
    pub fn at_hour(&self, hour: u8) -> Option<&HourlyForecast> {
        self.hourly
            .iter()
            .filter(|entry| entry.hour <= hour)
            .max_by_key(|entry| entry.hour)
    }

    pub fn high_low(&self) -> Option<(f32, f32)> {
        let mut temps = self.hourly.iter().map(|entry| entry.temperature_f);
        let first = temps.next()?;
        Some(temps.fold((first, first), |(high, low), t| (high.max(t), low.min(t))))
    }
}
