pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod history;
pub mod menu;
pub mod messages;
pub mod network;
pub mod ports;
pub mod schedule;
pub mod thermostat;
pub mod topics;
pub mod types;
pub mod weather;

pub use config::{CoolingEquipment, SelfTestPolicy, Settings, ThermostatConfig};
pub use dispatcher::{Context, Dispatcher};
pub use error::{QueueFull, SensorError};
pub use events::{Event, EventQueue, EVENT_QUEUE_CAP};
pub use history::{Filter, HistoryBuffer, HISTORY_CAPACITY};
pub use menu::{Frame, MenuNavigator, StatusSnapshot, View};
pub use messages::{InboxMessage, Reply, Request, Telemetry};
pub use network::{NetworkState, NetworkSync};
pub use ports::{Board, Clock, Display, Equipment, Logger, Messenger, Platform, Sensor};
pub use schedule::{DayOfWeek, Schedule, ScheduleAction, ScheduleEntry};
pub use thermostat::{SelfTestReport, TemporaryOverride, ThermostatController};
pub use topics::*;
pub use types::{
    Channel, ClockSnapshot, EquipmentState, Forecast, HourlyForecast, Outputs, SelfTestState,
    SensorReading, WeatherCondition,
};
pub use weather::WeatherCache;
