//! Daily forecast cache and the hourly entry shown on the weather view.

use crate::{
    schedule::DayOfWeek,
    types::{Forecast, HourlyForecast},
};

#[derive(Debug, Clone, Default)]
pub struct WeatherCache {
    forecast: Option<Forecast>,
    fetched_on: Option<DayOfWeek>,
    current: Option<HourlyForecast>,
}

impl WeatherCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// True until a forecast has been stored on `weekday`.
    pub fn is_new_day(&self, weekday: DayOfWeek) -> bool {
        self.fetched_on != Some(weekday)
    }

    pub fn store(&mut self, forecast: Forecast, weekday: DayOfWeek, hour: u8) {
        self.current = forecast.at_hour(hour).copied();
        self.forecast = Some(forecast);
        self.fetched_on = Some(weekday);
    }

    pub fn set_current_hour(&mut self, hour: u8) {
        self.current = self
            .forecast
            .as_ref()
            .and_then(|forecast| forecast.at_hour(hour))
            .copied();
    }

    pub fn current(&self) -> Option<HourlyForecast> {
        self.current
    }

    pub fn high_low(&self) -> Option<(f32, f32)> {
        self.forecast.as_ref().and_then(Forecast::high_low)
    }
}
