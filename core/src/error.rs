use thiserror::Error;

/// Why a sensor sample could not be used.
///
/// A failed read never produces a plausible-looking temperature; callers get
/// one of these instead and skip the dependent computation for the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SensorError {
    #[error("sensor did not respond")]
    NoResponse,
    #[error("sensor returned a non-finite value")]
    NotFinite,
    #[error("temperature {0:.1}F outside plausible range")]
    TemperatureOutOfRange(f32),
    #[error("humidity {0:.1}% outside 0-100")]
    HumidityOutOfRange(f32),
}

/// The event queue had no free slot for `code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event queue full, dropped code {code}")]
pub struct QueueFull {
    pub code: u8,
}
