use serde::{Deserialize, Serialize};

use crate::history::Filter;

/// What runs when the band is exceeded on the warm side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoolingEquipment {
    Compressor,
    FanOnly,
}

/// Whether comfort control keeps driving the relays while a self-test runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelfTestPolicy {
    RunAlongside,
    PauseEquipment,
}

/// Compiled limits and policies. Not editable from the menu.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermostatConfig {
    pub min_temp_f: f32,
    pub max_temp_f: f32,
    pub temp_step_f: f32,
    pub min_valid_temp_f: f32,
    pub max_valid_temp_f: f32,
    pub min_sample_period_secs: u32,
    pub max_sample_period_secs: u32,
    pub sample_period_step_secs: u32,
    pub min_screen_timeout_secs: u32,
    pub max_screen_timeout_secs: u32,
    pub screen_timeout_step_secs: u32,
    pub smoothing_window: usize,
    pub cooling: CoolingEquipment,
    pub self_test_policy: SelfTestPolicy,
    pub max_override_minutes: u32,
    pub default_target_f: f32,
    pub default_band_f: f32,
    pub default_sample_period_secs: u32,
    pub default_screen_timeout_secs: u32,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            min_temp_f: 45.0,
            max_temp_f: 90.0,
            temp_step_f: 0.5,
            min_valid_temp_f: -40.0,
            max_valid_temp_f: 150.0,
            min_sample_period_secs: 5,
            max_sample_period_secs: 600,
            sample_period_step_secs: 5,
            min_screen_timeout_secs: 10,
            max_screen_timeout_secs: 600,
            screen_timeout_step_secs: 5,
            smoothing_window: 5,
            cooling: CoolingEquipment::Compressor,
            self_test_policy: SelfTestPolicy::RunAlongside,
            max_override_minutes: 240,
            default_target_f: 70.0,
            default_band_f: 2.0,
            default_sample_period_secs: 30,
            default_screen_timeout_secs: 30,
        }
    }
}

impl ThermostatConfig {
    /// Repair a loaded config so every range is ordered, every step moves
    /// and the smoothing window holds at least one sample. Non-finite values
    /// fall back to the compiled defaults.
    pub fn sanitize(&mut self) {
        let defaults = Self::default();

        order_f32(
            (&mut self.min_temp_f, &mut self.max_temp_f),
            (defaults.min_temp_f, defaults.max_temp_f),
        );
        order_f32(
            (&mut self.min_valid_temp_f, &mut self.max_valid_temp_f),
            (defaults.min_valid_temp_f, defaults.max_valid_temp_f),
        );
        if !(self.temp_step_f.is_finite() && self.temp_step_f > 0.0) {
            self.temp_step_f = defaults.temp_step_f;
        }

        self.min_sample_period_secs = self.min_sample_period_secs.max(1);
        order_u32(&mut self.min_sample_period_secs, &mut self.max_sample_period_secs);
        self.sample_period_step_secs = self.sample_period_step_secs.max(1);

        self.min_screen_timeout_secs = self.min_screen_timeout_secs.max(1);
        order_u32(&mut self.min_screen_timeout_secs, &mut self.max_screen_timeout_secs);
        self.screen_timeout_step_secs = self.screen_timeout_step_secs.max(1);

        self.smoothing_window = self.smoothing_window.max(1);
        self.max_override_minutes = self.max_override_minutes.max(1);

        self.default_target_f = finite_or(self.default_target_f, defaults.default_target_f);
        if !(self.default_band_f.is_finite() && self.default_band_f >= 0.0) {
            self.default_band_f = defaults.default_band_f;
        }
    }
}

fn order_f32((min, max): (&mut f32, &mut f32), fallback: (f32, f32)) {
    if !min.is_finite() || !max.is_finite() {
        (*min, *max) = fallback;
    } else if *min > *max {
        core::mem::swap(min, max);
    }
}

fn order_u32(min: &mut u32, max: &mut u32) {
    if *min > *max {
        core::mem::swap(min, max);
    }
}

/// User-adjustable settings. Rebuilt from compiled defaults at startup.
///
/// Invariant: `lower_threshold_f <= target_temp_f <= upper_threshold_f`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "targetTemp")]
    pub target_temp_f: f32,
    #[serde(rename = "lowerThreshold")]
    pub lower_threshold_f: f32,
    #[serde(rename = "upperThreshold")]
    pub upper_threshold_f: f32,
    #[serde(rename = "samplePeriodSecs")]
    pub sample_period_secs: u32,
    #[serde(rename = "screenTimeoutSecs")]
    pub screen_timeout_secs: u32,
    pub filter: Filter,
}

impl Settings {
    pub fn from_config(config: &ThermostatConfig) -> Self {
        let mut settings = Self {
            target_temp_f: config.default_target_f,
            lower_threshold_f: config.default_target_f - config.default_band_f,
            upper_threshold_f: config.default_target_f + config.default_band_f,
            sample_period_secs: config.default_sample_period_secs,
            screen_timeout_secs: config.default_screen_timeout_secs,
            filter: Filter::Average,
        };
        settings.sanitize(config);
        settings
    }

    /// Clamp every field into its configured range and restore the band
    /// ordering. Used on every remote ingest.
    pub fn sanitize(&mut self, config: &ThermostatConfig) {
        let (min, max) = (config.min_temp_f, config.max_temp_f);
        self.target_temp_f =
            finite_or(self.target_temp_f, config.default_target_f).clamp(min, max);
        self.lower_threshold_f = finite_or(self.lower_threshold_f, self.target_temp_f)
            .clamp(min, max)
            .min(self.target_temp_f);
        self.upper_threshold_f = finite_or(self.upper_threshold_f, self.target_temp_f)
            .clamp(min, max)
            .max(self.target_temp_f);

        self.sample_period_secs = self
            .sample_period_secs
            .clamp(config.min_sample_period_secs, config.max_sample_period_secs);
        self.screen_timeout_secs = self
            .screen_timeout_secs
            .clamp(config.min_screen_timeout_secs, config.max_screen_timeout_secs);
    }

    /// Apply a remote band, clamped. Returns whether anything changed.
    pub fn apply_band(
        &mut self,
        target_f: f32,
        lower_f: f32,
        upper_f: f32,
        config: &ThermostatConfig,
    ) -> bool {
        let before = self.clone();
        self.target_temp_f = target_f;
        self.lower_threshold_f = lower_f;
        self.upper_threshold_f = upper_f;
        self.sanitize(config);
        *self != before
    }

    /// Move the target and shift both thresholds by the same amount.
    pub fn retarget(&mut self, target_f: f32, config: &ThermostatConfig) -> bool {
        let below = self.target_temp_f - self.lower_threshold_f;
        let above = self.upper_threshold_f - self.target_temp_f;
        self.apply_band(target_f, target_f - below, target_f + above, config)
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
