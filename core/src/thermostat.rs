use crate::{
    config::{CoolingEquipment, SelfTestPolicy, Settings, ThermostatConfig},
    error::SensorError,
    history::HistoryBuffer,
    ports::{Equipment, Sensor},
    schedule::{DayOfWeek, Schedule},
    types::{Channel, ClockSnapshot, EquipmentState, Outputs, SelfTestState, SensorReading},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemporaryOverride {
    pub target_temp_f: f32,
    /// `None` when the clock was unset at start; held until cleared.
    pub expires_epoch: Option<u64>,
}

/// Outcome of a self-test that finished, reported once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfTestReport {
    pub state: SelfTestState,
    pub failed_channel: Option<Channel>,
}

#[derive(Debug, Clone)]
pub struct ThermostatController {
    pub config: ThermostatConfig,

    reading: Option<SensorReading>,
    sensor_fault: Option<SensorError>,
    smoothed_f: Option<f32>,
    equipment: EquipmentState,

    motion_ms: u64,
    runtime_ms: u64,
    run_started_ms: Option<u64>,

    self_test: SelfTestState,
    self_test_step: usize,
    self_test_failed_channel: Option<Channel>,
    self_test_reported: bool,

    schedule: Schedule,
    active_entry: Option<(DayOfWeek, u16)>,
    override_hold: Option<TemporaryOverride>,
}

impl ThermostatController {
    pub fn new(mut config: ThermostatConfig) -> Self {
        config.sanitize();
        Self {
            config,
            reading: None,
            sensor_fault: None,
            smoothed_f: None,
            equipment: EquipmentState::Idle,
            motion_ms: 0,
            runtime_ms: 0,
            run_started_ms: None,
            self_test: SelfTestState::Idle,
            self_test_step: 0,
            self_test_failed_channel: None,
            self_test_reported: false,
            schedule: Schedule::default(),
            active_entry: None,
            override_hold: None,
        }
    }

    /// Last good reading. `None` after a failed read.
    pub fn reading(&self) -> Option<SensorReading> {
        self.reading
    }

    pub fn sensor_fault(&self) -> Option<SensorError> {
        self.sensor_fault
    }

    pub fn smoothed_temp_f(&self) -> Option<f32> {
        self.smoothed_f
    }

    pub fn equipment(&self) -> EquipmentState {
        self.equipment
    }

    pub fn self_test_state(&self) -> SelfTestState {
        self.self_test
    }

    pub fn temporary_override(&self) -> Option<TemporaryOverride> {
        self.override_hold
    }

    pub fn sample_air(&mut self, sensor: &mut dyn Sensor) -> Result<SensorReading, SensorError> {
        let result = sensor
            .read()
            .and_then(|(temp_f, humidity)| self.validate(temp_f, humidity));

        match result {
            Ok(reading) => {
                self.reading = Some(reading);
                self.sensor_fault = None;
            }
            Err(err) => {
                self.reading = None;
                self.sensor_fault = Some(err);
            }
        }
        result
    }

    /// Re-evaluate the equipment from the smoothed history. Returns the new
    /// state when it changed.
    pub fn run_cycle<const N: usize>(
        &mut self,
        history: &HistoryBuffer<N>,
        settings: &Settings,
        equipment: &mut dyn Equipment,
        now_ms: u64,
    ) -> Option<EquipmentState> {
        let smoothed = history.smoothed(settings.filter, self.config.smoothing_window)?;
        self.smoothed_f = Some(smoothed);

        let next = decide(self.equipment, smoothed, settings, self.config.cooling);
        if next == self.equipment {
            return None;
        }

        if let Some(start) = self.run_started_ms.take() {
            self.runtime_ms = self.runtime_ms.saturating_add(now_ms.saturating_sub(start));
        }
        if next != EquipmentState::Idle {
            self.run_started_ms = Some(now_ms);
        }
        self.equipment = next;

        if !self.equipment_paused() {
            equipment.apply(next.outputs());
        }
        Some(next)
    }

    pub fn runtime_ms(&self, now_ms: u64) -> u64 {
        let running = self
            .run_started_ms
            .map(|start| now_ms.saturating_sub(start))
            .unwrap_or(0);
        self.runtime_ms.saturating_add(running)
    }

    pub fn runtime_minutes(&self, now_ms: u64) -> u64 {
        self.runtime_ms(now_ms) / 60_000
    }

    pub fn record_motion(&mut self, now_ms: u64) {
        self.motion_ms = now_ms;
    }

    pub fn idle_for_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.motion_ms)
    }

    /// Begin a self-test. A trigger that arrives while one is running is
    /// ignored and returns `false`.
    pub fn start_self_test(&mut self, equipment: &mut dyn Equipment) -> bool {
        if self.self_test_running() {
            return false;
        }
        self.self_test = SelfTestState::Running;
        self.self_test_step = 0;
        self.self_test_failed_channel = None;
        self.self_test_reported = false;
        if self.config.self_test_policy == SelfTestPolicy::PauseEquipment {
            equipment.apply(Outputs::OFF);
        }
        true
    }

    /// Probe the next channel of a running self-test. Returns the verdict
    /// on the step that finishes it.
    pub fn step_self_test(&mut self, equipment: &mut dyn Equipment) -> Option<SelfTestState> {
        if !self.self_test_running() {
            return None;
        }

        let channel = Channel::SELF_TEST_SEQUENCE[self.self_test_step];
        if !equipment.probe(channel) {
            self.self_test_failed_channel = Some(channel);
            self.finish_self_test(SelfTestState::Failed, equipment);
            return Some(SelfTestState::Failed);
        }

        self.self_test_step += 1;
        if self.self_test_step == Channel::SELF_TEST_SEQUENCE.len() {
            self.finish_self_test(SelfTestState::Passed, equipment);
            return Some(SelfTestState::Passed);
        }
        None
    }

    pub fn self_test_running(&self) -> bool {
        self.self_test == SelfTestState::Running
    }

    /// The verdict of the last finished self-test, at most once per run.
    pub fn take_self_test_report(&mut self) -> Option<SelfTestReport> {
        if !self.self_test.is_terminal() || self.self_test_reported {
            return None;
        }
        self.self_test_reported = true;
        Some(SelfTestReport {
            state: self.self_test,
            failed_channel: self.self_test_failed_channel,
        })
    }

    /// Replace the weekly program and apply its current entry.
    pub fn update_schedule(
        &mut self,
        schedule: Schedule,
        settings: &mut Settings,
        now: Option<&ClockSnapshot>,
    ) -> bool {
        self.schedule = schedule;
        self.active_entry = None;
        self.apply_schedule(settings, now)
    }

    /// Apply the schedule entry in force at `now` if it differs from the
    /// one last applied. A temporary override suppresses this.
    pub fn apply_schedule(&mut self, settings: &mut Settings, now: Option<&ClockSnapshot>) -> bool {
        if self.override_hold.is_some() {
            return false;
        }
        let Some(now) = now else {
            return false;
        };
        let Some(action) = self.schedule.current_action(now) else {
            self.active_entry = None;
            return false;
        };

        let key = (action.day, action.start_minutes);
        if self.active_entry == Some(key) {
            return false;
        }
        self.active_entry = Some(key);
        settings.apply_band(
            action.target_temp_f,
            action.lower_threshold_f,
            action.upper_threshold_f,
            &self.config,
        )
    }

    /// Move the target to `target_f` and hold it until the next schedule
    /// transition or the configured maximum, whichever comes first. The hold
    /// is in place before this returns, so a schedule application queued
    /// behind it cannot undo the new target.
    pub fn start_temporary_override(
        &mut self,
        target_f: f32,
        settings: &mut Settings,
        now_epoch: Option<u64>,
        now: Option<&ClockSnapshot>,
    ) -> bool {
        let changed = settings.retarget(target_f, &self.config);

        let max_secs = u64::from(self.config.max_override_minutes) * 60;
        let hold_secs = now
            .and_then(|now| self.schedule.next_transition_in_secs(now))
            .map_or(max_secs, |until_next| until_next.min(max_secs));

        self.override_hold = Some(TemporaryOverride {
            target_temp_f: settings.target_temp_f,
            expires_epoch: now_epoch.map(|epoch| epoch.saturating_add(hold_secs)),
        });
        changed
    }

    /// Put the held target back into `settings` if something moved it.
    pub fn reassert_temporary_override(&self, settings: &mut Settings) -> bool {
        match self.override_hold {
            Some(hold) => settings.retarget(hold.target_temp_f, &self.config),
            None => false,
        }
    }

    /// Drop the override and fall back to the schedule. Returns whether an
    /// override was active.
    pub fn clear_temporary_override(
        &mut self,
        settings: &mut Settings,
        now: Option<&ClockSnapshot>,
    ) -> bool {
        if self.override_hold.take().is_none() {
            return false;
        }
        self.active_entry = None;
        self.apply_schedule(settings, now);
        true
    }

    pub fn expire_override_if_needed(
        &mut self,
        now_epoch: Option<u64>,
        settings: &mut Settings,
        now: Option<&ClockSnapshot>,
    ) -> bool {
        let expired = match (self.override_hold, now_epoch) {
            (
                Some(TemporaryOverride {
                    expires_epoch: Some(at),
                    ..
                }),
                Some(epoch),
            ) => epoch >= at,
            _ => false,
        };
        expired && self.clear_temporary_override(settings, now)
    }

    fn validate(&self, temp_f: f32, humidity: f32) -> Result<SensorReading, SensorError> {
        if !temp_f.is_finite() || !humidity.is_finite() {
            return Err(SensorError::NotFinite);
        }
        if !(self.config.min_valid_temp_f..=self.config.max_valid_temp_f).contains(&temp_f) {
            return Err(SensorError::TemperatureOutOfRange(temp_f));
        }
        if !(0.0..=100.0).contains(&humidity) {
            return Err(SensorError::HumidityOutOfRange(humidity));
        }
        Ok(SensorReading::new(temp_f, humidity))
    }

    fn equipment_paused(&self) -> bool {
        self.self_test == SelfTestState::Running
            && self.config.self_test_policy == SelfTestPolicy::PauseEquipment
    }

    fn finish_self_test(&mut self, verdict: SelfTestState, equipment: &mut dyn Equipment) {
        self.self_test = verdict;
        if self.config.self_test_policy == SelfTestPolicy::PauseEquipment {
            equipment.apply(self.equipment.outputs());
        }
    }
}

/// Hysteresis rule. Equipment starts only when the smoothed value leaves the
/// band (strictly), and stops once it has come back to the target.
pub fn decide(
    current: EquipmentState,
    smoothed_f: f32,
    settings: &Settings,
    cooling: CoolingEquipment,
) -> EquipmentState {
    let warm_side = match cooling {
        CoolingEquipment::Compressor => EquipmentState::Cooling,
        CoolingEquipment::FanOnly => EquipmentState::FanOnly,
    };

    if smoothed_f < settings.lower_threshold_f {
        return EquipmentState::Heating;
    }
    if smoothed_f > settings.upper_threshold_f {
        return warm_side;
    }

    match current {
        EquipmentState::Heating if smoothed_f < settings.target_temp_f => current,
        EquipmentState::Cooling | EquipmentState::FanOnly
            if smoothed_f > settings.target_temp_f =>
        {
            current
        }
        _ => EquipmentState::Idle,
    }
}
