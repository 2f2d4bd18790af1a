//! Menu navigation and frame rendering for the small status display.
//!
//! Views form a flat ring. A press on an editable view opens a draft of
//! its field; the dial then adjusts the draft and a second press commits
//! it to [`Settings`].

use core::fmt::Write;

use serde::Serialize;

use crate::{
    config::{Settings, ThermostatConfig},
    events::Event,
    history::Filter,
    types::{ClockSnapshot, EquipmentState, HourlyForecast, SelfTestState, SensorReading},
};

pub const LINE_WIDTH: usize = 21;
pub const FRAME_LINES: usize = 4;

pub type Line = heapless::String<LINE_WIDTH>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum View {
    Status,
    Weather,
    Target,
    LowerThreshold,
    UpperThreshold,
    Filter,
    SamplePeriod,
    ScreenTimeout,
    Runtime,
}

impl View {
    pub const ALL: [View; 9] = [
        View::Status,
        View::Weather,
        View::Target,
        View::LowerThreshold,
        View::UpperThreshold,
        View::Filter,
        View::SamplePeriod,
        View::ScreenTimeout,
        View::Runtime,
    ];

    pub const HOME: View = View::Status;

    pub fn index(self) -> usize {
        self as usize
    }

    fn offset(self, step: isize) -> Self {
        let count = Self::ALL.len() as isize;
        let next = (self.index() as isize + step).rem_euclid(count);
        Self::ALL[next as usize]
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Status => "Status",
            Self::Weather => "Weather",
            Self::Target => "Target",
            Self::LowerThreshold => "Lower threshold",
            Self::UpperThreshold => "Upper threshold",
            Self::Filter => "Filter",
            Self::SamplePeriod => "Sample period",
            Self::ScreenTimeout => "Screen timeout",
            Self::Runtime => "Runtime",
        }
    }
}

/// Uncommitted value of the field being edited.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Draft {
    Temperature(f32),
    Seconds(u32),
    Filter(Filter),
}

/// What the display shows. Serialized as-is by the host panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub view: View,
    pub editing: bool,
    pub lines: heapless::Vec<Line, FRAME_LINES>,
}

/// Read-only values the status views draw from.
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    pub reading: Option<SensorReading>,
    pub smoothed_f: Option<f32>,
    pub equipment: Option<EquipmentState>,
    pub self_test: Option<SelfTestState>,
    pub override_active: bool,
    pub clock: Option<ClockSnapshot>,
    pub weather: Option<HourlyForecast>,
    pub weather_high_low: Option<(f32, f32)>,
    pub runtime_min: u64,
    pub connected: bool,
}

#[derive(Debug, Clone)]
pub struct MenuNavigator {
    view: View,
    draft: Option<Draft>,
    screen_on: bool,
}

impl Default for MenuNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl MenuNavigator {
    pub fn new() -> Self {
        Self {
            view: View::HOME,
            draft: None,
            screen_on: false,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn draft(&self) -> Option<Draft> {
        self.draft
    }

    pub fn is_editing(&self) -> bool {
        self.draft.is_some()
    }

    pub fn is_screen_on(&self) -> bool {
        self.screen_on
    }

    pub fn screen_on(&mut self) {
        self.screen_on = true;
        self.reset();
    }

    pub fn screen_off(&mut self) {
        self.screen_on = false;
        self.reset();
    }

    /// Moving to another view drops an uncommitted draft.
    pub fn next_menu(&mut self) {
        self.draft = None;
        self.view = self.view.offset(1);
    }

    pub fn previous_menu(&mut self) {
        self.draft = None;
        self.view = self.view.offset(-1);
    }

    /// Toggle edit mode. Leaving edit mode commits the draft and returns the
    /// follow-up the change needs, if any.
    pub fn edit(
        &mut self,
        settings: &mut Settings,
        config: &ThermostatConfig,
        override_active: bool,
    ) -> Option<Event> {
        if let Some(draft) = self.draft.take() {
            return commit(self.view, draft, settings, config);
        }

        if self.view == View::Status && override_active {
            return Some(Event::ClearTemporaryOverride);
        }
        self.draft = open_draft(self.view, settings);
        None
    }

    pub fn rotary_dial(&mut self, delta: i8, settings: &Settings, config: &ThermostatConfig) {
        if delta == 0 {
            return;
        }

        let Some(draft) = self.draft else {
            if delta > 0 {
                self.next_menu();
            } else {
                self.previous_menu();
            }
            return;
        };

        let direction = delta.signum();
        self.draft = Some(match draft {
            Draft::Temperature(value) => {
                let (min, max) = temperature_range(self.view, settings, config);
                Draft::Temperature(
                    (value + config.temp_step_f * direction as f32).clamp(min, max),
                )
            }
            Draft::Seconds(value) => {
                let (min, max, step) = seconds_range(self.view, config);
                let next = if direction > 0 {
                    value.saturating_add(step)
                } else {
                    value.saturating_sub(step)
                };
                Draft::Seconds(next.clamp(min, max))
            }
            Draft::Filter(filter) => Draft::Filter(filter.toggled()),
        });
    }

    pub fn render(&self, settings: &Settings, status: &StatusSnapshot) -> Frame {
        let mut lines: heapless::Vec<Line, FRAME_LINES> = heapless::Vec::new();
        let mut push = |line: Line| {
            let _ = lines.push(line);
        };

        match self.view {
            View::Status => {
                let mut current = Line::new();
                match status.reading {
                    Some(reading) => {
                        let _ = write!(
                            current,
                            "{:.1}F {:.0}%",
                            reading.temperature_f, reading.humidity
                        );
                    }
                    None => {
                        let _ = current.push_str("--.-F --%");
                    }
                }
                push(current);

                let mut target = Line::new();
                let _ = write!(target, "Set {:.1}F", settings.target_temp_f);
                if status.override_active {
                    let _ = target.push_str(" HOLD");
                }
                push(target);

                let mut state = Line::new();
                let _ = state.push_str(status.equipment.map_or("--", EquipmentState::as_str));
                push(state);

                let mut clock = Line::new();
                match status.clock {
                    Some(now) => {
                        let _ = write!(
                            clock,
                            "{} {:02}:{:02}",
                            now.weekday.as_str(),
                            now.hour,
                            now.minute
                        );
                    }
                    None => {
                        let _ = clock.push_str("--:--");
                    }
                }
                if !status.connected {
                    let _ = clock.push_str(" offline");
                }
                push(clock);
            }
            View::Weather => {
                push(title(self.view));
                let mut now = Line::new();
                match status.weather {
                    Some(hour) => {
                        let _ = write!(
                            now,
                            "{} {:.0}F",
                            hour.condition.as_str(),
                            hour.temperature_f
                        );
                    }
                    None => {
                        let _ = now.push_str("No forecast");
                    }
                }
                push(now);
                if let Some((high, low)) = status.weather_high_low {
                    let mut range = Line::new();
                    let _ = write!(range, "H {high:.0}F L {low:.0}F");
                    push(range);
                }
            }
            View::Runtime => {
                push(title(self.view));
                let mut runtime = Line::new();
                let _ = write!(runtime, "{} min", status.runtime_min);
                push(runtime);
                let mut test = Line::new();
                let _ = write!(
                    test,
                    "Self test {}",
                    status.self_test.map_or("--", SelfTestState::as_str)
                );
                push(test);
            }
            view => {
                push(title(view));
                let value = self.draft.unwrap_or_else(|| {
                    open_draft(view, settings).unwrap_or(Draft::Seconds(0))
                });
                let mut line = Line::new();
                if self.is_editing() {
                    let _ = line.push_str("> ");
                }
                let _ = match value {
                    Draft::Temperature(t) => write!(line, "{t:.1}F"),
                    Draft::Seconds(s) => write!(line, "{s} s"),
                    Draft::Filter(filter) => line.write_str(filter.as_str()),
                };
                push(line);
            }
        }

        Frame {
            view: self.view,
            editing: self.is_editing(),
            lines,
        }
    }

    fn reset(&mut self) {
        self.view = View::HOME;
        self.draft = None;
    }
}

fn title(view: View) -> Line {
    let mut line = Line::new();
    let _ = line.push_str(view.title());
    line
}

fn open_draft(view: View, settings: &Settings) -> Option<Draft> {
    match view {
        View::Target => Some(Draft::Temperature(settings.target_temp_f)),
        View::LowerThreshold => Some(Draft::Temperature(settings.lower_threshold_f)),
        View::UpperThreshold => Some(Draft::Temperature(settings.upper_threshold_f)),
        View::Filter => Some(Draft::Filter(settings.filter)),
        View::SamplePeriod => Some(Draft::Seconds(settings.sample_period_secs)),
        View::ScreenTimeout => Some(Draft::Seconds(settings.screen_timeout_secs)),
        View::Status | View::Weather | View::Runtime => None,
    }
}

/// Bounds that keep `lower <= target <= upper` once the draft is committed.
pub fn temperature_range(
    view: View,
    settings: &Settings,
    config: &ThermostatConfig,
) -> (f32, f32) {
    match view {
        View::Target => (
            config.min_temp_f.max(settings.lower_threshold_f),
            config.max_temp_f.min(settings.upper_threshold_f),
        ),
        View::LowerThreshold => (config.min_temp_f, settings.target_temp_f),
        View::UpperThreshold => (settings.target_temp_f, config.max_temp_f),
        _ => (config.min_temp_f, config.max_temp_f),
    }
}

fn seconds_range(view: View, config: &ThermostatConfig) -> (u32, u32, u32) {
    match view {
        View::ScreenTimeout => (
            config.min_screen_timeout_secs,
            config.max_screen_timeout_secs,
            config.screen_timeout_step_secs,
        ),
        _ => (
            config.min_sample_period_secs,
            config.max_sample_period_secs,
            config.sample_period_step_secs,
        ),
    }
}

fn commit(
    view: View,
    draft: Draft,
    settings: &mut Settings,
    config: &ThermostatConfig,
) -> Option<Event> {
    match (view, draft) {
        (View::Target, Draft::Temperature(t)) => {
            let (min, max) = temperature_range(view, settings, config);
            replace(&mut settings.target_temp_f, t.clamp(min, max))
                .then_some(Event::SendServerStats)
        }
        (View::LowerThreshold, Draft::Temperature(t)) => {
            let (min, max) = temperature_range(view, settings, config);
            replace(&mut settings.lower_threshold_f, t.clamp(min, max))
                .then_some(Event::SendServerStats)
        }
        (View::UpperThreshold, Draft::Temperature(t)) => {
            let (min, max) = temperature_range(view, settings, config);
            replace(&mut settings.upper_threshold_f, t.clamp(min, max))
                .then_some(Event::SendServerStats)
        }
        (View::SamplePeriod, Draft::Seconds(s)) => {
            replace(&mut settings.sample_period_secs, s).then_some(Event::UpdateSamplePeriod)
        }
        (View::ScreenTimeout, Draft::Seconds(s)) => {
            settings.screen_timeout_secs = s;
            None
        }
        (View::Filter, Draft::Filter(filter)) => {
            replace(&mut settings.filter, filter).then_some(Event::SetFilter)
        }
        _ => None,
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
