use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::types::ClockSnapshot;

pub const MAX_SCHEDULE_ENTRIES: usize = 42;

const MINUTES_PER_DAY: u16 = 24 * 60;
const MINUTES_PER_WEEK: u64 = 7 * MINUTES_PER_DAY as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        Self::Mon,
        Self::Tue,
        Self::Wed,
        Self::Thu,
        Self::Fri,
        Self::Sat,
        Self::Sun,
    ];

    /// Monday is 0.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn from_chrono(weekday: Weekday) -> Self {
        Self::from_index(weekday.num_days_from_monday() as usize)
    }

    pub fn as_str(self) -> &'static str {
        const NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
        NAMES[self.index()]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleEntry {
    pub day: DayOfWeek,
    #[serde(rename = "startMinutes")]
    pub start_minutes: u16,
    #[serde(rename = "targetTemp")]
    pub target_temp_f: f32,
    #[serde(rename = "lowerThreshold")]
    pub lower_threshold_f: f32,
    #[serde(rename = "upperThreshold")]
    pub upper_threshold_f: f32,
}

impl ScheduleEntry {
    pub fn validate(&self) -> bool {
        self.start_minutes < MINUTES_PER_DAY
            && self.target_temp_f.is_finite()
            && self.lower_threshold_f.is_finite()
            && self.upper_threshold_f.is_finite()
            && self.lower_threshold_f <= self.target_temp_f
            && self.target_temp_f <= self.upper_threshold_f
    }
}

/// Weekly program pulled from the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub enabled: bool,
    pub entries: heapless::Vec<ScheduleEntry, MAX_SCHEDULE_ENTRIES>,
}

/// The entry in force at some instant, identified by where it starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleAction {
    pub day: DayOfWeek,
    pub start_minutes: u16,
    pub target_temp_f: f32,
    pub lower_threshold_f: f32,
    pub upper_threshold_f: f32,
}

impl Schedule {
    /// Parse a server reply. Malformed or oversized bodies are errors.
    pub fn from_json(raw: &[u8]) -> Result<Self, serde_json::Error> {
        let mut schedule: Self = serde_json::from_slice(raw)?;
        schedule.normalize();
        Ok(schedule)
    }

    pub fn normalize(&mut self) {
        self.entries.retain(ScheduleEntry::validate);
        self.entries
            .sort_unstable_by_key(|entry| (entry.day.index(), entry.start_minutes));
    }

    /// The entry in force at `now`: the latest start at or before it,
    /// wrapping back across the week.
    pub fn current_action(&self, now: &ClockSnapshot) -> Option<ScheduleAction> {
        if !self.enabled {
            return None;
        }

        let now_in_week = minute_of_week(now.weekday, now.minute_of_day());
        self.entries
            .iter()
            .min_by_key(|entry| {
                let start = minute_of_week(entry.day, entry.start_minutes);
                (now_in_week + MINUTES_PER_WEEK - start) % MINUTES_PER_WEEK
            })
            .map(|entry| ScheduleAction {
                day: entry.day,
                start_minutes: entry.start_minutes,
                target_temp_f: entry.target_temp_f,
                lower_threshold_f: entry.lower_threshold_f,
                upper_threshold_f: entry.upper_threshold_f,
            })
    }

    /// Seconds from `now` until the next entry starts. An entry starting
    /// this very minute counts as a week away.
    pub fn next_transition_in_secs(&self, now: &ClockSnapshot) -> Option<u64> {
        if !self.enabled {
            return None;
        }

        let now_in_week = minute_of_week(now.weekday, now.minute_of_day());
        self.entries
            .iter()
            .map(|entry| {
                let start = minute_of_week(entry.day, entry.start_minutes);
                match (start + MINUTES_PER_WEEK - now_in_week) % MINUTES_PER_WEEK {
                    0 => MINUTES_PER_WEEK,
                    ahead => ahead,
                }
            })
            .min()
            .map(|minutes| (minutes * 60).saturating_sub(u64::from(now.second)))
    }
}

fn minute_of_week(day: DayOfWeek, minute_of_day: u16) -> u64 {
    day.index() as u64 * u64::from(MINUTES_PER_DAY) + u64::from(minute_of_day)
}
