//! Rolling temperature history used for smoothing.

use serde::{Deserialize, Serialize};

/// Samples kept for smoothing.
pub const HISTORY_CAPACITY: usize = 16;

/// How the controller aggregates history into the smoothed temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Filter {
    /// Mean of the most recent `smoothing_window` samples.
    Average,
    /// Most recent sample only.
    Latest,
}

impl Filter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Average => "AVERAGE",
            Self::Latest => "LATEST",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Average => Self::Latest,
            Self::Latest => Self::Average,
        }
    }
}

/// Fixed-capacity ring of recent samples; the oldest is overwritten on wrap.
///
/// Slots that were never written are not counted by any query.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<const N: usize> {
    buf: [f32; N],
    next: usize,
    len: usize,
}

impl<const N: usize> HistoryBuffer<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0.0; N],
            next: 0,
            len: 0,
        }
    }

    /// A buffer holding one real reading, taken at startup.
    pub fn seeded(first: f32) -> Self {
        let mut history = Self::new();
        history.insert(first);
        history
    }

    pub fn insert(&mut self, sample: f32) {
        self.buf[self.next] = sample;
        self.next = (self.next + 1) % N;
        if self.len < N {
            self.len += 1;
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn latest(&self) -> Option<f32> {
        self.recent().next()
    }

    /// Mean of the most recent `window` samples, or of all filled slots when
    /// fewer have been recorded.
    pub fn average(&self, window: usize) -> Option<f32> {
        let take = window.min(self.len);
        if take == 0 {
            return None;
        }
        let sum: f32 = self.recent().take(take).sum();
        Some(sum / take as f32)
    }

    pub fn smoothed(&self, filter: Filter, window: usize) -> Option<f32> {
        match filter {
            Filter::Average => self.average(window),
            Filter::Latest => self.latest(),
        }
    }

    /// Newest to oldest.
    pub fn recent(&self) -> impl Iterator<Item = f32> + '_ {
        (1..=self.len).map(move |back| self.buf[(self.next + N - back) % N])
    }
}

impl<const N: usize> Default for HistoryBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
