//! Weekly report trigger. A manual report earlier the same local day
//! suppresses the automatic one.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekendPolicy {
    pub weekday: Weekday,
    /// Local hour after which the report may go out.
    pub hour: u32,
}

impl Default for WeekendPolicy {
    fn default() -> Self {
        Self {
            weekday: Weekday::Sun,
            hour: 18,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekendState {
    last_sent: Option<NaiveDate>,
    manual: Option<NaiveDate>,
}

impl WeekendState {
    pub fn should_send(&self, local: NaiveDateTime, policy: &WeekendPolicy) -> bool {
        let today = local.date();
        today.weekday() == policy.weekday
            && local.hour() >= policy.hour
            && self.last_sent != Some(today)
            && self.manual != Some(today)
    }

    pub fn mark_sent(&mut self, day: NaiveDate) {
        self.last_sent = Some(day);
    }

    /// Record a hand-run report. Older marks never overwrite newer ones.
    pub fn mark_manual(&mut self, day: NaiveDate) {
        if self.manual.is_none_or(|d| d < day) {
            self.manual = Some(day);
        }
    }

    pub fn last_sent(&self) -> Option<NaiveDate> {
        self.last_sent
    }

    pub fn manual(&self) -> Option<NaiveDate> {
        self.manual
    }
}
