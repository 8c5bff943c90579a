//! Overdue-alert bookkeeping: at most one alert per task per cooldown window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::task::{Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReminderPolicy {
    pub cooldown_minutes: i64,
    /// Entries idle longer than this are forgotten.
    pub retention_hours: i64,
    /// Max alerts sent per tick.
    pub batch: usize,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            cooldown_minutes: 60,
            retention_hours: 24,
            batch: 10,
        }
    }
}

/// task id -> last alert instant. Process-local; losing it on restart costs
/// at most one repeated alert per task.
#[derive(Debug, Clone, Default)]
pub struct ReminderState {
    policy: ReminderPolicy,
    last_alert: HashMap<TaskId, DateTime<Utc>>,
}

impl ReminderState {
    pub fn new(policy: ReminderPolicy) -> Self {
        Self {
            policy,
            last_alert: HashMap::new(),
        }
    }

    pub fn policy(&self) -> ReminderPolicy {
        self.policy
    }

    /// Open, overdue, and never alerted or cooled down.
    pub fn should_alert(&self, task: &Task, now: DateTime<Utc>) -> bool {
        if !task.is_open() {
            return false;
        }
        match task.due_at {
            Some(due) if due <= now => {}
            _ => return false,
        }
        match self.last_alert.get(&task.id) {
            None => true,
            Some(last) => now - *last > Duration::minutes(self.policy.cooldown_minutes),
        }
    }

    pub fn record(&mut self, id: TaskId, now: DateTime<Utc>) {
        self.last_alert.insert(id, now);
    }

    pub fn last_alert(&self, id: TaskId) -> Option<DateTime<Utc>> {
        self.last_alert.get(&id).copied()
    }

    /// Drop entries older than the retention window. Returns how many went.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let horizon = Duration::hours(self.policy.retention_hours);
        let before = self.last_alert.len();
        self.last_alert.retain(|_, at| now - *at < horizon);
        before - self.last_alert.len()
    }

    pub fn len(&self) -> usize {
        self.last_alert.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_alert.is_empty()
    }
}

/// Alert text for one overdue task.
pub fn overdue_message(task: &Task) -> String {
    format!("⏰ Due: task #{} — {}", task.id, task.title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
    }

    fn overdue(id: TaskId) -> Task {
        Task::new(id, "pay rent").with_due(t0() - Duration::minutes(5))
    }

    #[test]
    fn never_two_alerts_within_an_hour() {
        let mut st = ReminderState::default();
        let task = overdue(1);
        let mut sent = Vec::new();

        // Poll every 7 minutes for 5 hours with jitter.
        for step in 0..43 {
            let now = t0() + Duration::minutes(step * 7 + (step % 3));
            if st.should_alert(&task, now) {
                st.record(task.id, now);
                sent.push(now);
            }
            st.prune(now);
        }

        assert!(sent.len() >= 4);
        for pair in sent.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::hours(1));
        }
    }

    #[test]
    fn skips_closed_future_and_undated() {
        let st = ReminderState::default();
        let now = t0();

        let mut done = overdue(1);
        done.status = TaskStatus::Done;
        assert!(!st.should_alert(&done, now));

        let future = Task::new(2, "later").with_due(now + Duration::hours(1));
        assert!(!st.should_alert(&future, now));

        let inbox = Task::new(3, "someday");
        assert!(!st.should_alert(&inbox, now));

        assert!(st.should_alert(&overdue(4), now));
    }

    #[test]
    fn prune_forgets_after_retention() {
        let mut st = ReminderState::default();
        st.record(1, t0());
        st.record(2, t0() + Duration::hours(20));

        assert_eq!(st.prune(t0() + Duration::hours(23)), 0);
        assert_eq!(st.prune(t0() + Duration::hours(24)), 1);
        assert_eq!(st.len(), 1);
        assert!(st.last_alert(1).is_none());
    }

    #[test]
    fn message_names_the_task() {
        assert_eq!(overdue_message(&overdue(7)), "⏰ Due: task #7 — pay rent");
    }
}
