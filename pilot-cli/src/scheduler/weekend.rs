use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use std::time::Duration;

use pilot_core::planner::WeeklySummary;
use pilot_core::weekend::{WeekendPolicy, WeekendState};
use pilot_store::{TaskStore, WEEKLY_REVIEW_MANUAL_KEY};

use super::{poll_interval, LoopContext};

/// Last seven days of activity plus what is due in the next seven.
pub fn weekly_summary(
    store: &dyn TaskStore,
    chat_id: i64,
    now: DateTime<Utc>,
) -> pilot_store::Result<WeeklySummary> {
    let stats = store.stats(chat_id, now - ChronoDuration::days(7))?;
    let upcoming = store.list_tasks_due_in_window(chat_id, now, now + ChronoDuration::days(7))?;
    Ok(WeeklySummary {
        added: stats.added_week,
        done: stats.done_week,
        productivity_pct: stats.productivity_pct.round().clamp(0.0, 100.0) as u32,
        open: stats.open,
        upcoming: upcoming.len() as u64,
    })
}

/// Weekly summary on the configured day, unless a review was run by hand
/// earlier that day.
pub struct WeekendReportScheduler {
    ctx: LoopContext,
    policy: WeekendPolicy,
    state: WeekendState,
}

impl WeekendReportScheduler {
    pub fn new(ctx: LoopContext, policy: WeekendPolicy) -> Self {
        Self {
            ctx,
            policy,
            state: WeekendState::default(),
        }
    }

    #[cfg(test)]
    fn state(&self) -> &WeekendState {
        &self.state
    }

    /// One poll. Returns whether a report was delivered. A failed send leaves
    /// the day open, so the next poll tries again.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<bool> {
        let manual = self
            .ctx
            .with_store(|s| Ok(s.kv_get(WEEKLY_REVIEW_MANUAL_KEY)?))
            .await?;
        match manual.as_deref().map(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d")) {
            Some(Ok(day)) => self.state.mark_manual(day),
            Some(Err(e)) => tracing::warn!(error = %e, "ignoring unreadable manual review mark"),
            None => {}
        }

        let local = now.with_timezone(&self.ctx.tz).naive_local();
        if !self.state.should_send(local, &self.policy) {
            return Ok(false);
        }

        let chat_id = self.ctx.chat_id;
        let summary = self
            .ctx
            .with_store(move |s| Ok(weekly_summary(s, chat_id, now)?))
            .await?;
        if !self.ctx.notify(chat_id, &summary.render(now, self.ctx.tz)).await {
            return Ok(false);
        }
        tracing::info!("weekly report sent");
        self.state.mark_sent(local.date());
        Ok(true)
    }

    pub async fn run(mut self, poll: Duration) {
        tracing::info!(weekday = %self.policy.weekday, hour = self.policy.hour, "weekend report loop started");
        let mut ticker = poll_interval(poll);
        loop {
            ticker.tick().await;
            if let Err(e) = self.tick(Utc::now()).await {
                tracing::warn!(error = %e, "weekend report tick failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::testing::Harness;
    use chrono::TimeZone;

    // 2026-03-15 is a Sunday; Moscow is UTC+3.
    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn sends_once_after_the_hour_on_the_day() {
        let h = Harness::new();
        h.add("Ship release", Some(utc(16, 9, 0)), 70.0);
        let mut w = WeekendReportScheduler::new(h.ctx.clone(), WeekendPolicy::default());

        assert!(!w.tick(utc(14, 16, 0)).await.unwrap()); // Saturday 19:00
        assert!(!w.tick(utc(15, 14, 59)).await.unwrap()); // Sunday 17:59
        assert!(w.tick(utc(15, 15, 0)).await.unwrap());
        assert!(!w.tick(utc(15, 15, 1)).await.unwrap());
        assert!(!w.tick(utc(15, 20, 0)).await.unwrap());

        let texts = h.transport.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("Due in the next 7 days: 1"));
    }

    #[tokio::test]
    async fn manual_review_preempts_the_report() {
        let h = Harness::new();
        h.store.kv_set(WEEKLY_REVIEW_MANUAL_KEY, "2026-03-15").unwrap();
        let mut w = WeekendReportScheduler::new(h.ctx.clone(), WeekendPolicy::default());

        for m in [0, 1, 30] {
            assert!(!w.tick(utc(15, 15, m)).await.unwrap());
        }
        assert!(h.transport.texts().is_empty());
        assert_eq!(w.state().manual(), NaiveDate::from_ymd_opt(2026, 3, 15));

        // A mark from last week does not block this week.
        assert!(w.tick(utc(22, 15, 0)).await.unwrap());
    }

    #[tokio::test]
    async fn failed_report_is_retried_the_same_evening() {
        let h = Harness::new();
        let mut w = WeekendReportScheduler::new(h.ctx.clone(), WeekendPolicy::default());

        h.transport.set_failing(true);
        assert!(!w.tick(utc(15, 15, 0)).await.unwrap());
        assert_eq!(w.state().last_sent(), None);

        h.transport.set_failing(false);
        assert!(w.tick(utc(15, 15, 1)).await.unwrap());
        assert!(!w.tick(utc(15, 15, 2)).await.unwrap());
        assert_eq!(h.transport.texts().len(), 1);
    }

    #[tokio::test]
    async fn garbage_mark_is_ignored() {
        let h = Harness::new();
        h.store.kv_set(WEEKLY_REVIEW_MANUAL_KEY, "last sunday").unwrap();
        let mut w = WeekendReportScheduler::new(h.ctx.clone(), WeekendPolicy::default());
        assert!(w.tick(utc(15, 16, 0)).await.unwrap());
    }

    #[test]
    fn summary_counts_week_activity() {
        let h = Harness::new();
        let now = utc(15, 12, 0);
        let done = h.add("a", None, 10.0);
        h.add("b", Some(now + ChronoDuration::days(2)), 10.0);
        h.add("c", Some(now + ChronoDuration::days(9)), 10.0);
        h.store.mark_done(crate::scheduler::testing::CHAT, done).unwrap();

        let s = weekly_summary(h.store.as_ref(), crate::scheduler::testing::CHAT, now).unwrap();
        assert_eq!(s.done, 1);
        assert_eq!(s.open, 2);
        assert_eq!(s.upcoming, 1);
    }
}
