use anyhow::Result;
use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use std::time::Duration;

use pilot_core::dedupe::Deduplicator;
use pilot_core::planner::{build_plan, render_plan, DayPlan, SAND_DISPLAY_LIMIT};
use pilot_core::task::TaskId;
use pilot_core::time::{local_day_bounds, next_occurrence};
use pilot_store::TaskStore;

use super::LoopContext;

/// Open tasks considered when nothing is overdue or due today.
pub const FALLBACK_LIMIT: usize = 10;

/// Today's plan: overdue or due-today tasks, else the top open ones, deduped
/// and allocated.
pub fn plan_for_today(
    store: &dyn TaskStore,
    chat_id: i64,
    now: DateTime<Utc>,
    tz: Tz,
    dedup: &Deduplicator,
) -> pilot_store::Result<(DayPlan, Vec<TaskId>)> {
    let (start, end) = local_day_bounds(now, tz);
    let mut ranked = store.list_today(chat_id, now, start, end)?;
    if ranked.is_empty() {
        ranked = store.list_open_tasks(chat_id)?;
        ranked.truncate(FALLBACK_LIMIT);
    }
    Ok(build_plan(&ranked, dedup))
}

/// Sends the plan once a day at a fixed local time. Sleeps until the exact
/// instant instead of polling.
pub struct DailyPlanBroadcaster {
    ctx: LoopContext,
    at: NaiveTime,
    dedup: Deduplicator,
    backoff: Duration,
}

impl DailyPlanBroadcaster {
    pub fn new(ctx: LoopContext, at: NaiveTime, dedup: Deduplicator, backoff: Duration) -> Self {
        Self {
            ctx,
            at,
            dedup,
            backoff,
        }
    }

    /// Next send instant after `now`, strictly later than `last` when given.
    /// A wall clock stepping backwards cannot bring a sent slot back.
    pub fn next_run(&self, now: DateTime<Utc>, last: Option<DateTime<Utc>>) -> DateTime<Utc> {
        let mut target = next_occurrence(now, self.ctx.tz, self.at);
        if let Some(last) = last {
            while target <= last {
                target = next_occurrence(target, self.ctx.tz, self.at);
            }
        }
        target
    }

    /// Build and send today's plan. Returns the number of planned tasks; an
    /// empty plan is not sent.
    pub async fn broadcast(&self, now: DateTime<Utc>) -> Result<usize> {
        let (chat_id, tz, dedup) = (self.ctx.chat_id, self.ctx.tz, self.dedup);
        let (plan, superseded) = self
            .ctx
            .with_store(move |s| Ok(plan_for_today(s, chat_id, now, tz, &dedup)?))
            .await?;
        if !superseded.is_empty() {
            tracing::debug!(?superseded, "duplicates left out of the plan");
        }
        if plan.is_empty() {
            tracing::info!("nothing to plan today");
            return Ok(0);
        }

        self.ctx
            .transport
            .send_message(chat_id, &render_plan(&plan, tz, SAND_DISPLAY_LIMIT))
            .await?;
        tracing::info!(tasks = plan.len(), "daily plan sent");
        Ok(plan.len())
    }

    pub async fn run(self) {
        tracing::info!(at = %self.at, "daily plan loop started");
        let mut last = None;
        loop {
            let now = Utc::now();
            let target = self.next_run(now, last);
            tracing::debug!(%target, "next daily plan");
            tokio::time::sleep((target - now).to_std().unwrap_or_default()).await;
            last = Some(target);

            if let Err(e) = self.broadcast(Utc::now()).await {
                tracing::error!(error = %e, "daily plan failed");
                tokio::time::sleep(self.backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::testing::{Harness, CHAT};
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn now() -> DateTime<Utc> {
        // 12:00 Moscow.
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
    }

    fn broadcaster(h: &Harness) -> DailyPlanBroadcaster {
        DailyPlanBroadcaster::new(
            h.ctx.clone(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            Deduplicator::default(),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn next_run_is_tomorrow_once_past() {
        let h = Harness::new();
        let b = broadcaster(&h);
        assert_eq!(b.next_run(now(), None), Utc.with_ymd_and_hms(2026, 3, 11, 5, 0, 0).unwrap());
        let early = Utc.with_ymd_and_hms(2026, 3, 10, 4, 0, 0).unwrap();
        assert_eq!(b.next_run(early, None), Utc.with_ymd_and_hms(2026, 3, 10, 5, 0, 0).unwrap());
    }

    #[test]
    fn clock_stepping_back_does_not_repeat_a_sent_slot() {
        let h = Harness::new();
        let b = broadcaster(&h);
        let sent = Utc.with_ymd_and_hms(2026, 3, 10, 5, 0, 0).unwrap();
        // Wall clock jumped back to 07:59:30 local right after the 08:00 send.
        let stepped_back = sent - ChronoDuration::seconds(30);
        assert_eq!(b.next_run(stepped_back, None), sent);
        assert_eq!(
            b.next_run(stepped_back, Some(sent)),
            Utc.with_ymd_and_hms(2026, 3, 11, 5, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn plan_prefers_today_and_drops_duplicates() {
        let h = Harness::new();
        h.add("Позвонить клиенту", Some(now() + ChronoDuration::hours(1)), 55.0);
        h.add("позвонить клиенту!!", Some(now() + ChronoDuration::hours(2)), 54.0);
        h.add("Overdue report", Some(now() - ChronoDuration::hours(30)), 90.0);
        h.add("Next week", Some(now() + ChronoDuration::days(5)), 99.0);

        let sent = broadcaster(&h).broadcast(now()).await.unwrap();
        assert_eq!(sent, 2);

        let text = &h.transport.texts()[0];
        assert!(text.contains("🐸 FROG\n#3 Overdue report"));
        assert!(text.contains("Позвонить клиенту"));
        assert!(!text.contains("Next week"));
        assert!(!text.contains("позвонить клиенту!!"));
    }

    #[tokio::test]
    async fn falls_back_to_open_tasks() {
        let h = Harness::new();
        let titles = [
            "Deploy", "Review PR", "Call bank", "Buy milk", "Fix sink", "Walk dog",
            "Write docs", "Pay rent", "Book flights", "Renew passport", "Clean desk", "Plan trip",
        ];
        for (i, title) in titles.iter().enumerate() {
            h.add(title, None, 40.0 + i as f64);
        }
        let (plan, _) =
            plan_for_today(h.store.as_ref(), CHAT, now(), h.ctx.tz, &Deduplicator::default())
                .unwrap();
        assert_eq!(plan.len(), FALLBACK_LIMIT);
        assert_eq!(plan.frog.as_ref().map(|t| t.title.as_str()), Some("Plan trip"));
    }

    #[tokio::test]
    async fn empty_plan_sends_nothing() {
        let h = Harness::new();
        assert_eq!(broadcaster(&h).broadcast(now()).await.unwrap(), 0);
        assert!(h.transport.texts().is_empty());
    }

    #[tokio::test]
    async fn send_failure_surfaces_to_the_loop() {
        let h = Harness::new();
        h.add("x", None, 10.0);
        h.transport.set_failing(true);
        assert!(broadcaster(&h).broadcast(now()).await.is_err());
    }
}
