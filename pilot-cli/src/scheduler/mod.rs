//! Background loops. Each owns its state, talks to the others only through
//! the store, and survives any single failed tick.

pub mod backup;
pub mod daily_plan;
pub mod nudges;
pub mod reminders;
pub mod weekend;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::task::JoinHandle;

use pilot_core::dedupe::Deduplicator;
use pilot_core::scoring::PriorityScorer;
use pilot_store::{Backups, TaskStore};
use pilot_sync::SyncTarget;

use crate::config::Config;
use crate::transport::Transport;

pub use backup::BackupScheduler;
pub use daily_plan::{plan_for_today, DailyPlanBroadcaster};
pub use nudges::NudgeScheduler;
pub use reminders::ReminderDispatcher;
pub use weekend::{weekly_summary, WeekendReportScheduler};

/// What every loop reads from and writes to.
#[derive(Clone)]
pub struct LoopContext {
    pub store: Arc<dyn TaskStore>,
    pub transport: Arc<dyn Transport>,
    /// Recipient of the owner-level messages (nudges, plan, weekly report).
    pub chat_id: i64,
    pub tz: Tz,
}

impl LoopContext {
    /// Run a store call on the blocking pool.
    pub async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn TaskStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .context("store task panicked")?
    }

    /// Send and log. A failed send never reaches the caller.
    pub async fn notify(&self, chat_id: i64, text: &str) -> bool {
        match self.transport.send_message(chat_id, text).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(chat_id, transport = self.transport.name(), error = %e, "send failed");
                false
            }
        }
    }
}

/// Start all five loops. They run until the process exits.
pub fn spawn_all(
    ctx: LoopContext,
    cfg: &Config,
    backups: Backups,
    sheet: Arc<dyn SyncTarget>,
) -> Result<Vec<JoinHandle<()>>> {
    let schedule = &cfg.schedule;
    let poll = std::time::Duration::from_secs(schedule.poll_secs);

    let reminders = ReminderDispatcher::new(ctx.clone(), schedule.reminder_policy());
    let nudges = NudgeScheduler::new(
        ctx.clone(),
        schedule.nudges()?,
        Some(sheet),
        PriorityScorer::new(cfg.scoring.clone()),
    );
    let weekend = WeekendReportScheduler::new(ctx.clone(), schedule.weekend()?);
    let daily = DailyPlanBroadcaster::new(
        ctx,
        schedule.daily_plan_time()?,
        Deduplicator::default(),
        std::time::Duration::from_secs(schedule.broadcast_backoff_secs),
    );
    let backup = BackupScheduler::new(backups);

    Ok(vec![
        tokio::spawn(reminders.run(poll)),
        tokio::spawn(nudges.run(poll)),
        tokio::spawn(weekend.run(poll)),
        tokio::spawn(daily.run()),
        tokio::spawn(backup.run(std::time::Duration::from_secs(schedule.backup_interval_secs))),
    ])
}

/// Poll-style driver shared by the fixed-interval loops.
pub(crate) fn poll_interval(period: std::time::Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use pilot_core::task::{NewTask, TaskId};
    use pilot_store::SqliteStore;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    pub const CHAT: i64 = 7;

    #[derive(Default)]
    pub struct RecordingTransport {
        pub sent: Mutex<Vec<(i64, String)>>,
        pub fail: AtomicBool,
    }

    impl RecordingTransport {
        pub fn texts(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
        }

        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("transport down");
            }
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    pub struct Harness {
        pub dir: TempDir,
        pub store: Arc<SqliteStore>,
        pub transport: Arc<RecordingTransport>,
        pub ctx: LoopContext,
    }

    impl Harness {
        pub fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let store = Arc::new(SqliteStore::open(dir.path().join("pilot.db")).unwrap());
            let transport = Arc::new(RecordingTransport::default());
            let ctx = LoopContext {
                store: store.clone(),
                transport: transport.clone(),
                chat_id: CHAT,
                tz: chrono_tz::Europe::Moscow,
            };
            Self {
                dir,
                store,
                transport,
                ctx,
            }
        }

        pub fn add(&self, title: &str, due: Option<DateTime<Utc>>, priority: f64) -> TaskId {
            let mut t = NewTask::new(CHAT, title, priority, 30);
            t.due_at = due;
            self.store.insert_task(&t).unwrap()
        }
    }
}
