use anyhow::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;

use pilot_core::reminders::{overdue_message, ReminderPolicy, ReminderState};

use super::{poll_interval, LoopContext};

/// Overdue alerts, at most one per task per cooldown window.
pub struct ReminderDispatcher {
    ctx: LoopContext,
    state: ReminderState,
}

impl ReminderDispatcher {
    pub fn new(ctx: LoopContext, policy: ReminderPolicy) -> Self {
        Self {
            ctx,
            state: ReminderState::new(policy),
        }
    }

    #[cfg(test)]
    fn state(&self) -> &ReminderState {
        &self.state
    }

    /// One poll. Returns how many alerts were delivered.
    ///
    /// At most `batch` alerts go out per tick, oldest deadline first. Only a
    /// delivered alert starts the cooldown; a failed one is retried next tick.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let pruned = self.state.prune(now);
        if pruned > 0 {
            tracing::debug!(pruned, "reminder state pruned");
        }

        let overdue = self
            .ctx
            .with_store(move |s| Ok(s.list_overdue(now)?))
            .await?;
        let due: Vec<_> = overdue
            .into_iter()
            .filter(|t| self.state.should_alert(t, now))
            .take(self.state.policy().batch)
            .collect();

        let mut delivered = 0;
        for task in due {
            if self.ctx.notify(task.chat_id, &overdue_message(&task)).await {
                tracing::info!(id = task.id, "overdue alert sent");
                self.state.record(task.id, now);
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    pub async fn run(mut self, poll: Duration) {
        tracing::info!(every = ?poll, "reminder loop started");
        let mut ticker = poll_interval(poll);
        loop {
            ticker.tick().await;
            if let Err(e) = self.tick(Utc::now()).await {
                tracing::warn!(error = %e, "reminder tick failed");
            }
        }
    }
}
