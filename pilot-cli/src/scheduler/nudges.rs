use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use pilot_core::nudges::{commit_week_message, NudgeKind, NudgeSchedule, NudgeState};
use pilot_core::scoring::PriorityScorer;
use pilot_sync::{import_rows, ImportReport, SyncTarget};

use super::{poll_interval, LoopContext};

/// Fixed-time daily nudges. The early-morning one also pulls the week sheet.
pub struct NudgeScheduler {
    ctx: LoopContext,
    schedule: NudgeSchedule,
    state: NudgeState,
    sheet: Option<Arc<dyn SyncTarget>>,
    scorer: PriorityScorer,
}

impl NudgeScheduler {
    pub fn new(
        ctx: LoopContext,
        schedule: NudgeSchedule,
        sheet: Option<Arc<dyn SyncTarget>>,
        scorer: PriorityScorer,
    ) -> Self {
        Self {
            ctx,
            schedule,
            state: NudgeState::default(),
            sheet,
            scorer,
        }
    }

    /// One poll. Returns the kinds that were delivered.
    ///
    /// A plain nudge whose send fails stays due and is retried while its slot
    /// minute lasts. The commit-week nudge is marked once the sync has run, so
    /// the import is not repeated for a lost report.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<Vec<NudgeKind>> {
        let local = now.with_timezone(&self.ctx.tz).naive_local();
        let due = self.state.due(local, &self.schedule);

        let mut delivered = Vec::new();
        for kind in due {
            let text = match kind {
                NudgeKind::CommitWeek => {
                    let synced = self.commit_week(now).await;
                    self.state.mark_fired(local, kind);
                    match synced {
                        Ok(Some(report)) => commit_week_message(report.added, report.skipped),
                        Ok(None) => continue,
                        Err(e) => {
                            tracing::warn!(error = %e, "week sheet sync failed");
                            continue;
                        }
                    }
                }
                other => other.message().to_string(),
            };
            if self.ctx.notify(self.ctx.chat_id, &text).await {
                tracing::info!(kind = kind.as_str(), "nudge sent");
                self.state.mark_fired(local, kind);
                delivered.push(kind);
            }
        }
        Ok(delivered)
    }

    async fn commit_week(&self, now: DateTime<Utc>) -> Result<Option<ImportReport>> {
        let Some(sheet) = self.sheet.clone() else {
            tracing::debug!("no sheet configured; skipping week sync");
            return Ok(None);
        };
        let scorer = self.scorer.clone();
        let (chat_id, tz) = (self.ctx.chat_id, self.ctx.tz);

        let report = self
            .ctx
            .with_store(move |s| {
                let rows = sheet.pull_week().context("pull week sheet")?;
                Ok(import_rows(s, chat_id, &rows, &scorer, now, tz)?)
            })
            .await?;
        Ok(Some(report))
    }

    pub async fn run(mut self, poll: Duration) {
        tracing::info!(every = ?poll, "nudge loop started");
        let mut ticker = poll_interval(poll);
        loop {
            ticker.tick().await;
            if let Err(e) = self.tick(Utc::now()).await {
                tracing::warn!(error = %e, "nudge tick failed");
            }
        }
    }
}
