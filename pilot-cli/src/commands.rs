//! The interactive path: one store call (or a few) per command, rendered to text.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::path::{Path, PathBuf};

use pilot_core::dedupe::Deduplicator;
use pilot_core::planner::{render_inbox, render_plan, render_week, SAND_DISPLAY_LIMIT};
use pilot_core::scoring::{estimate_minutes, PriorityScorer};
use pilot_core::task::{ContextTag, NewTask, Task, TaskId, TaskSource};
use pilot_core::time::{parse_human_due, to_rfc3339_utc, week_start};
use pilot_store::{Backups, SqliteStore, TaskStore, WEEKLY_REVIEW_MANUAL_KEY};
use pilot_sync::{
    day_rows, import_rows, plan_rows, week_rows, CsvSheet, SyncTarget, DEFAULT_PER_CONTEXT,
};

use crate::config::Config;
use crate::scheduler::{plan_for_today, weekly_summary};

pub struct App {
    pub store: SqliteStore,
    pub backups: Backups,
    pub sheet: CsvSheet,
    pub scorer: PriorityScorer,
    pub dedup: Deduplicator,
    pub chat_id: i64,
    pub tz: Tz,
}

/// Options of `pilot add` beyond the title.
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    pub due: Option<String>,
    pub context: Option<String>,
    pub source: Option<String>,
    pub description: Option<String>,
}

impl App {
    pub fn open(cfg: &Config) -> Result<Self> {
        let db_path = cfg.db_path()?;
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("open database {}", db_path.display()))?;
        Ok(Self {
            backups: cfg.backups(&db_path),
            store,
            sheet: CsvSheet::new(cfg.sheet_dir()?),
            scorer: PriorityScorer::new(cfg.scoring.clone()),
            dedup: Deduplicator::default(),
            chat_id: cfg.general.chat_id,
            tz: cfg.tz()?,
        })
    }

    fn due_from(&self, text: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        match parse_human_due(text, now, self.tz) {
            Some(due) => Ok(due),
            None => bail!(
                "could not understand due time {text:?} (try \"2026-03-10 18:00\", \"завтра 10:00\", \"in 2 hours\")"
            ),
        }
    }

    fn open_task(&self, id: TaskId) -> Result<Task> {
        match self.store.get_task(self.chat_id, id)? {
            Some(t) if t.is_open() => Ok(t),
            Some(t) if t.status.is_terminal() => {
                bail!("task #{id} is already {}", t.status.as_str())
            }
            Some(t) => bail!("task #{id} is {} and cannot be changed", t.status.as_str()),
            None => bail!("task #{id} not found"),
        }
    }

    pub fn add(&self, title: &str, opts: &AddOptions, now: DateTime<Utc>) -> Result<String> {
        if title.trim().is_empty() {
            bail!("title is empty");
        }
        let due = opts
            .due
            .as_deref()
            .map(|d| self.due_from(d, now))
            .transpose()?;
        let est = estimate_minutes(title);

        let mut task = NewTask::new(self.chat_id, title, self.scorer.score_at(title, due, est, now), est);
        task.due_at = due;
        task.added_at = now;
        task.context = opts.context.as_deref().map(ContextTag::parse).unwrap_or_default();
        task.source = opts.source.as_deref().map(TaskSource::parse).unwrap_or(TaskSource::Text);
        task.description = opts.description.clone().unwrap_or_default();

        let id = self.store.insert_task(&task)?;
        let due_label = due
            .map(|d| d.with_timezone(&self.tz).format("%d.%m %H:%M").to_string())
            .unwrap_or_else(|| "—".to_string());
        Ok(format!(
            "✅ Added #{id}: {}\n🗓 {due_label} • [{}] • ⏱~{est}m • ⚡{}",
            task.title,
            task.context,
            task.priority.trunc() as i64
        ))
    }

    pub fn inbox(&self) -> Result<String> {
        Ok(render_inbox(&self.store.list_inbox(self.chat_id)?))
    }

    pub fn plan(&self, now: DateTime<Utc>) -> Result<String> {
        let (plan, superseded) = plan_for_today(&self.store, self.chat_id, now, self.tz, &self.dedup)?;
        let mut out = render_plan(&plan, self.tz, SAND_DISPLAY_LIMIT);
        if !superseded.is_empty() {
            out.push_str(&format!("\n\n({} duplicate(s) hidden)", superseded.len()));
        }
        Ok(out)
    }

    pub fn week(&self, now: DateTime<Utc>) -> Result<String> {
        let tasks = self
            .store
            .list_tasks_due_in_window(self.chat_id, now, now + Duration::days(7))?;
        Ok(render_week(&tasks, self.tz))
    }

    pub fn done(&self, id: TaskId) -> Result<String> {
        let task = self.open_task(id)?;
        if !self.store.mark_done(self.chat_id, id)? {
            bail!("task #{id} could not be closed");
        }
        Ok(format!("✅ Done: #{id} {}", task.title))
    }

    pub fn drop_task(&self, id: TaskId) -> Result<String> {
        let task = self.open_task(id)?;
        if !self.store.mark_dropped(self.chat_id, id)? {
            bail!("task #{id} could not be dropped");
        }
        Ok(format!("🗑 Dropped: #{id} {}", task.title))
    }

    /// Move the deadline and re-score for it.
    pub fn snooze(&self, id: TaskId, when: &str, now: DateTime<Utc>) -> Result<String> {
        let task = self.open_task(id)?;
        let due = self.due_from(when, now)?;
        let est = task
            .est_minutes
            .unwrap_or_else(|| estimate_minutes(&task.title));
        let priority = self.scorer.score_at(&task.title, Some(due), est, now);

        if !self.store.update_due_at(self.chat_id, id, due, Some(priority))? {
            bail!("task #{id} could not be rescheduled");
        }
        Ok(format!(
            "⏰ Snoozed #{id} to {} • ⚡{}",
            due.with_timezone(&self.tz).format("%d.%m %H:%M"),
            priority.trunc() as i64
        ))
    }

    /// Whole table as CSV. Returns the number of rows written.
    pub fn export(&self, out: &Path) -> Result<usize> {
        #[derive(Serialize)]
        struct ExportRow<'a> {
            id: TaskId,
            chat_id: i64,
            title: &'a str,
            description: &'a str,
            context: &'a str,
            due_at: Option<String>,
            added_at: String,
            status: &'a str,
            priority: f64,
            est_minutes: Option<i32>,
            source: &'a str,
        }

        let tasks = self.store.list_all(None)?;
        let mut w = csv::Writer::from_path(out).with_context(|| format!("create {}", out.display()))?;
        for t in &tasks {
            w.serialize(ExportRow {
                id: t.id,
                chat_id: t.chat_id,
                title: &t.title,
                description: &t.description,
                context: t.context.as_str(),
                due_at: t.due_at.map(to_rfc3339_utc),
                added_at: to_rfc3339_utc(t.added_at),
                status: t.status.as_str(),
                priority: t.priority,
                est_minutes: t.est_minutes,
                source: t.source.as_str(),
            })
            .context("write export row")?;
        }
        w.flush().with_context(|| format!("write {}", out.display()))?;
        Ok(tasks.len())
    }

    pub fn stats(&self, now: DateTime<Utc>) -> Result<String> {
        let s = self.store.stats(self.chat_id, now - Duration::days(7))?;
        let mut lines = vec![
            "📊 Stats".to_string(),
            format!("Total: {} • Done: {} • Open: {}", s.total, s.done, s.open),
            format!("With deadline: {} • From voice: {}", s.with_deadline, s.voice),
            format!("Last 7 days: +{} added, {} done", s.added_week, s.done_week),
            format!("⚡ Productivity: {:.1}%", s.productivity_pct),
        ];
        if !s.top_contexts.is_empty() {
            let top: Vec<String> = s
                .top_contexts
                .iter()
                .map(|(c, n)| format!("{c} ({n})"))
                .collect();
            lines.push(format!("Top contexts: {}", top.join(", ")));
        }
        lines.push(format!("DB size: {}", human_size(s.db_size_bytes)));
        Ok(lines.join("\n"))
    }

    pub fn health(&self, transport: &str) -> Result<String> {
        let db = self.store.path();
        let latest = match self.backups.latest()? {
            Some(b) => format!("{} ({})", b.filename, human_size(b.size)),
            None => "none".to_string(),
        };
        Ok([
            format!("build: {} ({})", env!("CARGO_PKG_VERSION"), env!("PILOT_BUILD_SHA")),
            format!("timezone: {}", self.tz),
            format!(
                "database: {} ({})",
                db.display(),
                if db.exists() { human_size(self.store.size_bytes()) } else { "missing".to_string() }
            ),
            format!("latest backup: {latest}"),
            format!("transport: {transport}"),
        ]
        .join("\n"))
    }

    /// Render the weekly summary now and mark today as reviewed by hand so
    /// the daemon skips its automatic report.
    pub fn review(&self, now: DateTime<Utc>) -> Result<String> {
        let summary = weekly_summary(&self.store, self.chat_id, now)?;
        let today = now.with_timezone(&self.tz).date_naive();
        self.store
            .kv_set(WEEKLY_REVIEW_MANUAL_KEY, &today.format("%Y-%m-%d").to_string())?;
        tracing::info!(%today, "manual weekly review recorded");
        Ok(summary.render(now, self.tz))
    }

    pub fn backup_create(&self, now: DateTime<Utc>) -> Result<Option<PathBuf>> {
        Ok(self.backups.create_backup(now)?)
    }

    pub fn backup_list(&self, limit: usize) -> Result<String> {
        let list = self.backups.list_backups(limit)?;
        if list.is_empty() {
            return Ok(format!("No backups in {}", self.backups.dir().display()));
        }
        let lines: Vec<String> = list
            .iter()
            .map(|b| {
                format!(
                    "{} • {} • {}",
                    b.filename,
                    human_size(b.size),
                    b.created.with_timezone(&self.tz).format("%Y-%m-%d %H:%M")
                )
            })
            .collect();
        Ok(lines.join("\n"))
    }

    /// Today's plan and this week's layout out to the sheet.
    pub fn sync_push(&self, now: DateTime<Utc>) -> Result<String> {
        let (plan, _) = plan_for_today(&self.store, self.chat_id, now, self.tz, &self.dedup)?;
        let planned = self.sheet.push_plan(&plan_rows(&plan, self.tz))?;

        let monday = week_start(now.with_timezone(&self.tz).date_naive());
        let open = self.store.list_open_tasks(self.chat_id)?;
        let week = week_rows(&open, monday, self.tz, DEFAULT_PER_CONTEXT);
        let (w, d) = self.sheet.push_week(&week, &day_rows(&week, monday))?;
        Ok(format!(
            "📤 Pushed to {}: {planned} plan row(s), {w} week task(s), {d} day(s)",
            self.sheet.dir().display()
        ))
    }

    pub fn sync_pull(&self, now: DateTime<Utc>) -> Result<String> {
        let rows = self.sheet.pull_week()?;
        let report = import_rows(&self.store, self.chat_id, &rows, &self.scorer, now, self.tz)?;
        Ok(format!(
            "📥 Imported {} new task(s), {} already known",
            report.added, report.skipped
        ))
    }
}

fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / KB / KB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pilot_core::task::TaskStatus;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
    }

    fn app(dir: &TempDir) -> App {
        let mut cfg = Config::default();
        cfg.general.chat_id = 7;
        cfg.general.db_path = Some(dir.path().join("pilot.db"));
        cfg.sync.dir = Some(dir.path().join("sheets"));
        App::open(&cfg).unwrap()
    }

    fn opts(due: &str) -> AddOptions {
        AddOptions {
            due: Some(due.to_string()),
            ..AddOptions::default()
        }
    }

    #[test]
    fn add_scores_and_stores() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        // 13:00 Moscow is one hour after now.
        let out = app.add("Позвонить клиенту", &opts("13:00"), now()).unwrap();
        assert!(out.starts_with("✅ Added #1"));
        assert!(out.contains("⚡55"));

        let t = app.store.get_task(7, 1).unwrap().unwrap();
        assert_eq!(t.est_minutes, Some(15));
        assert_eq!(t.due_at, Some(now() + Duration::hours(1)));
    }

    #[test]
    fn add_rejects_unparseable_due() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        assert!(app.add("x", &opts("someday maybe"), now()).is_err());
        assert!(app.add("x", &opts("in 999999999999 days"), now()).is_err());
        assert!(app.store.list_all(None).unwrap().is_empty());
    }

    #[test]
    fn snooze_moves_and_rescores() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        app.add("Сдать отчёт", &opts("13:00"), now()).unwrap();
        let before = app.store.get_task(7, 1).unwrap().unwrap();

        app.snooze(1, "in 3 days", now()).unwrap();
        let after = app.store.get_task(7, 1).unwrap().unwrap();
        assert_eq!(after.due_at, Some(now() + Duration::days(3)));
        assert!(after.priority < before.priority);
        assert_eq!(after.status, TaskStatus::Open);
    }

    #[test]
    fn closed_tasks_reject_transitions() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        app.add("Deploy", &AddOptions::default(), now()).unwrap();
        app.done(1).unwrap();
        let err = app.done(1).unwrap_err().to_string();
        assert_eq!(err, "task #1 is already done");
        assert!(app.drop_task(1).is_err());
        assert!(app.snooze(1, "завтра", now()).is_err());
        assert!(app.done(99).is_err());
    }

    #[test]
    fn review_sets_manual_mark() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        let text = app.review(now()).unwrap();
        assert!(text.contains("Weekly review"));
        assert_eq!(
            app.store.kv_get(WEEKLY_REVIEW_MANUAL_KEY).unwrap().as_deref(),
            Some("2026-03-10")
        );
    }

    #[test]
    fn push_then_pull_adds_nothing() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        app.add("Deploy", &opts("завтра 10:00"), now()).unwrap();
        app.add("Run 5k", &AddOptions::default(), now()).unwrap();

        app.sync_push(now()).unwrap();
        assert!(dir.path().join("sheets/Today.csv").exists());

        assert_eq!(app.sync_pull(now()).unwrap(), "📥 Imported 0 new task(s), 2 already known");
        assert_eq!(app.sync_pull(now()).unwrap(), "📥 Imported 0 new task(s), 2 already known");
        assert_eq!(app.store.list_all(None).unwrap().len(), 2);
    }

    #[test]
    fn export_writes_every_row() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        app.add("a", &AddOptions::default(), now()).unwrap();
        app.add("b", &opts("2026-03-12"), now()).unwrap();
        app.drop_task(1).unwrap();

        let out = dir.path().join("tasks.csv");
        assert_eq!(app.export(&out).unwrap(), 2);
        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.starts_with("id,chat_id,title"));
        assert!(text.contains("dropped"));
    }

    #[test]
    fn sizes_are_human() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MB");
    }
}
