//! Idempotent import of sheet rows as tasks.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use pilot_core::dedupe::normalize_title;
use pilot_core::scoring::{estimate_minutes, PriorityScorer};
use pilot_core::task::{truncate_title, ContextTag, NewTask, TaskId, TaskSource};
use pilot_core::time::parse_human_due;
use pilot_store::TaskStore;

use crate::error::Result;
use crate::rows::ImportRow;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub added: usize,
    pub skipped: usize,
}

/// (context, title, due day or "none"), all normalized.
pub type ImportKey = (String, String, String);

pub fn import_key(context: &ContextTag, title: &str, due_day: Option<NaiveDate>) -> ImportKey {
    (
        context.as_str().trim().to_lowercase(),
        normalize_title(title),
        due_day.map_or_else(|| "none".to_string(), |d| d.format("%Y-%m-%d").to_string()),
    )
}

/// Create tasks for rows whose key is not already among the owner's tasks
/// (any status) or earlier in the same batch. A row carrying the id of one of
/// the owner's tasks is that task and is skipped.
pub fn import_rows(
    store: &dyn TaskStore,
    chat_id: i64,
    rows: &[ImportRow],
    scorer: &PriorityScorer,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<ImportReport> {
    let existing = store.list_all(Some(chat_id))?;
    let known_ids: HashSet<TaskId> = existing.iter().map(|t| t.id).collect();
    let mut known: HashSet<ImportKey> = existing
        .iter()
        .map(|t| {
            import_key(
                &t.context,
                &t.title,
                t.due_at.map(|d| d.with_timezone(&tz).date_naive()),
            )
        })
        .collect();

    let mut report = ImportReport::default();
    for row in rows {
        let title = truncate_title(&row.title);
        if title.is_empty() || row.task_id.is_some_and(|id| known_ids.contains(&id)) {
            report.skipped += 1;
            continue;
        }
        let title = title.as_str();
        let context = ContextTag::parse(&row.context);
        let due = row
            .due
            .as_deref()
            .and_then(|d| parse_human_due(d, now, tz));
        let key = import_key(&context, title, due.map(|d| d.with_timezone(&tz).date_naive()));

        if !known.insert(key) {
            tracing::debug!(title, "already imported");
            report.skipped += 1;
            continue;
        }

        let est = estimate_minutes(title);
        let mut task = NewTask::new(chat_id, title, scorer.score_at(title, due, est, now), est);
        task.description = row.outcome.clone();
        task.context = context;
        task.due_at = due;
        task.added_at = now;
        task.source = TaskSource::Import;

        store.insert_task(&task)?;
        report.added += 1;
    }

    tracing::info!(added = report.added, skipped = report.skipped, "sheet import finished");
    Ok(report)
}
