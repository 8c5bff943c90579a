use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;

use pilot_core::time::to_rfc3339_utc;

use crate::error::Result;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct TaskStats {
    pub total: u64,
    pub done: u64,
    pub open: u64,
    /// Open tasks with a deadline.
    pub with_deadline: u64,
    pub voice: u64,

    /// Added since the window start.
    pub added_week: u64,
    /// Added since the window start and already done.
    pub done_week: u64,
    /// done / (done + open) over the window's tasks, in percent, one decimal.
    pub productivity_pct: f64,

    /// Open tasks per context, largest first, at most five.
    pub top_contexts: Vec<(String, u64)>,
    pub db_size_bytes: u64,
}

pub fn task_stats(conn: &Connection, chat_id: i64, since: DateTime<Utc>) -> Result<TaskStats> {
    let mut stats = TaskStats::default();

    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'done' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'open' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'open' AND due_at IS NOT NULL THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN source = 'voice' THEN 1 ELSE 0 END), 0)
         FROM tasks WHERE chat_id = ?1",
        params![chat_id],
        |row| {
            stats.total = row.get::<_, i64>(0)? as u64;
            stats.done = row.get::<_, i64>(1)? as u64;
            stats.open = row.get::<_, i64>(2)? as u64;
            stats.with_deadline = row.get::<_, i64>(3)? as u64;
            stats.voice = row.get::<_, i64>(4)? as u64;
            Ok(())
        },
    )?;

    let (added, done, open) = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'done' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'open' THEN 1 ELSE 0 END), 0)
         FROM tasks WHERE chat_id = ?1 AND added_at >= ?2",
        params![chat_id, to_rfc3339_utc(since)],
        |row| {
            Ok((
                row.get::<_, i64>(0)? as u64,
                row.get::<_, i64>(1)? as u64,
                row.get::<_, i64>(2)? as u64,
            ))
        },
    )?;
    stats.added_week = added;
    stats.done_week = done;
    stats.productivity_pct = productivity(done, open);

    let mut stmt = conn.prepare(
        "SELECT COALESCE(context, 'other'), COUNT(*) AS n FROM tasks
         WHERE chat_id = ?1 AND status = 'open'
         GROUP BY context
         ORDER BY n DESC, context ASC
         LIMIT 5",
    )?;
    stats.top_contexts = stmt
        .query_map(params![chat_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(stats)
}

fn productivity(done: u64, open: u64) -> f64 {
    if done + open == 0 {
        return 0.0;
    }
    let pct = done as f64 / (done + open) as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}
