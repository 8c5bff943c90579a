use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use pilot_core::task::{ContextTag, NewTask, Task, TaskId, TaskSource, TaskStatus};
use pilot_core::time::{parse_stored_instant, to_rfc3339_utc};

use crate::error::Result;

const TASK_COLUMNS: &str = "id, chat_id, title, description, context, due_at, added_at, status,
                priority, est_minutes, source";

pub fn insert_task(conn: &Connection, task: &NewTask) -> Result<TaskId> {
    conn.execute(
        "INSERT INTO tasks (chat_id, title, description, context, due_at, added_at, status,
                            priority, est_minutes, source)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'open', ?7, ?8, ?9)",
        params![
            task.chat_id,
            pilot_core::task::truncate_title(&task.title),
            task.description,
            task.context.as_str(),
            task.due_at.map(to_rfc3339_utc),
            to_rfc3339_utc(task.added_at),
            task.priority.clamp(0.0, 100.0),
            task.est_minutes,
            task.source.as_str(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_task(conn: &Connection, chat_id: i64, id: TaskId) -> Result<Option<Task>> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE chat_id = ?1 AND id = ?2");
    let task = conn
        .query_row(&sql, params![chat_id, id], row_to_task)
        .optional()?;
    Ok(task)
}

fn query_tasks(conn: &Connection, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(sql)?;
    let tasks = stmt
        .query_map(args, row_to_task)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(tasks)
}

pub fn list_open_tasks(conn: &Connection, chat_id: i64) -> Result<Vec<Task>> {
    let sql = format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE chat_id = ?1 AND status = 'open'
         ORDER BY priority DESC, id DESC"
    );
    query_tasks(conn, &sql, params![chat_id])
}

pub fn list_inbox(conn: &Connection, chat_id: i64) -> Result<Vec<Task>> {
    let sql = format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE chat_id = ?1 AND status = 'open' AND (due_at IS NULL OR due_at = '')
         ORDER BY priority DESC, id DESC"
    );
    query_tasks(conn, &sql, params![chat_id])
}

/// Open tasks already overdue at `now` or due inside `[start, end)`.
pub fn list_today(
    conn: &Connection,
    chat_id: i64,
    now: DateTime<Utc>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Task>> {
    let sql = format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE chat_id = ?1 AND status = 'open' AND due_at IS NOT NULL
           AND (due_at < ?2 OR (due_at >= ?3 AND due_at < ?4))
         ORDER BY priority DESC, id DESC"
    );
    let rows = query_tasks(
        conn,
        &sql,
        params![chat_id, to_rfc3339_utc(now), to_rfc3339_utc(start), to_rfc3339_utc(end)],
    )?;
    Ok(rows.into_iter().filter(|t| t.due_at.is_some()).collect())
}

pub fn list_due_in_window(
    conn: &Connection,
    chat_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Task>> {
    let sql = format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE chat_id = ?1 AND status = 'open' AND due_at IS NOT NULL
           AND due_at >= ?2 AND due_at < ?3
         ORDER BY due_at ASC, priority DESC"
    );
    let rows = query_tasks(
        conn,
        &sql,
        params![chat_id, to_rfc3339_utc(start), to_rfc3339_utc(end)],
    )?;
    Ok(rows.into_iter().filter(|t| t.due_at.is_some()).collect())
}

/// Every overdue open task of every owner, oldest deadline first. Rows whose
/// deadline does not parse are left out.
pub fn list_overdue(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<Task>> {
    let sql = format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE status = 'open' AND due_at IS NOT NULL AND due_at <= ?1
         ORDER BY due_at ASC"
    );
    let rows = query_tasks(conn, &sql, params![to_rfc3339_utc(now)])?;
    Ok(rows
        .into_iter()
        .filter(|t| t.due_at.is_some_and(|d| d <= now))
        .collect())
}

pub fn list_all(conn: &Connection, chat_id: Option<i64>) -> Result<Vec<Task>> {
    match chat_id {
        Some(chat) => {
            let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE chat_id = ?1 ORDER BY id");
            query_tasks(conn, &sql, params![chat])
        }
        None => {
            let sql = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id");
            query_tasks(conn, &sql, [])
        }
    }
}

/// Move an open task to a terminal status. False when nothing matched.
pub fn close_task(conn: &Connection, chat_id: i64, id: TaskId, status: TaskStatus) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE tasks SET status = ?1 WHERE chat_id = ?2 AND id = ?3 AND status = 'open'",
        params![status.as_str(), chat_id, id],
    )?;
    Ok(changed > 0)
}

/// Reschedule an open task; the priority is replaced when given.
pub fn update_due_at(
    conn: &Connection,
    chat_id: i64,
    id: TaskId,
    new_due: DateTime<Utc>,
    new_priority: Option<f64>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE tasks SET due_at = ?1, priority = COALESCE(?2, priority)
         WHERE chat_id = ?3 AND id = ?4 AND status = 'open'",
        params![
            to_rfc3339_utc(new_due),
            new_priority.map(|p| p.clamp(0.0, 100.0)),
            chat_id,
            id
        ],
    )?;
    Ok(changed > 0)
}

/// Stored values are read leniently: bad instants become `None`, unknown
/// statuses read as open, non-positive estimates as missing.
fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let due_at: Option<String> = row.get(5)?;
    let added_at: Option<String> = row.get(6)?;
    let status: Option<String> = row.get(7)?;
    let priority: Option<f64> = row.get(8)?;
    let est: Option<i64> = row.get(9)?;
    let source: Option<String> = row.get(10)?;

    Ok(Task {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        context: ContextTag::parse(&row.get::<_, Option<String>>(4)?.unwrap_or_default()),
        due_at: due_at.as_deref().and_then(parse_stored_instant),
        added_at: added_at
            .as_deref()
            .and_then(parse_stored_instant)
            .unwrap_or_default(),
        status: TaskStatus::parse(status.as_deref().unwrap_or("open")),
        priority: priority.unwrap_or(0.0).clamp(0.0, 100.0),
        est_minutes: est
            .filter(|m| *m > 0)
            .and_then(|m| i32::try_from(m).ok()),
        source: TaskSource::parse(source.as_deref().unwrap_or("text")),
    })
}

pub fn kv_get(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(value)
}

pub fn kv_set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value],
    )?;
    Ok(())
}
