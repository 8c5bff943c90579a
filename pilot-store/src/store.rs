use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use pilot_core::task::{NewTask, Task, TaskId, TaskStatus};

use crate::connection::{init_db, open_db};
use crate::error::Result;
use crate::stats::{task_stats, TaskStats};
use crate::task_repo;

/// Storage seen by the interactive path and the background loops.
///
/// Every call is an independent, short-lived operation.
pub trait TaskStore: Send + Sync {
    fn insert_task(&self, task: &NewTask) -> Result<TaskId>;
    fn get_task(&self, chat_id: i64, id: TaskId) -> Result<Option<Task>>;

    /// Priority desc, id desc.
    fn list_open_tasks(&self, chat_id: i64) -> Result<Vec<Task>>;
    fn list_inbox(&self, chat_id: i64) -> Result<Vec<Task>>;
    fn list_today(
        &self,
        chat_id: i64,
        now: DateTime<Utc>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Task>>;
    /// Due asc, priority desc.
    fn list_tasks_due_in_window(
        &self,
        chat_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Task>>;
    /// Oldest deadline first; callers cap what they act on.
    fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Task>>;
    fn list_all(&self, chat_id: Option<i64>) -> Result<Vec<Task>>;

    fn mark_done(&self, chat_id: i64, id: TaskId) -> Result<bool>;
    fn mark_dropped(&self, chat_id: i64, id: TaskId) -> Result<bool>;
    fn update_due_at(
        &self,
        chat_id: i64,
        id: TaskId,
        new_due: DateTime<Utc>,
        new_priority: Option<f64>,
    ) -> Result<bool>;

    fn stats(&self, chat_id: i64, since: DateTime<Utc>) -> Result<TaskStats>;

    fn kv_get(&self, key: &str) -> Result<Option<String>>;
    fn kv_set(&self, key: &str, value: &str) -> Result<()>;
}

/// SQLite-backed store. Opens a connection per call.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Create the file and schema if missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        init_db(&path)?;
        tracing::debug!(db = %path.display(), "store ready");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }
}

impl TaskStore for SqliteStore {
    fn insert_task(&self, task: &NewTask) -> Result<TaskId> {
        let conn = open_db(&self.path)?;
        let id = task_repo::insert_task(&conn, task)?;
        tracing::info!(id, "task added");
        Ok(id)
    }

    fn get_task(&self, chat_id: i64, id: TaskId) -> Result<Option<Task>> {
        task_repo::get_task(&open_db(&self.path)?, chat_id, id)
    }

    fn list_open_tasks(&self, chat_id: i64) -> Result<Vec<Task>> {
        task_repo::list_open_tasks(&open_db(&self.path)?, chat_id)
    }

    fn list_inbox(&self, chat_id: i64) -> Result<Vec<Task>> {
        task_repo::list_inbox(&open_db(&self.path)?, chat_id)
    }

    fn list_today(
        &self,
        chat_id: i64,
        now: DateTime<Utc>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Task>> {
        task_repo::list_today(&open_db(&self.path)?, chat_id, now, start, end)
    }

    fn list_tasks_due_in_window(
        &self,
        chat_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Task>> {
        task_repo::list_due_in_window(&open_db(&self.path)?, chat_id, start, end)
    }

    fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        task_repo::list_overdue(&open_db(&self.path)?, now)
    }

    fn list_all(&self, chat_id: Option<i64>) -> Result<Vec<Task>> {
        task_repo::list_all(&open_db(&self.path)?, chat_id)
    }

    fn mark_done(&self, chat_id: i64, id: TaskId) -> Result<bool> {
        let ok = task_repo::close_task(&open_db(&self.path)?, chat_id, id, TaskStatus::Done)?;
        if ok {
            tracing::info!(id, "task done");
        }
        Ok(ok)
    }

    fn mark_dropped(&self, chat_id: i64, id: TaskId) -> Result<bool> {
        let ok = task_repo::close_task(&open_db(&self.path)?, chat_id, id, TaskStatus::Dropped)?;
        if ok {
            tracing::info!(id, "task dropped");
        }
        Ok(ok)
    }

    fn update_due_at(
        &self,
        chat_id: i64,
        id: TaskId,
        new_due: DateTime<Utc>,
        new_priority: Option<f64>,
    ) -> Result<bool> {
        let conn = open_db(&self.path)?;
        let ok = task_repo::update_due_at(&conn, chat_id, id, new_due, new_priority)?;
        if ok {
            tracing::info!(id, due = %new_due, "task rescheduled");
        }
        Ok(ok)
    }

    fn stats(&self, chat_id: i64, since: DateTime<Utc>) -> Result<TaskStats> {
        let mut stats = task_stats(&open_db(&self.path)?, chat_id, since)?;
        stats.db_size_bytes = self.size_bytes();
        Ok(stats)
    }

    fn kv_get(&self, key: &str) -> Result<Option<String>> {
        task_repo::kv_get(&open_db(&self.path)?, key)
    }

    fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        task_repo::kv_set(&open_db(&self.path)?, key, value)
    }
}
