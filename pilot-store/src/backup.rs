//! Database snapshots: `VACUUM INTO` a timestamped file, keep a bounded
//! history.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use rusqlite::params;
use serde::Serialize;

use crate::connection::open_db;
use crate::error::{Result, StoreError};

const PREFIX: &str = "daily_pilot_backup_";
const STAMP: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupInfo {
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    /// Taken from the file name.
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Backups {
    db_path: PathBuf,
    dir: PathBuf,
    retention_days: i64,
}

impl Backups {
    pub fn new(db_path: impl Into<PathBuf>, dir: impl Into<PathBuf>, retention_days: i64) -> Self {
        Self {
            db_path: db_path.into(),
            dir: dir.into(),
            retention_days,
        }
    }

    /// `<db dir>/backups`.
    pub fn default_dir(db_path: &Path) -> PathBuf {
        db_path
            .parent()
            .map(|p| p.join("backups"))
            .unwrap_or_else(|| PathBuf::from("backups"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot the database. `None` when there is no database file yet.
    pub fn create_backup(&self, now: DateTime<Utc>) -> Result<Option<PathBuf>> {
        if !self.db_path.exists() {
            tracing::warn!(db = %self.db_path.display(), "database file not found, skipping backup");
            return Ok(None);
        }
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let target = self
            .dir
            .join(format!("{PREFIX}{}.db", now.format(STAMP)));
        if target.exists() {
            fs::remove_file(&target).map_err(|e| StoreError::io(&target, e))?;
        }

        let conn = open_db(&self.db_path)?;
        let target_str = target
            .to_str()
            .ok_or_else(|| StoreError::validation("backup path is not valid UTF-8"))?;
        conn.execute("VACUUM INTO ?1", params![target_str])?;
        tracing::info!(path = %target.display(), "backup created");

        let removed = self.cleanup(now)?;
        if removed > 0 {
            tracing::info!(removed, "old backups removed");
        }
        Ok(Some(target))
    }

    /// Delete backups older than the retention window.
    pub fn cleanup(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - Duration::days(self.retention_days);
        let mut removed = 0;
        for b in self.scan()? {
            if b.created < cutoff {
                fs::remove_file(&b.path).map_err(|e| StoreError::io(&b.path, e))?;
                tracing::debug!(file = %b.filename, "removed old backup");
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Newest first.
    pub fn list_backups(&self, limit: usize) -> Result<Vec<BackupInfo>> {
        let mut all = self.scan()?;
        all.sort_by(|a, b| b.created.cmp(&a.created));
        all.truncate(limit);
        Ok(all)
    }

    pub fn latest(&self) -> Result<Option<BackupInfo>> {
        Ok(self.list_backups(1)?.into_iter().next())
    }

    fn scan(&self) -> Result<Vec<BackupInfo>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let filename = entry.file_name().to_string_lossy().into_owned();
            let Some(created) = parse_stamp(&filename) else {
                continue;
            };
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            out.push(BackupInfo {
                filename,
                path: entry.path(),
                size,
                created,
            });
        }
        Ok(out)
    }
}

fn parse_stamp(filename: &str) -> Option<DateTime<Utc>> {
    let stamp = filename.strip_prefix(PREFIX)?.strip_suffix(".db")?;
    let ndt = NaiveDateTime::parse_from_str(stamp, STAMP).ok()?;
    Some(Utc.from_utc_datetime(&ndt))
}
