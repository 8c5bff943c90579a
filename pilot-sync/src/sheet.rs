//! Sheet targets. `CsvSheet` keeps each table as a CSV file in one directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Result, SyncError};
use crate::rows::{DayRow, ImportRow, PlanRow, WeekTaskRow};

pub const WEEK_TASKS: &str = "Week_Tasks.csv";
pub const DAYS: &str = "Days.csv";
pub const TODAY: &str = "Today.csv";

/// Where plan data is pushed to and pulled back from.
pub trait SyncTarget: Send + Sync {
    /// Replace today's plan table. Returns rows written.
    fn push_plan(&self, rows: &[PlanRow]) -> Result<usize>;

    /// Replace the week tables. Returns (week rows, day rows) written.
    fn push_week(&self, week: &[WeekTaskRow], days: &[DayRow]) -> Result<(usize, usize)>;

    /// Rows of the week table with a non-empty title.
    fn pull_week(&self) -> Result<Vec<ImportRow>>;
}

#[derive(Debug, Clone)]
pub struct CsvSheet {
    dir: PathBuf,
}

impl CsvSheet {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_table<T: Serialize>(&self, name: &str, rows: &[T]) -> Result<usize> {
        fs::create_dir_all(&self.dir).map_err(|source| SyncError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.dir.join(name);
        let csv_err = |source| SyncError::Csv {
            path: path.clone(),
            source,
        };

        let mut w = csv::Writer::from_path(&path).map_err(csv_err)?;
        for row in rows {
            w.serialize(row).map_err(csv_err)?;
        }
        w.flush().map_err(|source| SyncError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(file = %path.display(), rows = rows.len(), "sheet written");
        Ok(rows.len())
    }
}

impl SyncTarget for CsvSheet {
    fn push_plan(&self, rows: &[PlanRow]) -> Result<usize> {
        self.write_table(TODAY, rows)
    }

    fn push_week(&self, week: &[WeekTaskRow], days: &[DayRow]) -> Result<(usize, usize)> {
        let w = self.write_table(WEEK_TASKS, week)?;
        let d = self.write_table(DAYS, days)?;
        Ok((w, d))
    }

    fn pull_week(&self) -> Result<Vec<ImportRow>> {
        let path = self.dir.join(WEEK_TASKS);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|source| SyncError::Csv {
                path: path.clone(),
                source,
            })?;

        let mut out = Vec::new();
        for (i, rec) in rdr.deserialize::<WeekTaskRow>().enumerate() {
            match rec {
                Ok(row) => {
                    let row = ImportRow::from(row);
                    if !row.title.is_empty() {
                        out.push(row);
                    }
                }
                Err(e) => tracing::warn!(line = i + 2, error = %e, "skipping unreadable sheet row"),
            }
        }
        Ok(out)
    }
}
