//! Row shapes exchanged with the sheet.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use pilot_core::task::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Frog,
    Stone,
    Sand,
}

/// One allocated plan entry, the canonical shape handed to sync targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRow {
    pub bucket: Bucket,
    pub title: String,
    pub context: String,
    /// Local calendar date of the deadline.
    pub due_date: Option<NaiveDate>,
    pub priority: f64,
    pub est_minutes: Option<i32>,
}

/// `Week_Tasks` sheet row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeekTaskRow {
    #[serde(rename = "Direction", default)]
    pub direction: String,
    #[serde(rename = "Task", default)]
    pub task: String,
    #[serde(rename = "Outcome", default)]
    pub outcome: String,
    #[serde(rename = "Deadline", default)]
    pub deadline: String,
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(
        rename = "Progress_%",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    pub progress: Option<u32>,
    #[serde(rename = "Notes", default)]
    pub notes: String,
}

/// `Days` sheet row: Frog and two Stones per day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Day")]
    pub day: String,
    #[serde(rename = "Frog")]
    pub frog: String,
    #[serde(rename = "Frog_Done")]
    pub frog_done: bool,
    #[serde(rename = "Stone1")]
    pub stone1: String,
    #[serde(rename = "Stone1_Done")]
    pub stone1_done: bool,
    #[serde(rename = "Stone2")]
    pub stone2: String,
    #[serde(rename = "Stone2_Done")]
    pub stone2_done: bool,
    #[serde(rename = "Sand")]
    pub sand: String,
}

/// A row read back from the sheet, ready to become a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportRow {
    pub title: String,
    pub context: String,
    /// Raw deadline text; parsed in the owner's timezone on import.
    pub due: Option<String>,
    pub outcome: String,
    /// Set when the row was pushed from an existing task (`task_id=N` in Notes).
    pub task_id: Option<TaskId>,
}

impl From<WeekTaskRow> for ImportRow {
    fn from(r: WeekTaskRow) -> Self {
        let due = Some(r.deadline.trim().to_string()).filter(|d| !d.is_empty());
        Self {
            title: r.task.trim().to_string(),
            context: r.direction.trim().to_string(),
            due,
            outcome: r.outcome.trim().to_string(),
            task_id: task_id_from_notes(&r.notes),
        }
    }
}

/// Reads the `task_id=N` marker written by `week_rows`.
pub fn task_id_from_notes(notes: &str) -> Option<TaskId> {
    notes
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .find_map(|tok| tok.strip_prefix("task_id="))
        .and_then(|id| id.parse().ok())
}
