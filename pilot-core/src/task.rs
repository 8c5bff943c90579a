//! Task model shared by the scorer, the planner and the storage layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum stored title length, in characters.
pub const MAX_TITLE_CHARS: usize = 200;

pub type TaskId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    Done,
    Snoozed,
    Dropped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Done => "done",
            Self::Snoozed => "snoozed",
            Self::Dropped => "dropped",
        }
    }

    /// Unknown values read back as `Open` so a hand-edited row never disappears.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "done" => Self::Done,
            "snoozed" => Self::Snoozed,
            "dropped" => Self::Dropped,
            _ => Self::Open,
        }
    }

    /// Done and dropped are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Dropped)
    }
}

/// Where a task came from. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    Text,
    Voice,
    Import,
    Generated,
}

impl TaskSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
            Self::Import => "import",
            Self::Generated => "generated",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "voice" => Self::Voice,
            "import" | "sheets" => Self::Import,
            "generated" | "planner" => Self::Generated,
            _ => Self::Text,
        }
    }
}

/// Context label. The fixed set covers the usual life areas; anything else is
/// kept verbatim in `Custom`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextTag {
    Work,
    Home,
    Health,
    Family,
    Finance,
    System,
    #[default]
    Other,
    Custom(String),
}

impl ContextTag {
    pub fn parse(s: &str) -> Self {
        let t = s.trim();
        match t.to_lowercase().as_str() {
            "" | "other" | "другое" => Self::Other,
            "work" | "работа" => Self::Work,
            "home" | "дом" => Self::Home,
            "health" | "здоровье" => Self::Health,
            "family" | "семья" => Self::Family,
            "finance" | "финансы" => Self::Finance,
            "system" => Self::System,
            _ => Self::Custom(t.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Work => "work",
            Self::Home => "home",
            Self::Health => "health",
            Self::Family => "family",
            Self::Finance => "finance",
            Self::System => "system",
            Self::Other => "other",
            Self::Custom(s) => s.as_str(),
        }
    }
}

impl fmt::Display for ContextTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Owner / recipient of reminders for this task.
    pub chat_id: i64,
    pub title: String,
    pub description: String,
    pub context: ContextTag,

    /// Deadline (UTC). `None` means inbox item.
    pub due_at: Option<DateTime<Utc>>,
    pub added_at: DateTime<Utc>,

    pub status: TaskStatus,

    /// 0..=100, see `scoring::score_at`.
    pub priority: f64,

    /// Minutes. `None` when the stored estimate is missing or unusable.
    pub est_minutes: Option<i32>,

    pub source: TaskSource,
}

impl Task {
    pub fn new(id: TaskId, title: impl Into<String>) -> Self {
        Self {
            id,
            chat_id: 0,
            title: truncate_title(&title.into()),
            description: String::new(),
            context: ContextTag::Other,
            due_at: None,
            added_at: Utc::now(),
            status: TaskStatus::Open,
            priority: 0.0,
            est_minutes: Some(30),
            source: TaskSource::Text,
        }
    }

    pub fn with_due(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority.clamp(0.0, 100.0);
        self
    }

    pub fn with_estimate(mut self, minutes: i32) -> Self {
        self.est_minutes = Some(minutes);
        self
    }

    pub fn with_context(mut self, context: ContextTag) -> Self {
        self.context = context;
        self
    }

    pub fn is_open(&self) -> bool {
        self.status == TaskStatus::Open
    }
}

/// Fields supplied by the ingestion path; storage assigns id and status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub chat_id: i64,
    pub title: String,
    pub description: String,
    pub context: ContextTag,
    pub due_at: Option<DateTime<Utc>>,
    pub added_at: DateTime<Utc>,
    pub priority: f64,
    pub est_minutes: i32,
    pub source: TaskSource,
}

impl NewTask {
    /// Build a draft with title truncation and clamped priority applied.
    pub fn new(chat_id: i64, title: &str, priority: f64, est_minutes: i32) -> Self {
        Self {
            chat_id,
            title: truncate_title(title),
            description: String::new(),
            context: ContextTag::Other,
            due_at: None,
            added_at: Utc::now(),
            priority: priority.clamp(0.0, 100.0),
            est_minutes,
            source: TaskSource::Text,
        }
    }
}

/// Trim and cut a title to `MAX_TITLE_CHARS` characters (not bytes).
pub fn truncate_title(title: &str) -> String {
    title.trim().chars().take(MAX_TITLE_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_truncated_on_char_boundary() {
        let long = "я".repeat(300);
        let t = truncate_title(&long);
        assert_eq!(t.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn context_tag_falls_back_to_custom() {
        assert_eq!(ContextTag::parse("Здоровье"), ContextTag::Health);
        assert_eq!(ContextTag::parse(" Horien "), ContextTag::Custom("Horien".to_string()));
        assert_eq!(ContextTag::parse(""), ContextTag::Other);
    }

    #[test]
    fn status_round_trips_and_terminal_states() {
        for s in [TaskStatus::Open, TaskStatus::Done, TaskStatus::Snoozed, TaskStatus::Dropped] {
            assert_eq!(TaskStatus::parse(s.as_str()), s);
        }
        assert!(TaskStatus::Done.is_terminal());
        assert!(!TaskStatus::Snoozed.is_terminal());
    }
}
