//! pilot-core: prioritization and scheduling engine for Daily Pilot.
//!
//! Pure code only: scoring, near-duplicate collapsing, Frog/Stones/Sand
//! allocation, and the state machines the background loops drive.

pub mod dedupe;
pub mod nudges;
pub mod planner;
pub mod reminders;
pub mod scoring;
pub mod task;
pub mod time;
pub mod weekend;

pub use dedupe::{dedupe, normalize_title, similarity, Deduplicator, DEFAULT_SIMILARITY};
pub use nudges::{commit_week_message, NudgeKind, NudgeSchedule, NudgeState};
pub use planner::{
    allocate, build_plan, render_inbox, render_plan, render_week, DayPlan, WeeklySummary,
    SAND_DISPLAY_LIMIT,
};
pub use reminders::{overdue_message, ReminderPolicy, ReminderState};
pub use scoring::{estimate_minutes, PriorityScorer, ScoringConfig};
pub use task::{ContextTag, NewTask, Task, TaskId, TaskSource, TaskStatus, MAX_TITLE_CHARS};
pub use weekend::{WeekendPolicy, WeekendState};
