//! pilot-sync: plan rows, the weekly sheet layout and idempotent import.

pub mod error;
pub mod import;
pub mod layout;
pub mod rows;
pub mod sheet;

pub use error::{Result, SyncError};
pub use import::{import_key, import_rows, ImportReport};
pub use layout::{day_rows, plan_rows, week_rows, DEFAULT_PER_CONTEXT};
pub use rows::{Bucket, DayRow, ImportRow, PlanRow, WeekTaskRow};
pub use sheet::{CsvSheet, SyncTarget};
