//! Plan rows and the weekly sheet layout.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;

use pilot_core::dedupe::normalize_title;
use pilot_core::planner::DayPlan;
use pilot_core::task::Task;

use crate::rows::{Bucket, DayRow, PlanRow, WeekTaskRow};

/// Tasks taken per context for the week sheet.
pub const DEFAULT_PER_CONTEXT: usize = 3;

/// Slots per day: Frog + 2 Stones.
const DAY_SLOTS: usize = 3;

fn plan_row(t: &Task, bucket: Bucket, tz: Tz) -> PlanRow {
    PlanRow {
        bucket,
        title: t.title.clone(),
        context: t.context.to_string(),
        due_date: t.due_at.map(|d| d.with_timezone(&tz).date_naive()),
        priority: t.priority,
        est_minutes: t.est_minutes,
    }
}

pub fn plan_rows(plan: &DayPlan, tz: Tz) -> Vec<PlanRow> {
    let frog = plan.frog.iter().map(|t| plan_row(t, Bucket::Frog, tz));
    let stones = plan.stones.iter().map(|t| plan_row(t, Bucket::Stone, tz));
    let sand = plan.sand.iter().map(|t| plan_row(t, Bucket::Sand, tz));
    frog.chain(stones).chain(sand).collect()
}

/// Top tasks per context for the week starting `week_start`.
///
/// Contexts appear in the order of their best task. Within a context: priority
/// desc, then shorter first. Rows repeating a (context, title) pair are dropped.
pub fn week_rows(open: &[Task], week_start: NaiveDate, tz: Tz, per_context: usize) -> Vec<WeekTaskRow> {
    let mut ranked: Vec<&Task> = open.iter().filter(|t| t.is_open()).collect();
    ranked.sort_by(|a, b| {
        b.priority
            .total_cmp(&a.priority)
            .then_with(|| a.est_minutes.unwrap_or(999).cmp(&b.est_minutes.unwrap_or(999)))
    });

    let mut contexts: Vec<String> = Vec::new();
    for t in &ranked {
        let c = t.context.to_string();
        if !contexts.contains(&c) {
            contexts.push(c);
        }
    }

    let week_end = (week_start + Duration::days(6)).format("%Y-%m-%d").to_string();
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for ctx in contexts {
        let mut taken = 0;
        for t in ranked.iter().filter(|t| t.context.to_string() == ctx) {
            if taken == per_context {
                break;
            }
            if !seen.insert((ctx.clone(), normalize_title(&t.title))) {
                continue;
            }
            taken += 1;
            rows.push(WeekTaskRow {
                direction: ctx.clone(),
                task: t.title.clone(),
                outcome: t.description.clone(),
                deadline: t
                    .due_at
                    .map(|d| d.with_timezone(&tz).format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| week_end.clone()),
                status: "in_progress".to_string(),
                progress: Some(0),
                notes: format!("task_id={}", t.id),
            });
        }
    }
    rows
}

/// Seven days from `week_start`, filled in order: Frog, Stone1, Stone2.
pub fn day_rows(week: &[WeekTaskRow], week_start: NaiveDate) -> Vec<DayRow> {
    let slot = |i: usize| week.get(i).map(|r| r.task.clone()).unwrap_or_default();

    (0..7)
        .map(|d| {
            let date = week_start + Duration::days(d as i64);
            let base = d * DAY_SLOTS;
            DayRow {
                date: date.format("%Y-%m-%d").to_string(),
                day: date.format("%a").to_string(),
                frog: slot(base),
                stone1: slot(base + 1),
                stone2: slot(base + 2),
                ..DayRow::default()
            }
        })
        .collect()
}
