//! Day plan: Frog / Stones / Sand allocation and the text views built on it.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::dedupe::Deduplicator;
use crate::task::{Task, TaskId};

pub const STONE_SLOTS: usize = 3;

/// Sand rows shown by default.
pub const SAND_DISPLAY_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub frog: Option<Task>,
    pub stones: Vec<Task>,
    pub sand: Vec<Task>,
}

impl DayPlan {
    pub fn is_empty(&self) -> bool {
        self.frog.is_none() && self.stones.is_empty() && self.sand.is_empty()
    }

    pub fn len(&self) -> usize {
        usize::from(self.frog.is_some()) + self.stones.len() + self.sand.len()
    }

    /// Frog, then stones, then sand.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.frog.iter().chain(self.stones.iter()).chain(self.sand.iter())
    }
}

/// Greedy top-N slicing of a deduplicated list ranked by priority desc.
pub fn allocate(ranked: &[Task]) -> DayPlan {
    let mut rest = ranked.iter().cloned();
    let frog = rest.next();
    let stones: Vec<Task> = rest.by_ref().take(STONE_SLOTS).collect();
    let sand: Vec<Task> = rest.collect();
    DayPlan { frog, stones, sand }
}

/// Dedupe, then allocate. Returns the superseded ids alongside the plan.
pub fn build_plan(ranked: &[Task], dedup: &Deduplicator) -> (DayPlan, Vec<TaskId>) {
    let (survivors, superseded) = dedup.dedupe(ranked);
    let mut gone: Vec<TaskId> = superseded.into_iter().collect();
    gone.sort_unstable();
    (allocate(&survivors), gone)
}

fn est_label(t: &Task) -> String {
    match t.est_minutes {
        Some(m) if m > 0 => format!("{m}m"),
        _ => "?".to_string(),
    }
}

fn plan_line(t: &Task, tz: Tz) -> String {
    let due = t
        .due_at
        .map(|d| format!(" • 🗓 {}", d.with_timezone(&tz).format("%H:%M")))
        .unwrap_or_default();
    format!(
        "#{} {} — [{}] • ⚡{} • ⏱~{}{}",
        t.id,
        t.title,
        t.context,
        t.priority.trunc() as i64,
        est_label(t),
        due
    )
}

pub fn render_plan(plan: &DayPlan, tz: Tz, sand_limit: usize) -> String {
    if plan.is_empty() {
        return "📅 Plan for today\n\nNothing open. Add a task with `pilot add`.".to_string();
    }

    let mut out = vec!["📅 Plan for today".to_string()];
    if let Some(frog) = &plan.frog {
        out.push("\n🐸 FROG".to_string());
        out.push(plan_line(frog, tz));
    }
    if !plan.stones.is_empty() {
        out.push("\n◼︎ STONES".to_string());
        out.extend(plan.stones.iter().map(|t| plan_line(t, tz)));
    }
    if !plan.sand.is_empty() {
        out.push("\n▫︎ SAND".to_string());
        out.extend(plan.sand.iter().take(sand_limit).map(|t| plan_line(t, tz)));
        if plan.sand.len() > sand_limit {
            out.push(format!("… and {} more", plan.sand.len() - sand_limit));
        }
    }
    out.join("\n")
}

/// Inbox view: open tasks without a deadline.
pub fn render_inbox(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "📥 Inbox is empty.".to_string();
    }
    let mut lines = vec!["📥 Inbox".to_string()];
    for t in tasks {
        lines.push(format!(
            "#{} • {} — [{}] • ⚡{}",
            t.id,
            t.title,
            t.context,
            t.priority.trunc() as i64
        ));
    }
    lines.join("\n")
}

/// Seven-day view grouped by local day. Expects rows ordered by due asc.
pub fn render_week(tasks: &[Task], tz: Tz) -> String {
    let dated: Vec<(&Task, DateTime<Tz>)> = tasks
        .iter()
        .filter_map(|t| t.due_at.map(|d| (t, d.with_timezone(&tz))))
        .collect();
    if dated.is_empty() {
        return "Nothing due this week.".to_string();
    }

    let mut lines = vec!["🗓 Week (7 days)".to_string()];
    let mut current = String::new();
    for (t, local) in dated {
        let day = local.format("%a %d.%m").to_string();
        if day != current {
            lines.push(format!("\n{day}"));
            current = day;
        }
        lines.push(format!(
            "#{} {} — [{}] • ⏱~{} • ⚡{} • {}",
            t.id,
            t.title,
            t.context,
            est_label(t),
            t.priority.trunc() as i64,
            local.format("%H:%M")
        ));
    }
    lines.join("\n")
}

/// Inputs for the weekly report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub added: u64,
    pub done: u64,
    /// Share of this week's tasks already done, in percent.
    pub productivity_pct: u32,
    pub open: u64,
    /// Open tasks due in the next 7 days.
    pub upcoming: u64,
}

impl WeeklySummary {
    pub fn render(&self, now: DateTime<Utc>, tz: Tz) -> String {
        let end = now.with_timezone(&tz).date_naive();
        let start = end - Duration::days(6);
        let mut lines = vec![
            format!(
                "🧭 Weekly review {} – {}",
                start.format("%d.%m"),
                end.format("%d.%m")
            ),
            String::new(),
            format!("Added: {}", self.added),
            format!("Done: {}", self.done),
        ];
        if self.added > 0 {
            lines.push(format!("⚡ Productivity: {}%", self.productivity_pct));
        }
        lines.push(format!("🔄 Still open: {}", self.open));
        lines.push(format!("📌 Due in the next 7 days: {}", self.upcoming));
        lines.push(String::new());
        lines.push("Pick next week's Frog for each day before Monday.".to_string());
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ranked(n: usize) -> Vec<Task> {
        (0..n)
            .map(|i| {
                Task::new(i as TaskId + 1, format!("task number {}", i + 1))
                    .with_priority(90.0 - i as f64)
            })
            .collect()
    }

    #[test]
    fn empty_list_gives_empty_buckets() {
        let plan = allocate(&[]);
        assert!(plan.frog.is_none());
        assert!(plan.stones.is_empty());
        assert!(plan.sand.is_empty());
        assert!(plan.is_empty());
    }

    #[test]
    fn five_items_split_one_three_one() {
        let plan = allocate(&ranked(5));
        assert_eq!(plan.frog.as_ref().map(|t| t.id), Some(1));
        assert_eq!(plan.stones.iter().map(|t| t.id).collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(plan.sand.iter().map(|t| t.id).collect::<Vec<_>>(), vec![5]);
        assert_eq!(plan.len(), 5);
    }

    #[test]
    fn single_item_is_only_a_frog() {
        let plan = allocate(&ranked(1));
        assert!(plan.frog.is_some());
        assert!(plan.stones.is_empty());
        assert!(plan.sand.is_empty());
    }

    #[test]
    fn duplicates_do_not_take_stone_slots() {
        let rows = vec![
            Task::new(5, "Позвонить клиенту").with_priority(60.0),
            Task::new(4, "позвонить клиенту!!").with_priority(59.0),
            Task::new(3, "Оплатить счёт").with_priority(50.0),
        ];
        let (plan, gone) = build_plan(&rows, &Deduplicator::default());
        assert_eq!(gone, vec![4]);
        assert_eq!(plan.frog.map(|t| t.id), Some(5));
        assert_eq!(plan.stones.len(), 1);
    }

    #[test]
    fn render_truncates_sand() {
        let tz: Tz = "Europe/Moscow".parse().unwrap();
        let plan = allocate(&ranked(20));
        let text = render_plan(&plan, tz, SAND_DISPLAY_LIMIT);
        assert!(text.contains("🐸 FROG"));
        assert!(text.contains("#1 task number 1"));
        assert!(text.contains("#14 task number 14"));
        assert!(!text.contains("#15 task number 15"));
        assert!(text.contains("… and 6 more"));
    }

    #[test]
    fn week_groups_by_local_day() {
        let tz: Tz = "Europe/Moscow".parse().unwrap();
        let d1 = Utc.with_ymd_and_hms(2026, 3, 10, 7, 0, 0).unwrap();
        let rows = vec![
            Task::new(1, "a").with_due(d1),
            Task::new(2, "b").with_due(d1 + Duration::hours(1)),
            Task::new(3, "c").with_due(d1 + Duration::days(1)),
        ];
        let text = render_week(&rows, tz);
        assert!(text.contains("Tue 10.03"));
        assert!(text.contains("Wed 11.03"));
        assert_eq!(text.matches("Tue 10.03").count(), 1);
    }

    #[test]
    fn weekly_summary_mentions_counts() {
        let tz: Tz = "Europe/Moscow".parse().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 16, 0, 0).unwrap();
        let s = WeeklySummary {
            added: 10,
            done: 4,
            productivity_pct: 40,
            open: 6,
            upcoming: 3,
        };
        let text = s.render(now, tz);
        assert!(text.contains("09.03 – 15.03"));
        assert!(text.contains("Done: 4"));
        assert!(text.contains("Productivity: 40%"));
    }
}
