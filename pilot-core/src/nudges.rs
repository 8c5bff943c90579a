//! Daily nudges: each kind fires at most once per local calendar day, at its
//! fixed hour:minute.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeKind {
    /// Morning "pick your Frog".
    Frog,
    /// Evening reflection prompt.
    Reflect,
    /// Early-morning sheet sync; reports how many rows came in.
    CommitWeek,
}

impl NudgeKind {
    pub const ALL: [NudgeKind; 3] = [NudgeKind::CommitWeek, NudgeKind::Frog, NudgeKind::Reflect];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frog => "frog",
            Self::Reflect => "reflect",
            Self::CommitWeek => "commit_week",
        }
    }

    /// Fixed text. `CommitWeek` is composed by the caller after the sync runs.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Frog => "🐸 Good morning! Pick today's Frog and start with it.",
            Self::Reflect => "🌙 Evening check-in: what got done, and what is tomorrow's Frog?",
            Self::CommitWeek => "🔄 Syncing the week sheet…",
        }
    }
}

pub fn commit_week_message(added: usize, skipped: usize) -> String {
    format!("🔄 Week sheet synced: {added} new task(s), {skipped} already known.")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NudgeSchedule {
    pub frog_at: NaiveTime,
    pub reflect_at: NaiveTime,
    pub commit_week_at: NaiveTime,
}

impl Default for NudgeSchedule {
    fn default() -> Self {
        Self {
            frog_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            reflect_at: NaiveTime::from_hms_opt(21, 30, 0).unwrap_or_default(),
            commit_week_at: NaiveTime::from_hms_opt(6, 30, 0).unwrap_or_default(),
        }
    }
}

impl NudgeSchedule {
    pub fn slot(&self, kind: NudgeKind) -> NaiveTime {
        match kind {
            NudgeKind::Frog => self.frog_at,
            NudgeKind::Reflect => self.reflect_at,
            NudgeKind::CommitWeek => self.commit_week_at,
        }
    }
}

/// Per-day fired flags. A date change clears every flag.
#[derive(Debug, Clone, Default)]
pub struct NudgeState {
    day: Option<NaiveDate>,
    fired: HashSet<NudgeKind>,
}

impl NudgeState {
    fn roll(&mut self, today: NaiveDate) {
        if self.day != Some(today) {
            self.day = Some(today);
            self.fired.clear();
        }
    }

    /// Kinds whose slot minute is `local` and that have not fired today.
    /// A missed minute is not retried.
    pub fn due(&mut self, local: NaiveDateTime, schedule: &NudgeSchedule) -> Vec<NudgeKind> {
        self.roll(local.date());
        let (h, m) = (local.hour(), local.minute());
        NudgeKind::ALL
            .into_iter()
            .filter(|k| {
                let slot = schedule.slot(*k);
                slot.hour() == h && slot.minute() == m && !self.fired.contains(k)
            })
            .collect()
    }

    pub fn mark_fired(&mut self, local: NaiveDateTime, kind: NudgeKind) {
        self.roll(local.date());
        self.fired.insert(kind);
    }

    pub fn has_fired(&self, kind: NudgeKind) -> bool {
        self.fired.contains(&kind)
    }
}
