//! PriorityScorer: title + optional deadline + estimate -> priority in [0, 100].
//!
//! Composite: `0.5 * urgency + 0.4 * importance + 0.1 * (50 + duration_bonus)`.
//!
//! - urgency decays smoothly with hours-to-deadline (`100 / (1 + h / half_life)`),
//!   is 100 once overdue and never drops below the floor;
//! - importance stacks a fixed boost per matched keyword, plus an extra boost
//!   for the user's "frog" marker word;
//! - the duration bonus rewards quick wins.
//!
//! The tuning constants live in [`ScoringConfig`] so they can be adjusted from
//! config without touching the formula.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const URGENCY_WEIGHT: f64 = 0.5;
const IMPORTANCE_WEIGHT: f64 = 0.4;
const DURATION_WEIGHT: f64 = 0.1;
const DURATION_BASE: f64 = 50.0;

/// Default high-stakes stems: clients, revenue, payments, health, family,
/// legal/tax, named ventures, supply/logistics.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "клиент", "доход", "выручка", "счёт", "оплата", "дет", "здоров", "сон", "гзт", "банк",
    "налог", "юрист", "легал", "ai", "бот", "horien", "вб", "озон", "поставка", "логист", "oos",
];

/// Marker the user writes into the title of the day's most important task.
pub const DEFAULT_FROG_MARKER: &str = "лягушк";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Hours-to-deadline at which urgency halves.
    pub half_life_hours: f64,
    pub urgency_floor: f64,
    /// Estimates at or below this many minutes get `+quick_bonus`.
    pub quick_minutes: i32,
    /// Estimates above this many minutes get `-quick_bonus`.
    pub mid_minutes: i32,
    pub quick_bonus: f64,
    pub keyword_boost: f64,
    pub frog_boost: f64,
    pub keywords: Vec<String>,
    pub frog_marker: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            half_life_hours: 12.0,
            urgency_floor: 10.0,
            quick_minutes: 25,
            mid_minutes: 50,
            quick_bonus: 10.0,
            keyword_boost: 8.0,
            frog_boost: 12.0,
            keywords: DEFAULT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            frog_marker: DEFAULT_FROG_MARKER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PriorityScorer {
    config: ScoringConfig,
}

impl PriorityScorer {
    pub fn new(config: ScoringConfig) -> Self {
        let mut config = config;
        for k in config.keywords.iter_mut() {
            *k = k.to_lowercase();
        }
        config.frog_marker = config.frog_marker.to_lowercase();
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score against the current instant.
    pub fn score(&self, title: &str, due_at: Option<DateTime<Utc>>, est_minutes: i32) -> f64 {
        self.score_at(title, due_at, est_minutes, Utc::now())
    }

    pub fn score_at(
        &self,
        title: &str,
        due_at: Option<DateTime<Utc>>,
        est_minutes: i32,
        now: DateTime<Utc>,
    ) -> f64 {
        let u = self.urgency(due_at, now);
        let i = self.importance(title);
        let d = self.duration_bonus(est_minutes);
        let raw = URGENCY_WEIGHT * u + IMPORTANCE_WEIGHT * i + DURATION_WEIGHT * (DURATION_BASE + d);
        raw.clamp(0.0, 100.0)
    }

    pub fn urgency(&self, due_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
        let floor = self.config.urgency_floor;
        let Some(due) = due_at else {
            return floor;
        };

        let hours = (due - now).num_milliseconds() as f64 / 3_600_000.0;
        if hours <= 0.0 {
            return 100.0;
        }

        let half_life = if self.config.half_life_hours > 0.0 {
            self.config.half_life_hours
        } else {
            12.0
        };
        (100.0 / (1.0 + hours / half_life)).clamp(floor, 100.0)
    }

    /// Keyword matches stack; there is no cap.
    pub fn importance(&self, title: &str) -> f64 {
        let t = title.to_lowercase();
        if t.is_empty() {
            return 0.0;
        }

        let mut score: f64 = self
            .config
            .keywords
            .iter()
            .filter(|kw| !kw.is_empty() && t.contains(kw.as_str()))
            .map(|_| self.config.keyword_boost)
            .sum();

        if !self.config.frog_marker.is_empty() && t.contains(&self.config.frog_marker) {
            score += self.config.frog_boost;
        }
        score
    }

    /// Non-positive estimates fall into the neutral middle bucket.
    pub fn duration_bonus(&self, est_minutes: i32) -> f64 {
        match est_minutes {
            m if m <= 0 => 0.0,
            m if m <= self.config.quick_minutes => self.config.quick_bonus,
            m if m <= self.config.mid_minutes => 0.0,
            _ => -self.config.quick_bonus,
        }
    }
}

/// Heuristic duration estimate from title stems. Long work wins over mid,
/// mid over short; unknown titles get 30 minutes.
pub fn estimate_minutes(title: &str) -> i32 {
    const SHORT: &[&str] = &[
        "позвон", "звонок", "письмо", "написать", "отправ", "созвон", "счёт", "напомнить", "call",
        "email", "send", "remind",
    ];
    const MID: &[&str] = &[
        "собрать", "настро", "загруз", "оформ", "опис", "документ", "провер", "review", "setup",
        "configure", "upload",
    ];
    const LONG: &[&str] = &[
        "разработ", "бот", "проект", "декомпоз", "презентац", "архитектур", "develop", "project",
        "presentation", "architecture",
    ];

    let t = title.to_lowercase();
    let hit = |stems: &[&str]| stems.iter().any(|k| t.contains(k));
    if hit(LONG) {
        90
    } else if hit(MID) {
        45
    } else if hit(SHORT) {
        15
    } else {
        30
    }
}
