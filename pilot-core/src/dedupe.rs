//! Near-duplicate collapsing for ranked task lists.
//!
//! Runs before any ranked list is shown: two rows are the same task when their
//! normalized titles are identical or close enough by character-level
//! similarity. One survivor per cluster; the rest are reported as superseded.

use regex::Regex;
use similar::TextDiff;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::task::{Task, TaskId};

pub const DEFAULT_SIMILARITY: f64 = 0.92;

/// Estimate used for tie-breaks when a row has none.
const MISSING_ESTIMATE: i32 = 999;

/// Known misspellings of a recurring proper noun.
const SPELLING_FIXES: &[(&str, &str)] = &[
    ("хориен", "horien"),
    ("хорьен", "horien"),
    ("хориэн", "horien"),
    ("horian", "horien"),
    ("horien's", "horien"),
];

static PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]+").expect("valid regex"));

// Hyphens not between two word characters.
static LOOSE_HYPHEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)-+|-+(?:\s|$)").expect("valid regex"));

/// Lower-case, strip punctuation (internal hyphens survive), collapse
/// whitespace, apply the spelling table.
pub fn normalize_title(title: &str) -> String {
    let mut s = title.to_lowercase();
    for (from, to) in SPELLING_FIXES {
        if s.contains(from) {
            s = s.replace(from, to);
        }
    }
    let s = PUNCT.replace_all(&s, "");
    let s = LOOSE_HYPHEN.replace_all(&s, " ");
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Symmetric similarity ratio in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    TextDiff::from_chars(a, b).ratio() as f64
}

#[derive(Debug, Clone, Copy)]
pub struct Deduplicator {
    threshold: f64,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SIMILARITY,
        }
    }
}

impl Deduplicator {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    fn same_task(&self, a: &str, b: &str) -> bool {
        a == b || similarity(a, b) >= self.threshold
    }

    /// Collapse near-duplicates in a list ranked by priority desc.
    ///
    /// Survivors keep the position of the first row of their cluster. Repeats
    /// the pass until nothing else collapses, so the output is a fixed point.
    pub fn dedupe(&self, rows: &[Task]) -> (Vec<Task>, HashSet<TaskId>) {
        let mut superseded = HashSet::new();
        let mut current: Vec<Task> = rows.to_vec();

        loop {
            let before = current.len();
            current = self.single_pass(current, &mut superseded);
            if current.len() == before {
                return (current, superseded);
            }
        }
    }

    fn single_pass(&self, rows: Vec<Task>, superseded: &mut HashSet<TaskId>) -> Vec<Task> {
        let mut kept: Vec<(String, Task)> = Vec::with_capacity(rows.len());

        for row in rows {
            let norm = normalize_title(&row.title);
            let hit = kept.iter().position(|(k, _)| self.same_task(k, &norm));

            match hit {
                None => kept.push((norm, row)),
                Some(i) => {
                    if beats(&row, &kept[i].1) {
                        superseded.insert(kept[i].1.id);
                        kept[i] = (norm, row);
                    } else {
                        superseded.insert(row.id);
                    }
                }
            }
        }

        kept.into_iter().map(|(_, t)| t).collect()
    }
}

/// Convenience wrapper with the default threshold.
pub fn dedupe(rows: &[Task]) -> (Vec<Task>, HashSet<TaskId>) {
    Deduplicator::default().dedupe(rows)
}

/// Does `challenger` replace `incumbent`? Full ties keep the incumbent.
fn beats(challenger: &Task, incumbent: &Task) -> bool {
    compare(challenger, incumbent) == Ordering::Greater
}

fn compare(a: &Task, b: &Task) -> Ordering {
    match (a.due_at, b.due_at) {
        (Some(_), None) => return Ordering::Greater,
        (None, Some(_)) => return Ordering::Less,
        (Some(x), Some(y)) if x != y => return y.cmp(&x),
        _ => {}
    }

    let pa = a.priority.trunc() as i64;
    let pb = b.priority.trunc() as i64;
    if pa != pb {
        return pa.cmp(&pb);
    }

    let ea = a.est_minutes.unwrap_or(MISSING_ESTIMATE);
    let eb = b.est_minutes.unwrap_or(MISSING_ESTIMATE);
    eb.cmp(&ea)
}
