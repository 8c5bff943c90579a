//! Time utilities: timezone-aware deadlines, local-day windows and the
//! human due-time phrases accepted by `add --due` and `snooze`.

use anyhow::Result;
use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    SecondsFormat, TimeZone, Utc,
};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::LazyLock;

/// Hour used when a phrase names a day but no time ("завтра", "2026-03-01").
pub const DEFAULT_DUE_HOUR: u32 = 21;

pub fn parse_tz(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))
}

/// Map a wall-clock time to an instant. Ambiguous times take the earlier
/// instant; times inside a DST gap move forward by an hour.
pub fn resolve_local(tz: Tz, ndt: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&ndt) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz.from_local_datetime(&(ndt + Duration::hours(1))).earliest(),
    }
}

/// Stored instants are RFC3339; older rows may hold a bare "YYYY-MM-DD HH:MM:SS"
/// (taken as UTC). Anything else is `None`.
pub fn parse_stored_instant(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

/// Canonical stored form: second precision, `Z` suffix. Sorts lexically.
pub fn to_rfc3339_utc(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `[start, end)` of the local calendar day containing `now`, in UTC.
pub fn local_day_bounds(now: DateTime<Utc>, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let day = now.with_timezone(&tz).date_naive();
    (start_of_local_day(day, tz), start_of_local_day(day + Duration::days(1), tz))
}

pub fn start_of_local_day(day: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = day.and_hms_opt(0, 0, 0).unwrap_or_default();
    resolve_local(tz, midnight)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Monday of the ISO week containing `day`.
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(day.weekday().num_days_from_monday() as i64)
}

/// Next instant strictly after `now` whose local wall-clock time is `at`:
/// today if still ahead, otherwise tomorrow.
pub fn next_occurrence(now: DateTime<Utc>, tz: Tz, at: NaiveTime) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();
    for offset in 0..=2 {
        let day = today + Duration::days(offset);
        if let Some(candidate) = resolve_local(tz, day.and_time(at)) {
            let candidate = candidate.with_timezone(&Utc);
            if candidate > now {
                return candidate;
            }
        }
    }
    now + Duration::days(1)
}

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})(?:[ t](\d{1,2}):(\d{2}))?$").expect("valid regex")
});

static DOTTED_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})\.(\d{1,2})(?:\.(\d{4}))?(?:\s+(\d{1,2}):(\d{2}))?$")
        .expect("valid regex")
});

static CLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:at\s+|в\s+)?(\d{1,2}):(\d{2})$").expect("valid regex"));

static NAMED_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(today|tomorrow|сегодня|завтра|послезавтра)(?:\s+(?:at\s+|в\s+)?(\d{1,2})(?::(\d{2}))?)?$",
    )
    .expect("valid regex")
});

static RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:in|через)\s+(\d+)?\s*(minutes?|mins?|m|минуты|минуту|минут|hours?|h|часа|часов|час|days?|d|дня|дней|день)$",
    )
    .expect("valid regex")
});

/// Parse a human due-time phrase relative to `now` in `tz`.
///
/// Day-only phrases resolve to `DEFAULT_DUE_HOUR` local time. Returns `None`
/// for anything unrecognized.
pub fn parse_human_due(text: &str, now: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
    let t = text.trim().to_lowercase();
    let t = t.split_whitespace().collect::<Vec<_>>().join(" ");
    if t.is_empty() {
        return None;
    }
    let local_now = now.with_timezone(&tz);
    let today = local_now.date_naive();

    if let Some(c) = ISO_DATE.captures(&t) {
        let day = NaiveDate::from_ymd_opt(num(&c, 1)?, num(&c, 2)?, num(&c, 3)?)?;
        let time = clock_or_default(c.get(4).map(|m| m.as_str()), c.get(5).map(|m| m.as_str()))?;
        return at_local(tz, day, time);
    }

    if let Some(c) = DOTTED_DATE.captures(&t) {
        let d: u32 = num(&c, 1)?;
        let m: u32 = num(&c, 2)?;
        let time = clock_or_default(c.get(4).map(|m| m.as_str()), c.get(5).map(|m| m.as_str()))?;
        let day = match c.get(3) {
            Some(y) => NaiveDate::from_ymd_opt(y.as_str().parse().ok()?, m, d)?,
            None => {
                let this_year = NaiveDate::from_ymd_opt(today.year(), m, d)?;
                if this_year < today {
                    NaiveDate::from_ymd_opt(today.year() + 1, m, d)?
                } else {
                    this_year
                }
            }
        };
        return at_local(tz, day, time);
    }

    if let Some(c) = CLOCK.captures(&t) {
        let time = NaiveTime::from_hms_opt(num(&c, 1)?, num(&c, 2)?, 0)?;
        return Some(next_occurrence(now, tz, time));
    }

    if let Some(c) = NAMED_DAY.captures(&t) {
        let offset = match &c[1] {
            "today" | "сегодня" => 0,
            "tomorrow" | "завтра" => 1,
            _ => 2,
        };
        let time = match c.get(2) {
            Some(h) => NaiveTime::from_hms_opt(
                h.as_str().parse().ok()?,
                c.get(3).map_or(Some(0), |m| m.as_str().parse().ok())?,
                0,
            )?,
            None => NaiveTime::from_hms_opt(DEFAULT_DUE_HOUR, 0, 0)?,
        };
        return at_local(tz, today + Duration::days(offset), time);
    }

    if let Some(c) = RELATIVE.captures(&t) {
        let n: i64 = c.get(1).map_or(Some(1), |m| m.as_str().parse().ok())?;
        let unit = &c[2];
        let delta = if unit.starts_with('m') || unit.starts_with("мин") {
            Duration::try_minutes(n)
        } else if unit.starts_with('h') || unit.starts_with("час") {
            Duration::try_hours(n)
        } else {
            Duration::try_days(n)
        }?;
        return now.checked_add_signed(delta);
    }

    None
}

fn num<T: std::str::FromStr>(c: &regex::Captures<'_>, i: usize) -> Option<T> {
    c.get(i)?.as_str().parse().ok()
}

fn clock_or_default(h: Option<&str>, m: Option<&str>) -> Option<NaiveTime> {
    match (h, m) {
        (Some(h), Some(m)) => NaiveTime::from_hms_opt(h.parse().ok()?, m.parse().ok()?, 0),
        _ => NaiveTime::from_hms_opt(DEFAULT_DUE_HOUR, 0, 0),
    }
}

fn at_local(tz: Tz, day: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    resolve_local(tz, day.and_time(time)).map(|dt| dt.with_timezone(&Utc))
}
