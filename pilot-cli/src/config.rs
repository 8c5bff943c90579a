use anyhow::{anyhow, Context, Result};
use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use pilot_core::nudges::NudgeSchedule;
use pilot_core::reminders::ReminderPolicy;
use pilot_core::scoring::ScoringConfig;
use pilot_core::time::parse_tz;
use pilot_core::weekend::WeekendPolicy;
use pilot_store::Backups;

use crate::state::ensure_pilot_home;

pub const BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralSection,
    pub telegram: TelegramSection,
    pub scoring: ScoringConfig,
    pub schedule: ScheduleSection,
    pub sync: SyncSection,
    pub backup: BackupSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSection {
    /// IANA timezone all local times are read in.
    pub timezone: String,
    /// Owner of the tasks and recipient of every scheduled message.
    pub chat_id: i64,
    /// Defaults to `~/.pilot/daily_pilot.db`.
    pub db_path: Option<PathBuf>,
    pub log_level: String,
}

impl Default for GeneralSection {
    fn default() -> Self {
        Self {
            timezone: "Europe/Moscow".to_string(),
            chat_id: 0,
            db_path: None,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSection {
    pub bot_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSection {
    pub poll_secs: u64,
    pub backup_interval_secs: u64,

    pub reminder_cooldown_minutes: i64,
    pub reminder_batch: usize,
    pub reminder_retention_hours: i64,

    /// "HH:MM", local.
    pub frog_at: String,
    pub reflect_at: String,
    pub commit_week_at: String,

    pub weekly_report_day: String,
    pub weekly_report_hour: u32,

    pub daily_plan_at: String,
    pub broadcast_backoff_secs: u64,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            poll_secs: 60,
            backup_interval_secs: 3600,
            reminder_cooldown_minutes: 60,
            reminder_batch: 10,
            reminder_retention_hours: 24,
            frog_at: "09:00".to_string(),
            reflect_at: "21:30".to_string(),
            commit_week_at: "06:30".to_string(),
            weekly_report_day: "Sun".to_string(),
            weekly_report_hour: 18,
            daily_plan_at: "08:00".to_string(),
            broadcast_backoff_secs: 60,
        }
    }
}

impl ScheduleSection {
    pub fn reminder_policy(&self) -> ReminderPolicy {
        ReminderPolicy {
            cooldown_minutes: self.reminder_cooldown_minutes,
            retention_hours: self.reminder_retention_hours,
            batch: self.reminder_batch.max(1),
        }
    }

    pub fn nudges(&self) -> Result<NudgeSchedule> {
        Ok(NudgeSchedule {
            frog_at: parse_clock(&self.frog_at).context("schedule.frog_at")?,
            reflect_at: parse_clock(&self.reflect_at).context("schedule.reflect_at")?,
            commit_week_at: parse_clock(&self.commit_week_at).context("schedule.commit_week_at")?,
        })
    }

    pub fn weekend(&self) -> Result<WeekendPolicy> {
        let weekday: Weekday = self
            .weekly_report_day
            .trim()
            .parse()
            .map_err(|_| anyhow!("schedule.weekly_report_day: unknown weekday {:?}", self.weekly_report_day))?;
        if self.weekly_report_hour > 23 {
            return Err(anyhow!(
                "schedule.weekly_report_hour must be 0-23, got {}",
                self.weekly_report_hour
            ));
        }
        Ok(WeekendPolicy {
            weekday,
            hour: self.weekly_report_hour,
        })
    }

    pub fn daily_plan_time(&self) -> Result<NaiveTime> {
        parse_clock(&self.daily_plan_at).context("schedule.daily_plan_at")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Directory of the CSV sheet. Defaults to `~/.pilot/sheets`.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSection {
    /// Defaults to `<db dir>/backups`.
    pub dir: Option<PathBuf>,
    pub retention_days: i64,
}

impl Default for BackupSection {
    fn default() -> Self {
        Self {
            dir: None,
            retention_days: 7,
        }
    }
}

impl Config {
    pub fn tz(&self) -> Result<Tz> {
        parse_tz(&self.general.timezone)
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.general.db_path {
            Some(p) => Ok(p.clone()),
            None => Ok(ensure_pilot_home()?.join("daily_pilot.db")),
        }
    }

    pub fn sheet_dir(&self) -> Result<PathBuf> {
        match &self.sync.dir {
            Some(p) => Ok(p.clone()),
            None => Ok(ensure_pilot_home()?.join("sheets")),
        }
    }

    pub fn backups(&self, db_path: &Path) -> Backups {
        let dir = self
            .backup
            .dir
            .clone()
            .unwrap_or_else(|| Backups::default_dir(db_path));
        Backups::new(db_path, dir, self.backup.retention_days)
    }

    /// Env wins over the file. Blank values count as unset.
    pub fn bot_token(&self) -> Option<String> {
        std::env::var(BOT_TOKEN_ENV)
            .ok()
            .or_else(|| self.telegram.bot_token.clone())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Fail early on values the loops would otherwise trip over at runtime.
    pub fn validate(&self) -> Result<()> {
        self.tz()?;
        self.schedule.nudges()?;
        self.schedule.weekend()?;
        self.schedule.daily_plan_time()?;
        if self.schedule.poll_secs == 0 || self.schedule.backup_interval_secs == 0 {
            return Err(anyhow!("schedule intervals must be positive"));
        }
        Ok(())
    }
}

fn parse_clock(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .with_context(|| format!("expected HH:MM, got {s:?}"))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_pilot_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config(cfg: &Config) -> Result<PathBuf> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(p)
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    let p = save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

/// Effective config as TOML, with the bot token masked.
pub fn show_config(cfg: &Config) -> Result<String> {
    let mut shown = cfg.clone();
    if shown.telegram.bot_token.is_some() {
        shown.telegram.bot_token = Some("***".to_string());
    }
    toml::to_string_pretty(&shown).context("serialize config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_validate() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.tz().unwrap(), chrono_tz::Europe::Moscow);
        assert_eq!(cfg.schedule.nudges().unwrap(), NudgeSchedule::default());
        assert_eq!(cfg.schedule.weekend().unwrap(), WeekendPolicy::default());
        assert_eq!(cfg.schedule.reminder_policy(), ReminderPolicy::default());
        assert_eq!(
            cfg.schedule.daily_plan_time().unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap()
        );
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("config.toml");
        fs::write(
            &p,
            "[general]\ntimezone = \"Asia/Tbilisi\"\nchat_id = 42\n\n\
             [schedule]\nfrog_at = \"08:15\"\nweekly_report_day = \"sat\"\n\n\
             [scoring]\nhalf_life_hours = 24.0\n",
        )
        .unwrap();

        let cfg = load_config_from(&p).unwrap();
        assert_eq!(cfg.general.chat_id, 42);
        assert_eq!(cfg.general.log_level, "info");
        assert_eq!(cfg.schedule.reflect_at, "21:30");
        assert_eq!(cfg.schedule.weekend().unwrap().weekday, Weekday::Sat);
        assert_eq!(
            cfg.schedule.nudges().unwrap().frog_at,
            NaiveTime::from_hms_opt(8, 15, 0).unwrap()
        );
        assert_eq!(cfg.scoring.half_life_hours, 24.0);
        assert_eq!(cfg.scoring.quick_minutes, 25);
        assert_eq!(cfg.backup.retention_days, 7);
    }

    #[test]
    fn missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let cfg = load_config_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg.general.timezone, "Europe/Moscow");
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut cfg = Config::default();
        cfg.schedule.reflect_at = "9pm".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.general.timezone = "Mars/Olympus".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.schedule.weekly_report_hour = 24;
        assert!(cfg.schedule.weekend().is_err());
    }

    #[test]
    fn backups_default_next_to_db() {
        let cfg = Config::default();
        let backups = cfg.backups(Path::new("/data/pilot/daily_pilot.db"));
        assert_eq!(backups.dir(), Path::new("/data/pilot/backups"));
    }

    #[test]
    fn shown_config_masks_token() {
        let mut cfg = Config::default();
        cfg.telegram.bot_token = Some("123:secret".to_string());
        let shown = show_config(&cfg).unwrap();
        assert!(!shown.contains("secret"));
        assert!(shown.contains("[schedule]"));
    }
}
