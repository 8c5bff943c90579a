use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

use pilot_store::Backups;

use super::poll_interval;

/// Snapshot the database on a fixed interval.
pub struct BackupScheduler {
    backups: Backups,
}

impl BackupScheduler {
    pub fn new(backups: Backups) -> Self {
        Self { backups }
    }

    pub async fn tick(&self, now: DateTime<Utc>) -> Result<Option<PathBuf>> {
        let backups = self.backups.clone();
        let path = tokio::task::spawn_blocking(move || backups.create_backup(now))
            .await
            .context("backup task panicked")??;
        match &path {
            Some(p) => tracing::info!(file = %p.display(), "backup created"),
            None => tracing::warn!("no database to back up yet"),
        }
        Ok(path)
    }

    pub async fn run(self, every: Duration) {
        tracing::info!(every = ?every, dir = %self.backups.dir().display(), "backup loop started");
        let mut ticker = poll_interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = self.tick(Utc::now()).await {
                tracing::error!(error = %e, "backup failed");
            }
        }
    }
}
