use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// `$PILOT_HOME`, else `~/.pilot`.
pub fn pilot_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("PILOT_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".pilot"))
}

pub fn ensure_pilot_home() -> Result<PathBuf> {
    let dir = pilot_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}
