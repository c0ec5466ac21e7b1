//! JSON file persistence for per-topic stats.
//!
//! The whole object is read once at startup and rewritten on every change
//! (write to `.tmp`, fsync, rename).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::{PracticeError, Result};
use crate::stats::StatsTracker;

const STATS_FILE: &str = "stats.json";

#[derive(Clone, Debug)]
pub struct StatsStore {
  path: PathBuf,
}

impl StatsStore {
  pub fn new(data_dir: &Path) -> Result<Self> {
    fs::create_dir_all(data_dir).map_err(|e| PracticeError::Store(format!("{}: {e}", data_dir.display())))?;
    Ok(Self { path: data_dir.join(STATS_FILE) })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Missing file means a fresh start. An unreadable or corrupt file is copied to
  /// `stats.json.bak` and then treated the same, so the next save cannot lose it.
  pub fn load(&self) -> StatsTracker {
    if !self.path.exists() {
      return StatsTracker::default();
    }
    match fs::read_to_string(&self.path) {
      Ok(content) => match serde_json::from_str::<StatsTracker>(&content) {
        Ok(stats) => {
          info!(target: "stats", path = %self.path.display(), "Loaded stats");
          stats
        }
        Err(e) => {
          error!(target: "stats", path = %self.path.display(), error = %e, "Stats file is not valid JSON; starting empty");
          self.backup_unreadable();
          StatsTracker::default()
        }
      },
      Err(e) => {
        error!(target: "stats", path = %self.path.display(), error = %e, "Failed to read stats file; starting empty");
        self.backup_unreadable();
        StatsTracker::default()
      }
    }
  }

  pub fn backup_path(&self) -> PathBuf {
    self.path.with_extension("json.bak")
  }

  fn backup_unreadable(&self) {
    let bak = self.backup_path();
    match fs::copy(&self.path, &bak) {
      Ok(_) => warn!(target: "stats", backup = %bak.display(), "Kept a copy of the unreadable stats file"),
      Err(e) => error!(target: "stats", backup = %bak.display(), error = %e, "Failed to back up unreadable stats file"),
    }
  }

  pub fn save(&self, stats: &StatsTracker) -> Result<()> {
    let tmp_path = self.path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(stats).map_err(|e| PracticeError::Store(e.to_string()))?;

    let write = || -> std::io::Result<()> {
      let mut file = fs::File::create(&tmp_path)?;
      file.write_all(json.as_bytes())?;
      file.sync_all()?;
      fs::rename(&tmp_path, &self.path)
    };
    write().map_err(|e| {
      let _ = fs::remove_file(&tmp_path);
      PracticeError::Store(format!("{}: {e}", self.path.display()))
    })?;
    debug!(target: "stats", path = %self.path.display(), bytes = json.len(), "Saved stats");
    Ok(())
  }
}
