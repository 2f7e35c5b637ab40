//! Append-only, human-readable record of the run.
//!
//! ```text
//! 2024-05-01 13:37:00 - Mutated constants outperformed V2.6! Updating best constants.
//! 2024-05-01 13:37:00 -   PAWN_VALUE: 113 -> 118
//! ```

use crate::error::{Result, TuneError};
use crate::params::ScalarChange;
use chrono::{Local, NaiveDateTime};
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static CHANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}) -   (\w+): (-?\d+) -> (-?\d+)$").unwrap()
});

/// One accepted scalar change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub timestamp: NaiveDateTime,
    pub name: String,
    pub old: i64,
    pub new: i64,
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a timestamped line and echoes it to the console log.
    pub fn log(&self, message: &str) -> Result<()> {
        log::info!("{}", message);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| TuneError::io(&self.path, e))?;

        writeln!(file, "{} - {}", Local::now().format(TIMESTAMP_FORMAT), message)
            .map_err(|e| TuneError::io(&self.path, e))
    }

    pub fn record_changes(&self, changes: &[ScalarChange]) -> Result<()> {
        for change in changes {
            self.log(&format!("  {}: {} -> {}", change.name, change.old, change.new))?;
        }
        Ok(())
    }

    /// Every change row in the log, oldest first. Other lines are skipped.
    pub fn entries(&self) -> Result<Vec<AuditEntry>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TuneError::io(&self.path, e)),
        };

        Ok(text
            .lines()
            .filter_map(|line| CHANGE_RE.captures(line))
            .filter_map(|caps| {
                Some(AuditEntry {
                    timestamp: NaiveDateTime::parse_from_str(&caps[1], TIMESTAMP_FORMAT).ok()?,
                    name: caps[2].to_string(),
                    old: caps[3].parse().ok()?,
                    new: caps[4].parse().ok()?,
                })
            })
            .collect())
    }
}
