use std::{
    fs::{read_to_string, File},
    io::{self, Write},
    path::PathBuf,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::object_id::ObjectId;

/// One line of `log.txt`: a compact JSON object per successful commit.
/// The same schema is used at append time and at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub commit: ObjectId,
    pub date: DateTime<Utc>,
    pub message: String,
}

/// The append-only history log. Entries are appended in commit order
/// and reversed at read time for most-recent-first display; the file
/// itself is never rewritten or truncated.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn append(&self, entry: &LogEntry) -> Result<(), io::Error> {
        let mut file = File::options()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(entry)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Reads all entries, most recent first, along with the number of
    /// malformed lines that were skipped. Skips are logged but not
    /// fatal; the log is a display-only collaborator.
    pub fn read(&self) -> Result<(Vec<LogEntry>, usize), io::Error> {
        let mut entries = Vec::new();
        let mut skipped = 0;
        for line in read_to_string(&self.path)?.lines() {
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<LogEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    log::warn!("skipping malformed log line ({err}): {line}");
                    skipped += 1;
                }
            }
        }
        entries.reverse();
        Ok((entries, skipped))
    }
}
