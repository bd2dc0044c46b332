use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{append_line, timestamp};
use crate::environment::EnvironmentDescriptor;
use crate::verdict::SourceKind;

pub const FAILURE_LOG_FILE: &str = "failures.log";

/// Stderr is cut to this many characters before it is journaled.
pub const MAX_STDERR_CHARS: usize = 4000;

/// Context attached to a journaled failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureMeta {
    pub profile: String,
    pub return_code: i32,
    pub env: serde_json::Value,
}

impl FailureMeta {
    pub fn new(profile: &str, return_code: i32, env: &EnvironmentDescriptor) -> Self {
        Self {
            profile: profile.to_string(),
            return_code,
            env: serde_json::to_value(env).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// One failed run, as stored in the journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEntry {
    pub ts: String,
    pub src: String,
    #[serde(default)]
    pub path: Option<String>,
    pub stderr: String,
    pub meta: FailureMeta,
}

/// Failed runs, kept for whatever repairs scripts downstream.
#[derive(Debug, Clone)]
pub struct FailureJournal {
    path: PathBuf,
}

impl FailureJournal {
    pub fn new(log_dir: &Path) -> Self {
        Self {
            path: log_dir.join(FAILURE_LOG_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_failure(&self, src: SourceKind, path: Option<&Path>, stderr: &str, meta: FailureMeta) {
        let entry = FailureEntry {
            ts: timestamp(),
            src: match src {
                SourceKind::Snippet => "snippet".to_string(),
                SourceKind::File => "file".to_string(),
            },
            path: path.map(|p| p.display().to_string()),
            stderr: stderr.chars().take(MAX_STDERR_CHARS).collect(),
            meta,
        };

        match serde_json::to_string(&entry) {
            Ok(line) => {
                if let Err(e) = append_line(&self.path, &line) {
                    tracing::debug!("Failed to append to {}: {}", self.path.display(), e);
                }
            }
            Err(e) => tracing::debug!("Failed to serialize failure entry: {}", e),
        }
    }

    /// The last `limit` entries, oldest first. Malformed lines are skipped.
    pub fn recent(&self, limit: usize) -> Vec<FailureEntry> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(_) => return Vec::new(),
        };

        let entries: Vec<FailureEntry> = BufReader::new(file)
            .lines()
            .map_while(|line| line.ok())
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect();

        let skip = entries.len().saturating_sub(limit);
        entries.into_iter().skip(skip).collect()
    }
}
