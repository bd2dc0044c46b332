use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{append_line, timestamp};
use crate::verdict::{ExecutionResult, SourceKind};

pub const EVENT_LOG_FILE: &str = "code_exec.log";

/// One line of the event log.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionEvent {
    pub ts: String,
    pub src: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub profile: String,
    pub returncode: i32,
    pub stdout_len: usize,
    pub stderr_len: usize,
    pub duration_ms: u64,
}

impl ExecutionEvent {
    pub fn from_result(src: SourceKind, path: Option<&Path>, result: &ExecutionResult) -> Self {
        Self {
            ts: timestamp(),
            src,
            path: path.map(|p| p.display().to_string()),
            profile: result.profile_used.clone(),
            returncode: result.return_code,
            stdout_len: result.stdout.len(),
            stderr_len: result.stderr.len(),
            duration_ms: result.duration_ms,
        }
    }
}

/// Writer for `<log_dir>/code_exec.log`.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(log_dir: &Path) -> Self {
        Self {
            path: log_dir.join(EVENT_LOG_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, event: &ExecutionEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!("Failed to serialize execution event: {}", e);
                return;
            }
        };
        if let Err(e) = append_line(&self.path, &line) {
            tracing::debug!("Failed to append to {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvironmentDescriptor;
    use crate::verdict::{ExecutionResult, Outcome};

    fn result(rc: i32) -> ExecutionResult {
        ExecutionResult {
            ok: rc == 0,
            outcome: if rc == 0 { Outcome::Success } else { Outcome::RuntimeFailure },
            stdout: "hello\n".to_string(),
            stderr: String::new(),
            return_code: rc,
            duration_ms: 42,
            profile_used: "headless".to_string(),
            environment: EnvironmentDescriptor::unknown(),
            violations: Vec::new(),
            valid: rc == 0,
            hint: None,
        }
    }

    #[test]
    fn test_record_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(&dir.path().join("logs"));

        log.record(&ExecutionEvent::from_result(SourceKind::Snippet, None, &result(0)));
        log.record(&ExecutionEvent::from_result(
            SourceKind::File,
            Some(Path::new("/tmp/job.py")),
            &result(1),
        ));

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);

        assert_eq!(lines[0]["src"], "snippet");
        assert!(lines[0].get("path").is_none());
        assert_eq!(lines[0]["returncode"], 0);
        assert_eq!(lines[0]["stdout_len"], 6);
        assert_eq!(lines[0]["duration_ms"], 42);

        assert_eq!(lines[1]["src"], "file");
        assert_eq!(lines[1]["path"], "/tmp/job.py");
        assert_eq!(lines[1]["profile"], "headless");
    }

    #[cfg(unix)]
    #[test]
    fn test_unwritable_log_is_ignored() {
        let log = EventLog::new(Path::new("/proc/definitely/not/here"));
        log.record(&ExecutionEvent::from_result(SourceKind::Snippet, None, &result(0)));
    }
}
