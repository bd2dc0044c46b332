//! Append-only JSON-lines records of what the sandbox ran.
//!
//! Recording never fails a run: write errors are logged at debug level and
//! dropped.

mod event_log;
mod journal;

pub use event_log::{EventLog, ExecutionEvent, EVENT_LOG_FILE};
pub use journal::{FailureEntry, FailureJournal, FailureMeta, FAILURE_LOG_FILE, MAX_STDERR_CHARS};

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Append one line to `path`, creating the parent directory if needed.
fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    // One write per line keeps concurrent appends from interleaving.
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    file.write_all(buf.as_bytes())
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
