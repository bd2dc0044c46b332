//! Configuration-derived state shared by every run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SandboxConfig;
use crate::policy::ProfileRegistry;
use crate::recorder::{EventLog, FailureJournal};
use crate::sandbox::ProcessRunner;

/// Everything rebuilt when the configuration changes.
pub struct SandboxState {
    /// The current configuration.
    pub config: SandboxConfig,

    /// Profiles known under this configuration.
    pub registry: Arc<ProfileRegistry>,

    /// Interpreter launcher with the configured ceilings.
    pub runner: ProcessRunner,

    /// Where scratch files go.
    pub scratch_dir: PathBuf,

    pub events: EventLog,

    pub failures: FailureJournal,
}

impl SandboxState {
    pub fn new(config: SandboxConfig) -> Self {
        let log_dir = config.log_dir();
        Self {
            registry: Arc::new(ProfileRegistry::from_config(&config)),
            runner: ProcessRunner::from_config(&config),
            scratch_dir: config.scratch_dir(),
            events: EventLog::new(&log_dir),
            failures: FailureJournal::new(&log_dir),
            config,
        }
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.config.exec_timeout_sec)
    }
}
