//! Sandbox facade - the one entry point callers use.

pub mod staging;
pub mod state;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::config::{load_or_init, SandboxConfig};
use crate::environment::{self, EnvironmentDescriptor};
use crate::error::{ConfigError, Result, SandboxError};
use crate::policy::{ExecutionProfile, Intent, ProfileRegistry};
use crate::recorder::{EventLog, ExecutionEvent, FailureJournal, FailureMeta};
use crate::sandbox::{self, Preflight, ProcessRunner, SandboxDependencyCheck};
use crate::utils::{resolve_script_path, OsKind};
use crate::verdict::{self, ExecutionResult, SourceKind};
use crate::violation::{SandboxViolationEvent, SandboxViolationStore};

use self::staging::StagedRun;
use self::state::SandboxState;

/// Program text to run.
#[derive(Debug, Clone)]
pub enum Source {
    /// Inline code, written to a scratch file before running.
    Snippet(String),
    /// A script on disk, run in place.
    File(PathBuf),
}

/// One execution request.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub source: Source,
    /// Explicit profile name. Unknown names fall back to a default.
    pub profile: Option<String>,
    /// Free-text description of the task, used to pick a profile.
    pub prompt: Option<String>,
    /// Overrides the configured wall-clock budget.
    pub timeout: Option<Duration>,
}

impl ExecutionRequest {
    pub fn snippet(code: impl Into<String>) -> Self {
        Self {
            source: Source::Snippet(code.into()),
            profile: None,
            prompt: None,
            timeout: None,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::File(path.into()),
            profile: None,
            prompt: None,
            timeout: None,
        }
    }

    pub fn with_profile(mut self, profile: Option<&str>) -> Self {
        self.profile = profile.map(str::to_string);
        self
    }

    pub fn with_prompt(mut self, prompt: Option<&str>) -> Self {
        self.prompt = prompt.map(str::to_string);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Per-run copy of the shared state, taken so no lock is held across awaits.
struct RunContext {
    registry: Arc<ProfileRegistry>,
    runner: ProcessRunner,
    scratch_dir: PathBuf,
    events: EventLog,
    failures: FailureJournal,
    timeout: Duration,
}

/// Guarded executor for generated scripts.
///
/// Every run is independent: a fresh interpreter process, fresh scratch
/// files and a freshly resolved profile. Runs may proceed concurrently.
pub struct Sandbox {
    state: Arc<RwLock<SandboxState>>,
    violations: Arc<SandboxViolationStore>,
}

impl Sandbox {
    /// Create a sandbox for the given configuration.
    pub fn new(config: SandboxConfig) -> Self {
        tracing::debug!(
            "Sandbox ready: profile={} interpreter={} timeout={}s",
            config.profile,
            config.interpreter,
            config.exec_timeout_sec
        );
        Self {
            state: Arc::new(RwLock::new(SandboxState::new(config))),
            violations: Arc::new(SandboxViolationStore::new()),
        }
    }

    /// Create a sandbox from the settings file (or the default location).
    pub fn from_settings(path: Option<&Path>) -> Self {
        Self::new(load_or_init(path))
    }

    /// Get the current configuration.
    pub fn config(&self) -> SandboxConfig {
        self.state.read().config.clone()
    }

    /// Replace the configuration. Runs already in flight keep the old one.
    pub fn update_config(&self, config: SandboxConfig) -> Result<()> {
        config.validate()?;
        *self.state.write() = SandboxState::new(config);
        Ok(())
    }

    /// Describe the host.
    pub fn detect_environment(&self) -> EnvironmentDescriptor {
        environment::detect()
    }

    /// Names of every known profile, sorted.
    pub fn profile_names(&self) -> Vec<String> {
        self.state.read().registry.names()
    }

    /// Fail if `name` is not a known profile.
    pub fn ensure_profile(&self, name: &str) -> std::result::Result<(), ConfigError> {
        self.state.read().registry.ensure_known(name)
    }

    /// The profile a request would run under on this host.
    pub fn resolve_profile(&self, profile: Option<&str>, prompt: Option<&str>) -> Arc<ExecutionProfile> {
        let environment = self.detect_environment();
        let intent = prompt.map(Intent::classify);
        self.state
            .read()
            .registry
            .resolve_profile(profile, intent, &environment)
    }

    /// Check that the configured interpreter runs and ceilings apply.
    pub fn check_dependencies(&self) -> SandboxDependencyCheck {
        let interpreter = self.state.read().config.interpreter.clone();
        sandbox::check_dependencies(&interpreter, OsKind::current())
    }

    /// Recent preflight rejections.
    pub fn violation_store(&self) -> Arc<SandboxViolationStore> {
        self.violations.clone()
    }

    /// Journal of failed runs.
    pub fn failure_journal(&self) -> FailureJournal {
        self.state.read().failures.clone()
    }

    /// Run inline code.
    pub async fn run_snippet(&self, source: &str, profile: Option<&str>) -> Result<ExecutionResult> {
        self.run(ExecutionRequest::snippet(source).with_profile(profile))
            .await
    }

    /// Run a script on disk.
    pub async fn run_file(&self, path: impl AsRef<Path>, profile: Option<&str>) -> Result<ExecutionResult> {
        self.run(ExecutionRequest::file(path.as_ref()).with_profile(profile))
            .await
    }

    /// Run one request.
    ///
    /// Policy violations, timeouts, crashes, missing files and launch
    /// failures all come back as an [`ExecutionResult`]. Only a failure to
    /// write a scratch file is returned as an error.
    pub async fn run(&self, request: ExecutionRequest) -> Result<ExecutionResult> {
        let ctx = self.snapshot();
        let environment = self.detect_environment();
        let intent = request.prompt.as_deref().map(Intent::classify);
        let profile = ctx
            .registry
            .resolve_profile(request.profile.as_deref(), intent, &environment);
        let timeout = request.timeout.unwrap_or(ctx.timeout);

        tracing::debug!(
            "Run under profile '{}' (remote={}, display={})",
            profile.name,
            environment.is_remote_session,
            environment.has_display
        );

        let (kind, path, result) = match request.source {
            Source::Snippet(code) => {
                let result = self
                    .run_snippet_inner(&ctx, &code, &profile, environment, timeout)
                    .await?;
                (SourceKind::Snippet, None, result)
            }
            Source::File(path) => {
                let path = resolve_script_path(&path.to_string_lossy());
                let result = self
                    .run_file_inner(&ctx, &path, &profile, environment, timeout)
                    .await?;
                (SourceKind::File, Some(path), result)
            }
        };

        record(&ctx, kind, path, &result).await;
        Ok(result)
    }

    async fn run_snippet_inner(
        &self,
        ctx: &RunContext,
        code: &str,
        profile: &Arc<ExecutionProfile>,
        environment: EnvironmentDescriptor,
        timeout: Duration,
    ) -> Result<ExecutionResult> {
        let violations = Preflight::new(profile).scan(code);
        if !violations.is_empty() {
            self.violations
                .add(SandboxViolationEvent::new(&profile.name, None, violations.clone()));
            return Ok(verdict::classify(None, violations, profile, environment));
        }

        let staged = StagedRun::create_blocking(
            ctx.scratch_dir.clone(),
            code.as_bytes().to_vec(),
            None,
            profile.clone(),
        )
        .await?;
        self.execute(ctx, &staged, profile, environment, timeout)
            .await
    }

    async fn run_file_inner(
        &self,
        ctx: &RunContext,
        path: &Path,
        profile: &Arc<ExecutionProfile>,
        environment: EnvironmentDescriptor,
        timeout: Duration,
    ) -> Result<ExecutionResult> {
        let source = match tokio::fs::read(path).await {
            Ok(source) => source,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(verdict::not_found(path, None, profile, environment));
            }
            Err(e) => {
                let reason = e.to_string();
                return Ok(verdict::not_found(path, Some(&reason), profile, environment));
            }
        };

        // Scripts may declare a non-UTF-8 source encoding; the scan only
        // needs the ASCII keywords, the interpreter gets the original bytes.
        let violations = Preflight::new(profile).scan(&String::from_utf8_lossy(&source));
        if !violations.is_empty() {
            self.violations.add(SandboxViolationEvent::new(
                &profile.name,
                Some(path.display().to_string()),
                violations.clone(),
            ));
            return Ok(verdict::classify(None, violations, profile, environment));
        }

        let staged = StagedRun::create_blocking(
            ctx.scratch_dir.clone(),
            source,
            Some(path.to_path_buf()),
            profile.clone(),
        )
        .await?;
        self.execute(ctx, &staged, profile, environment, timeout)
            .await
    }

    /// Run a staged wrapper and classify what came back.
    async fn execute(
        &self,
        ctx: &RunContext,
        staged: &StagedRun,
        profile: &Arc<ExecutionProfile>,
        environment: EnvironmentDescriptor,
        timeout: Duration,
    ) -> Result<ExecutionResult> {
        match ctx.runner.execute(staged.wrapper(), timeout).await {
            Ok(raw) => Ok(verdict::classify(Some(raw), Vec::new(), profile, environment)),
            Err(e @ SandboxError::Storage { .. }) => Err(e),
            Err(e) => {
                tracing::warn!("Execution failed: {}", e);
                Ok(verdict::spawn_failure(&e, profile, environment))
            }
        }
    }

    fn snapshot(&self) -> RunContext {
        let state = self.state.read();
        RunContext {
            registry: state.registry.clone(),
            runner: state.runner.clone(),
            scratch_dir: state.scratch_dir.clone(),
            events: state.events.clone(),
            failures: state.failures.clone(),
            timeout: state.exec_timeout(),
        }
    }
}

async fn record(ctx: &RunContext, kind: SourceKind, path: Option<PathBuf>, result: &ExecutionResult) {
    tracing::info!(
        "{:?} run finished: profile={} rc={} outcome={:?} in {}ms",
        kind,
        result.profile_used,
        result.return_code,
        result.outcome,
        result.duration_ms
    );

    let event = ExecutionEvent::from_result(kind, path.as_deref(), result);
    let failure = (!result.ok).then(|| {
        (
            result.stderr.clone(),
            FailureMeta::new(&result.profile_used, result.return_code, &result.environment),
        )
    });
    let events = ctx.events.clone();
    let failures = ctx.failures.clone();

    let written = tokio::task::spawn_blocking(move || {
        events.record(&event);
        if let Some((stderr, meta)) = failure {
            failures.record_failure(kind, path.as_deref(), &stderr, meta);
        }
    })
    .await;

    if let Err(e) = written {
        tracing::debug!("Recorder task failed: {}", e);
    }
}
