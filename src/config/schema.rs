//! Configuration schema for the persisted settings file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SandboxError};

/// Default wall-clock budget for a single run.
pub const DEFAULT_EXEC_TIMEOUT_SEC: u64 = 8;

/// Profile used when nothing else selects one.
pub const DEFAULT_PROFILE: &str = "headless";

/// Blocked import and call lists for one profile.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PolicyOverride {
    /// Module roots rejected at preflight and at import time.
    #[serde(default)]
    pub blocked_imports: Vec<String>,

    /// Qualified callables (`os.system`, `eval`) rejected at preflight and revoked at runtime.
    #[serde(default)]
    pub blocked_calls: Vec<String>,
}

impl PolicyOverride {
    fn new(imports: &[&str], calls: &[&str]) -> Self {
        Self {
            blocked_imports: imports.iter().map(|s| s.to_string()).collect(),
            blocked_calls: calls.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Resource ceilings applied to every child.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LimitsConfig {
    /// CPU-time ceiling in seconds.
    #[serde(default = "default_cpu_seconds")]
    pub cpu_seconds: u64,

    /// Address-space ceiling in megabytes.
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u64,

    /// Bytes kept per output stream; the rest is drained and dropped.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

fn default_cpu_seconds() -> u64 {
    10
}

fn default_memory_mb() -> u64 {
    1024
}

fn default_max_output_bytes() -> usize {
    1024 * 1024
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            cpu_seconds: default_cpu_seconds(),
            memory_mb: default_memory_mb(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

/// Main sandbox configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Wall-clock timeout for one run, in seconds.
    pub exec_timeout_sec: u64,

    /// Generation timeout, consumed by the upstream caller only.
    pub gen_timeout_sec: u64,

    /// Token budget, consumed by the upstream caller only.
    pub token_budget: u64,

    /// Default profile name.
    pub profile: String,

    /// Per-profile blocked imports and calls.
    pub policy_overrides: BTreeMap<String, PolicyOverride>,

    /// Interpreter used to run the wrapper.
    pub interpreter: String,

    /// Resource ceilings.
    pub limits: LimitsConfig,

    /// Root for logs and scratch files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        let strict = PolicyOverride::new(
            &["matplotlib", "tkinter", "pygame", "requests", "socket"],
            &["os.system"],
        );
        let mut policy_overrides = BTreeMap::new();
        policy_overrides.insert("headless".to_string(), strict.clone());
        policy_overrides.insert("iot".to_string(), strict);
        policy_overrides.insert(
            "analysis".to_string(),
            PolicyOverride::new(&["tkinter", "pygame", "socket"], &["os.system"]),
        );

        Self {
            exec_timeout_sec: DEFAULT_EXEC_TIMEOUT_SEC,
            gen_timeout_sec: 20,
            token_budget: 2000,
            profile: DEFAULT_PROFILE.to_string(),
            policy_overrides,
            interpreter: "python3".to_string(),
            limits: LimitsConfig::default(),
            data_dir: None,
        }
    }
}

impl SandboxConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), SandboxError> {
        if self.exec_timeout_sec == 0 {
            return Err(
                ConfigError::ValidationError("exec_timeout_sec must be positive".to_string()).into(),
            );
        }

        if self.interpreter.trim().is_empty() {
            return Err(
                ConfigError::ValidationError("interpreter cannot be empty".to_string()).into(),
            );
        }

        if self.limits.memory_mb == 0 || self.limits.cpu_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "resource limits must be positive".to_string(),
            )
            .into());
        }

        for (profile, policy) in &self.policy_overrides {
            validate_names(profile, &policy.blocked_imports)?;
            validate_names(profile, &policy.blocked_calls)?;
        }

        Ok(())
    }

    /// Directory holding the event log and failure journal.
    pub fn log_dir(&self) -> PathBuf {
        self.data_root().join("logs")
    }

    /// Directory holding per-run scratch files.
    pub fn scratch_dir(&self) -> PathBuf {
        self.data_root().join("tmp")
    }

    fn data_root(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("code-sandbox")
        })
    }
}

fn validate_names(profile: &str, names: &[String]) -> Result<(), SandboxError> {
    for name in names {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(ConfigError::ValidationError(format!(
                "profile '{}': invalid name '{}'",
                profile, name
            ))
            .into());
        }
    }
    Ok(())
}
