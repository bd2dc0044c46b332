//! Execution results and their classification.

pub mod classifier;

use serde::Serialize;

use crate::environment::EnvironmentDescriptor;
use crate::violation::PolicyViolation;

pub use classifier::{classify, not_found, spawn_failure, suggest_fix, validate_output};

/// Return code for policy violations and missing files.
pub const POLICY_EXIT: i32 = 2;

/// Failure category of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    PolicyViolation,
    Timeout,
    RuntimeFailure,
    NotFound,
}

/// Where the program text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Snippet,
    File,
}

/// The verdict handed back to callers. Nothing else crosses the sandbox boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// True if and only if `return_code == 0` and `violations` is empty.
    pub ok: bool,
    pub outcome: Outcome,
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
    pub duration_ms: u64,
    pub profile_used: String,
    pub environment: EnvironmentDescriptor,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<PolicyViolation>,
    /// Output heuristic: succeeded and printed something.
    pub valid: bool,
    /// Remediation hint for invalid results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}
