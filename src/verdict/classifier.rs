//! Maps raw child output to an [`ExecutionResult`].

use std::path::Path;

use crate::environment::EnvironmentDescriptor;
use crate::error::SandboxError;
use crate::policy::ExecutionProfile;
use crate::sandbox::runner::{RawRun, TIMEOUT_EXIT};
use crate::verdict::{ExecutionResult, Outcome, POLICY_EXIT};
use crate::violation::PolicyViolation;

/// Return code used when the interpreter could not be launched.
pub const LAUNCH_FAILURE_EXIT: i32 = 127;

/// Stderr markers and the hint each one selects, first match wins.
const HINTS: &[(&str, &str)] = &[
    (
        "SandboxViolation",
        "The script used a blocked import or call; remove it or pick a more permissive profile.",
    ),
    (
        "SyntaxError",
        "Check the syntax: a colon, bracket or indentation level is probably missing.",
    ),
    (
        "ModuleNotFoundError",
        "A library is missing; install it or check that the import is not blocked.",
    ),
    (
        "MemoryError",
        "The script hit the memory ceiling; process the data in smaller pieces.",
    ),
    (
        "Timeout",
        "The script ran too long; look for an infinite loop or reduce the workload.",
    ),
];

const GENERIC_HINT: &str = "Unknown error; check the sandbox logs.";

/// Classify a finished (or rejected) run.
///
/// A non-empty violation list short-circuits to a policy failure with
/// return code 2; `raw` is ignored in that case and should be `None`.
pub fn classify(
    raw: Option<RawRun>,
    violations: Vec<PolicyViolation>,
    profile: &ExecutionProfile,
    environment: EnvironmentDescriptor,
) -> ExecutionResult {
    if !violations.is_empty() {
        let stderr = violations
            .iter()
            .map(|v| v.message.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        return finish(
            Outcome::PolicyViolation,
            String::new(),
            stderr,
            POLICY_EXIT,
            0,
            profile,
            environment,
            violations,
        );
    }

    let raw = raw.unwrap_or_else(|| RawRun {
        return_code: 1,
        stdout: String::new(),
        stderr: "No output collected".to_string(),
        duration_ms: 0,
        timed_out: false,
    });

    let outcome = if raw.timed_out || raw.return_code == TIMEOUT_EXIT {
        Outcome::Timeout
    } else if raw.return_code == 0 {
        Outcome::Success
    } else {
        Outcome::RuntimeFailure
    };

    finish(
        outcome,
        raw.stdout,
        raw.stderr,
        raw.return_code,
        raw.duration_ms,
        profile,
        environment,
        Vec::new(),
    )
}

/// Result for a file run whose path does not exist or cannot be read.
pub fn not_found(
    path: &Path,
    reason: Option<&str>,
    profile: &ExecutionProfile,
    environment: EnvironmentDescriptor,
) -> ExecutionResult {
    let stderr = match reason {
        Some(reason) => format!("Cannot read file {}: {}", path.display(), reason),
        None => format!("File not found: {}", path.display()),
    };
    finish(
        Outcome::NotFound,
        String::new(),
        stderr,
        POLICY_EXIT,
        0,
        profile,
        environment,
        Vec::new(),
    )
}

/// Result for a run whose child could not be started or awaited.
pub fn spawn_failure(
    error: &SandboxError,
    profile: &ExecutionProfile,
    environment: EnvironmentDescriptor,
) -> ExecutionResult {
    let return_code = match error {
        SandboxError::Spawn { .. } => LAUNCH_FAILURE_EXIT,
        _ => 1,
    };
    finish(
        Outcome::RuntimeFailure,
        String::new(),
        error.to_string(),
        return_code,
        0,
        profile,
        environment,
        Vec::new(),
    )
}

/// Cheap output heuristic: the run succeeded and printed something.
pub fn validate_output(ok: bool, stdout: &str) -> bool {
    ok && !stdout.trim().is_empty()
}

/// Pick a remediation hint from the error stream.
pub fn suggest_fix(stderr: &str) -> &'static str {
    HINTS
        .iter()
        .find(|(marker, _)| stderr.contains(marker))
        .map(|(_, hint)| *hint)
        .unwrap_or(GENERIC_HINT)
}

#[allow(clippy::too_many_arguments)]
fn finish(
    outcome: Outcome,
    stdout: String,
    stderr: String,
    return_code: i32,
    duration_ms: u64,
    profile: &ExecutionProfile,
    environment: EnvironmentDescriptor,
    violations: Vec<PolicyViolation>,
) -> ExecutionResult {
    let ok = return_code == 0 && violations.is_empty();
    let valid = validate_output(ok, &stdout);
    let hint = if !valid && !stderr.trim().is_empty() {
        Some(suggest_fix(&stderr).to_string())
    } else {
        None
    };

    ExecutionResult {
        ok,
        outcome,
        stdout,
        stderr,
        return_code,
        duration_ms,
        profile_used: profile.name.clone(),
        environment,
        violations,
        valid,
        hint,
    }
}
