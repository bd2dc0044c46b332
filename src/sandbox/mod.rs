//! Guarded execution: preflight, wrapper, scratch files, ceilings and the runner.

pub mod limits;
pub mod preflight;
pub mod runner;
pub mod scratch;
pub mod wrapper;

pub use limits::ResourceLimits;
pub use preflight::Preflight;
pub use runner::{minimal_env, ProcessRunner, RawRun, TIMEOUT_EXIT};
pub use scratch::{ScratchDir, ScratchFile};
pub use wrapper::{build_wrapper, BLOCKED_IMPORT_EXIT, UNCAUGHT_EXIT};

use serde::Serialize;

use crate::utils::OsKind;

/// Result of checking what the sandbox needs from the host.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SandboxDependencyCheck {
    /// Problems that make every run fail.
    pub errors: Vec<String>,
    /// Degraded protection.
    pub warnings: Vec<String>,
}

impl SandboxDependencyCheck {
    /// Returns true if there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check that the interpreter launches and that ceilings can be enforced.
pub fn check_dependencies(interpreter: &str, os: OsKind) -> SandboxDependencyCheck {
    let mut result = SandboxDependencyCheck::default();

    if !check_interpreter(interpreter) {
        result
            .errors
            .push(format!("interpreter '{}' not found or not runnable", interpreter));
    }
    if !os.supports_ceilings() {
        result.warnings.push(format!(
            "resource ceilings not supported on {} - only the timeout applies",
            os.name()
        ));
    }

    result
}

/// Check if the interpreter answers `--version`.
pub fn check_interpreter(interpreter: &str) -> bool {
    std::process::Command::new(interpreter)
        .arg("--version")
        .stdin(std::process::Stdio::null())
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_interpreter_is_an_error() {
        let check = check_dependencies("/nonexistent/python", OsKind::Linux);
        assert!(!check.is_ok());
        assert!(check.errors[0].contains("/nonexistent/python"));
        assert!(check.warnings.is_empty());
    }

    #[test]
    fn test_windows_warns_about_ceilings() {
        let check = check_dependencies("/nonexistent/python", OsKind::Windows);
        assert_eq!(check.warnings.len(), 1);
    }
}
