//! Policy violations and the in-memory violation store.

pub mod store;

use std::fmt;

use serde::Serialize;

pub use store::{SandboxViolationEvent, SandboxViolationStore, ViolationListener};

/// Category of a detected policy breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    BlockedImport,
    BlockedCall,
}

impl ViolationKind {
    fn label(&self) -> &'static str {
        match self {
            ViolationKind::BlockedImport => "import",
            ViolationKind::BlockedCall => "call",
        }
    }
}

/// A single breach found before execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyViolation {
    pub kind: ViolationKind,
    /// The blocked module root or callable that matched.
    pub name: String,
    /// 1-based line of the match.
    pub line_number: usize,
    pub message: String,
}

impl PolicyViolation {
    pub fn new(kind: ViolationKind, name: &str, line_number: usize) -> Self {
        let message = format!(
            "SandboxViolation: blocked {} '{}' (line {})",
            kind.label(),
            name,
            line_number
        );
        Self {
            kind,
            name: name.to_string(),
            line_number,
            message,
        }
    }
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
