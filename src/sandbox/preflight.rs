//! Static line-by-line scan for blocked imports and calls.
//!
//! This is a fast textual reject, not a parse. Dynamically computed import
//! names slip through here and are caught by the runtime wrapper instead.

use regex::Regex;

use crate::policy::ExecutionProfile;
use crate::violation::{PolicyViolation, ViolationKind};

/// Compiled matchers for one profile.
pub struct Preflight {
    imports: Vec<(String, Regex)>,
    calls: Vec<(String, Regex)>,
}

impl Preflight {
    /// Compile matchers for every blocked name in the profile.
    pub fn new(profile: &ExecutionProfile) -> Self {
        let imports = profile
            .blocked_imports
            .iter()
            .filter_map(|name| compile(name, import_pattern(name)))
            .collect();
        let calls = profile
            .blocked_calls
            .iter()
            .filter_map(|name| compile(name, call_pattern(name)))
            .collect();

        Self { imports, calls }
    }

    /// Scan source text. Violations come out in line order, imports before
    /// calls within a line, names sorted.
    pub fn scan(&self, source: &str) -> Vec<PolicyViolation> {
        let mut violations = Vec::new();

        for (index, line) in source.lines().enumerate() {
            let line_number = index + 1;
            for (name, re) in &self.imports {
                if re.is_match(line) {
                    violations.push(PolicyViolation::new(
                        ViolationKind::BlockedImport,
                        name,
                        line_number,
                    ));
                }
            }
            for (name, re) in &self.calls {
                if re.is_match(line) {
                    violations.push(PolicyViolation::new(
                        ViolationKind::BlockedCall,
                        name,
                        line_number,
                    ));
                }
            }
        }

        violations
    }
}

/// Scan source text against a profile.
pub fn scan(source: &str, profile: &ExecutionProfile) -> Vec<PolicyViolation> {
    Preflight::new(profile).scan(source)
}

/// `import X`, `import a, X as y`, `import X.sub`, `from X import ...`, `from X.sub import ...`
fn import_pattern(name: &str) -> String {
    format!(
        r"\b(?:import|from)\s+(?:[\w.]+(?:\s+as\s+\w+)?\s*,\s*)*{}\b",
        regex::escape(name)
    )
}

/// The name, not preceded by an identifier character or a dot, followed by `(`.
fn call_pattern(name: &str) -> String {
    format!(r"(?:^|[^\w.]){}\s*\(", regex::escape(name))
}

fn compile(name: &str, pattern: String) -> Option<(String, Regex)> {
    match Regex::new(&pattern) {
        Ok(re) => Some((name.to_string(), re)),
        Err(e) => {
            tracing::warn!("Skipping unmatchable policy name '{}': {}", name, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ExecutionProfile {
        ExecutionProfile::new(
            "test",
            ["socket", "requests", "tkinter"],
            ["os.system", "eval"],
        )
    }

    fn names(violations: &[PolicyViolation]) -> Vec<(String, usize)> {
        violations
            .iter()
            .map(|v| (v.name.clone(), v.line_number))
            .collect()
    }

    #[test]
    fn test_import_forms() {
        let source = "\
import socket
from requests import get
import json, tkinter as tk
import socket.timeout
from socket.errors import x
";
        let violations = scan(source, &profile());
        assert_eq!(
            names(&violations),
            vec![
                ("socket".to_string(), 1),
                ("requests".to_string(), 2),
                ("tkinter".to_string(), 3),
                ("socket".to_string(), 4),
                ("socket".to_string(), 5),
            ]
        );
        assert!(violations
            .iter()
            .all(|v| v.kind == ViolationKind::BlockedImport));
    }

    #[test]
    fn test_similar_names_pass() {
        let source = "\
import socketserver
from requests_cache import install
import mysocket
from pkg.socket import thing
";
        assert!(scan(source, &profile()).is_empty());
    }

    #[test]
    fn test_call_detection() {
        let source = "\
import os
os.system('ls')
x = eval ('1+1')
myos.system('ls')
value.eval()
retrieval(3)
";
        let violations = scan(source, &profile());
        assert_eq!(
            names(&violations),
            vec![("os.system".to_string(), 2), ("eval".to_string(), 3)]
        );
        assert!(violations.iter().all(|v| v.kind == ViolationKind::BlockedCall));
        assert_eq!(
            violations[0].message,
            "SandboxViolation: blocked call 'os.system' (line 2)"
        );
    }

    #[test]
    fn test_import_and_call_on_one_line() {
        let violations = scan("import socket; eval('x')", &profile());
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].kind, ViolationKind::BlockedImport);
        assert_eq!(violations[1].kind, ViolationKind::BlockedCall);
    }

    #[test]
    fn test_deterministic() {
        let source = "import requests\nimport socket\nos.system('x')\n";
        let preflight = Preflight::new(&profile());
        assert_eq!(preflight.scan(source), preflight.scan(source));
        assert_eq!(scan(source, &profile()), scan(source, &profile()));
    }

    #[test]
    fn test_malformed_input_never_panics() {
        let inputs = [
            "",
            "\n\n\n",
            "import",
            "from",
            "(((((",
            "import \u{0}\u{fffd} socket",
            "\r\nimport socket\r\n",
            "def f(:\n  eval(",
        ];
        for input in inputs {
            let _ = scan(input, &profile());
        }
        assert_eq!(scan("\r\nimport socket\r\n", &profile())[0].line_number, 2);
    }

    #[test]
    fn test_unrestricted_profile() {
        let open = ExecutionProfile::unrestricted("open");
        assert!(scan("import socket\nos.system('x')", &open).is_empty());
    }
}
