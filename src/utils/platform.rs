//! Platform detection utilities.

use serde::Serialize;

/// Host operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsKind {
    Linux,
    MacOS,
    OtherUnix,
    Windows,
    Unknown,
}

impl OsKind {
    /// Detect the current OS family.
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            OsKind::Linux
        } else if cfg!(target_os = "macos") {
            OsKind::MacOS
        } else if cfg!(unix) {
            OsKind::OtherUnix
        } else if cfg!(windows) {
            OsKind::Windows
        } else {
            OsKind::Unknown
        }
    }

    /// Check if per-process resource ceilings can be applied.
    pub fn supports_ceilings(&self) -> bool {
        matches!(self, OsKind::Linux | OsKind::MacOS | OsKind::OtherUnix)
    }

    /// Get the OS name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            OsKind::Linux => "Linux",
            OsKind::MacOS => "macOS",
            OsKind::OtherUnix => "Unix",
            OsKind::Windows => "Windows",
            OsKind::Unknown => "unknown",
        }
    }
}

/// Get the CPU architecture.
pub fn get_arch() -> &'static str {
    #[cfg(target_arch = "x86_64")]
    {
        "x64"
    }
    #[cfg(target_arch = "aarch64")]
    {
        "arm64"
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        "unknown"
    }
}

/// Get the WSL version (1 or 2+) if running in WSL.
/// Returns None if not running in WSL.
pub fn get_wsl_version() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let proc_version = std::fs::read_to_string("/proc/version").ok()?;
        parse_wsl_version_from_string(&proc_version)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Parse WSL version from a /proc/version string.
#[cfg(any(target_os = "linux", test))]
fn parse_wsl_version_from_string(proc_version: &str) -> Option<String> {
    let proc_lower = proc_version.to_lowercase();

    // "wsl" followed by a digit is an explicit version marker
    if let Some(pos) = proc_lower.find("wsl") {
        let after_wsl = &proc_lower[pos + 3..];
        if let Some(ch) = after_wsl.chars().next() {
            if ch.is_ascii_digit() {
                return Some(ch.to_string());
            }
        }
    }

    // Original WSL1 kernels only say "Microsoft"
    if proc_lower.contains("microsoft") {
        return Some("1".to_string());
    }

    None
}
