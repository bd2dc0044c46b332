//! Host environment detection.
//!
//! A descriptor is computed fresh for every request. Any signal that cannot
//! be read falls back to `false` or `"unknown"`.

use std::io::IsTerminal;

use serde::Serialize;

use crate::utils::{get_arch, get_wsl_version, OsKind};

const UNKNOWN: &str = "unknown";

/// Snapshot of the host context a run was issued from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentDescriptor {
    pub os_kind: OsKind,
    pub os_release: String,
    pub arch: String,
    pub is_wsl: bool,
    pub is_remote_session: bool,
    pub has_display: bool,
    pub display: String,
    pub is_interactive: bool,
    pub user: String,
    pub host: String,
}

impl EnvironmentDescriptor {
    /// A descriptor with every signal at its conservative default.
    pub fn unknown() -> Self {
        Self {
            os_kind: OsKind::current(),
            os_release: UNKNOWN.to_string(),
            arch: get_arch().to_string(),
            is_wsl: false,
            is_remote_session: false,
            has_display: false,
            display: String::new(),
            is_interactive: false,
            user: UNKNOWN.to_string(),
            host: UNKNOWN.to_string(),
        }
    }
}

/// Detect the current host environment.
pub fn detect() -> EnvironmentDescriptor {
    let mut env = detect_from(|key| std::env::var(key).ok(), std::io::stdout().is_terminal());
    env.os_release = os_release().unwrap_or_else(|| UNKNOWN.to_string());
    env.host = hostname().unwrap_or_else(|| UNKNOWN.to_string());
    env.is_wsl = get_wsl_version().is_some();
    if let Some(user) = username() {
        env.user = user;
    }
    env
}

/// Build a descriptor from environment variables and terminal status.
pub fn detect_from<F>(var: F, is_interactive: bool) -> EnvironmentDescriptor
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| var(key).filter(|v| !v.is_empty());

    let display = non_empty("DISPLAY").or_else(|| non_empty("WAYLAND_DISPLAY"));
    let is_remote_session = ["SSH_CONNECTION", "SSH_CLIENT", "SSH_TTY"]
        .iter()
        .any(|key| non_empty(*key).is_some());
    let user = non_empty("USER")
        .or_else(|| non_empty("LOGNAME"))
        .unwrap_or_else(|| UNKNOWN.to_string());

    EnvironmentDescriptor {
        is_remote_session,
        has_display: display.is_some(),
        display: display.unwrap_or_default(),
        is_interactive,
        user,
        ..EnvironmentDescriptor::unknown()
    }
}

#[cfg(unix)]
fn os_release() -> Option<String> {
    nix::sys::utsname::uname()
        .ok()
        .map(|uts| uts.release().to_string_lossy().into_owned())
}

#[cfg(not(unix))]
fn os_release() -> Option<String> {
    None
}

#[cfg(unix)]
fn hostname() -> Option<String> {
    nix::unistd::gethostname()
        .ok()
        .map(|name| name.to_string_lossy().into_owned())
}

#[cfg(not(unix))]
fn hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok()
}

#[cfg(unix)]
fn username() -> Option<String> {
    nix::unistd::User::from_uid(nix::unistd::getuid())
        .ok()
        .flatten()
        .map(|user| user.name)
}

#[cfg(not(unix))]
fn username() -> Option<String> {
    std::env::var("USERNAME").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_detect_from_ssh_session() {
        let env = detect_from(vars(&[("SSH_CONNECTION", "10.0.0.1 22 10.0.0.2 22")]), false);
        assert!(env.is_remote_session);
        assert!(!env.has_display);
        assert_eq!(env.display, "");
    }

    #[test]
    fn test_detect_from_desktop() {
        let env = detect_from(vars(&[("WAYLAND_DISPLAY", "wayland-0"), ("USER", "ana")]), true);
        assert!(!env.is_remote_session);
        assert!(env.has_display);
        assert_eq!(env.display, "wayland-0");
        assert!(env.is_interactive);
        assert_eq!(env.user, "ana");
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let env = detect_from(vars(&[("DISPLAY", ""), ("SSH_TTY", "")]), false);
        assert!(!env.has_display);
        assert!(!env.is_remote_session);
        assert_eq!(env.user, "unknown");
    }

    #[test]
    fn test_detect_is_total() {
        let env = detect();
        assert!(!env.os_release.is_empty());
        assert!(!env.host.is_empty());
        assert_eq!(env.os_kind, OsKind::current());
    }
}
