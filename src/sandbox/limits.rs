//! Per-process resource ceilings.
//!
//! Ceilings are POSIX-only. They are applied in the child between fork and
//! exec, so they are in force before any guarded code runs and cannot be
//! raised again by the child.

use crate::config::LimitsConfig;

/// CPU-time and address-space ceilings for one child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    pub cpu_seconds: u64,
    pub memory_bytes: u64,
}

impl ResourceLimits {
    pub fn from_config(config: &LimitsConfig) -> Self {
        Self {
            cpu_seconds: config.cpu_seconds,
            memory_bytes: config.memory_mb.saturating_mul(1024 * 1024),
        }
    }

    /// Apply the ceilings to the calling process.
    ///
    /// Only async-signal-safe calls are made, so this is usable from a
    /// `pre_exec` hook. The CPU hard limit sits one second above the soft
    /// limit: SIGXCPU first, SIGKILL if that is ignored.
    #[cfg(unix)]
    pub fn apply(&self) -> std::io::Result<()> {
        use nix::sys::resource::{getrlimit, setrlimit, rlim_t, Resource};

        let set = |resource: Resource, soft: rlim_t, hard: rlim_t| -> std::io::Result<()> {
            // An unprivileged process cannot raise its hard limit.
            let (_, current_hard) = getrlimit(resource)?;
            let hard = hard.min(current_hard);
            setrlimit(resource, soft.min(hard), hard)?;
            Ok(())
        };

        let cpu = self.cpu_seconds as rlim_t;
        set(Resource::RLIMIT_CPU, cpu, cpu.saturating_add(1))?;

        let memory = self.memory_bytes as rlim_t;
        set(Resource::RLIMIT_AS, memory, memory)?;

        set(Resource::RLIMIT_CORE, 0, 0)?;
        Ok(())
    }
}
