//! Code Sandbox - guarded execution of generated Python scripts.
//!
//! Each run is checked against an execution profile before anything starts,
//! then executed in a fresh interpreter behind a runtime guard, under CPU and
//! memory ceilings and a wall-clock timeout. Every outcome, including policy
//! rejections, timeouts and crashes, comes back as an [`ExecutionResult`].

pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod manager;
pub mod policy;
pub mod recorder;
pub mod sandbox;
pub mod utils;
pub mod verdict;
pub mod violation;

pub use config::{LimitsConfig, PolicyOverride, SandboxConfig};
pub use environment::EnvironmentDescriptor;
pub use error::{ConfigError, Result, SandboxError};
pub use manager::{ExecutionRequest, Sandbox, Source};
pub use policy::{ExecutionProfile, Intent, ProfileRegistry};
pub use verdict::{ExecutionResult, Outcome};
pub use violation::{PolicyViolation, SandboxViolationEvent, SandboxViolationStore, ViolationKind};

/// Re-export commonly used items.
pub mod prelude {
    pub use crate::config::SandboxConfig;
    pub use crate::error::{Result, SandboxError};
    pub use crate::manager::{ExecutionRequest, Sandbox};
    pub use crate::verdict::{ExecutionResult, Outcome};
    pub use crate::violation::{PolicyViolation, SandboxViolationStore};
}
