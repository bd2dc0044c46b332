//! Execution policies: profiles, the registry and intent hints.

pub mod intent;
pub mod profile;

pub use intent::Intent;
pub use profile::{ExecutionProfile, ProfileRegistry};
