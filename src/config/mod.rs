//! Configuration module.

pub mod loader;
pub mod schema;

pub use loader::{
    deep_merge, default_settings_path, load_config, load_or_init, parse_config,
};
pub use schema::{
    LimitsConfig, PolicyOverride, SandboxConfig, DEFAULT_EXEC_TIMEOUT_SEC, DEFAULT_PROFILE,
};
