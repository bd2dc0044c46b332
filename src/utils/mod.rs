//! Utility modules.

pub mod debug;
pub mod path;
pub mod platform;

pub use debug::{init_debug_logging, is_debug_enabled, DEBUG_ENV};
pub use path::{expand_home, resolve_script_path};
pub use platform::{get_arch, get_wsl_version, OsKind};
