//! Path normalization utilities.

use std::path::PathBuf;

/// Expand ~ to the home directory.
pub fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).display().to_string();
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home.display().to_string();
        }
    }
    path.to_string()
}

/// Resolve a user-supplied script path.
/// - Expands ~ to home directory
/// - Makes relative paths absolute against the working directory
/// - Resolves symlinks when the path exists
pub fn resolve_script_path(path: &str) -> PathBuf {
    let expanded = PathBuf::from(expand_home(path));

    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(expanded),
            Err(_) => expanded,
        }
    };

    std::fs::canonicalize(&absolute).unwrap_or(absolute)
}
