//! Diagnostic logging for the sandbox host.
//!
//! Everything goes to stderr: `csbx` echoes a script's stdout verbatim, so
//! host diagnostics must never land there. The JSON-lines event log is
//! separate and written by the recorder regardless of this setup.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::EnvFilter;

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set to any value to turn on verbose sandbox diagnostics.
pub const DEBUG_ENV: &str = "CSBX_DEBUG";

const VERBOSE_FILTER: &str = "code_sandbox=debug,csbx=debug,warn";

/// Install the stderr subscriber.
///
/// `--debug` or `CSBX_DEBUG` selects the verbose filter; otherwise
/// `RUST_LOG` is honoured and the fallback is warnings only. Calling this
/// twice keeps the first subscriber.
pub fn init_debug_logging(force_debug: bool) {
    let verbose = force_debug || std::env::var_os(DEBUG_ENV).is_some();
    VERBOSE.store(verbose, Ordering::SeqCst);

    let filter = if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(verbose)
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .try_init()
        .ok();
}

/// Whether verbose diagnostics were requested.
pub fn is_debug_enabled() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// `tracing::debug!`, skipped entirely unless verbose diagnostics are on.
///
/// For messages whose arguments are costly to format, such as spawn
/// parameters and resource limits.
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        if $crate::utils::debug::is_debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}
