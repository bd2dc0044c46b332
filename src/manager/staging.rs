//! Per-run artifacts: a private directory holding the scanned source and its wrapper.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, SandboxError};
use crate::policy::ExecutionProfile;
use crate::sandbox::{build_wrapper, ScratchDir, ScratchFile};

/// Files for one run. Dropping this removes all of them.
///
/// The executed bytes are the ones preflight saw: file runs are copied in,
/// never re-read from the caller's path.
#[derive(Debug)]
pub struct StagedRun {
    // Files before the directory: fields drop in declaration order.
    wrapper: ScratchFile,
    target: ScratchFile,
    dir: ScratchDir,
}

impl StagedRun {
    /// Stage `source` under a fresh private directory in `root`.
    ///
    /// `origin` is where the script claims to live (its directory stays
    /// importable). Snippets have no origin and use the staged copy.
    pub fn create(
        root: &Path,
        source: &[u8],
        origin: Option<&Path>,
        profile: &ExecutionProfile,
    ) -> Result<Self> {
        let dir = ScratchDir::create(root)?;
        let target = dir.file("user", source)?;
        let origin = origin.unwrap_or_else(|| target.path());
        let wrapper = dir.file("wrap", build_wrapper(target.path(), origin, profile))?;

        Ok(Self {
            wrapper,
            target,
            dir,
        })
    }

    /// Stage on the blocking pool so the async caller never waits on disk.
    pub async fn create_blocking(
        root: PathBuf,
        source: Vec<u8>,
        origin: Option<PathBuf>,
        profile: Arc<ExecutionProfile>,
    ) -> Result<Self> {
        let task_root = root.clone();
        tokio::task::spawn_blocking(move || {
            Self::create(&task_root, &source, origin.as_deref(), &profile)
        })
        .await
        .map_err(|e| SandboxError::Storage {
            path: root,
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?
    }

    pub fn wrapper(&self) -> &Path {
        self.wrapper.path()
    }

    pub fn target(&self) -> &Path {
        self.target.path()
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}
