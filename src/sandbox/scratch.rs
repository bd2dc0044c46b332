//! Per-run private directories and the files staged in them, removed on drop.

use std::fs::{DirBuilder, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::{Result, SandboxError};

const MAX_ATTEMPTS: usize = 8;

/// A directory private to one run, removed with everything in it on drop.
///
/// Created with mode 0700 under the shared scratch root, so concurrent runs
/// cannot see, import or rewrite each other's files through `sys.path`.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create `<root>/run_<pid>_<random>`.
    pub fn create(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root).map_err(|source| SandboxError::Storage {
            path: root.to_path_buf(),
            source,
        })?;

        for _ in 0..MAX_ATTEMPTS {
            let path = root.join(unique_name("run", ""));
            match private_dir(&path) {
                Ok(()) => return Ok(Self { path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(SandboxError::Storage { path, source }),
            }
        }

        Err(exhausted(root))
    }

    /// Create a file inside this directory.
    pub fn file(&self, prefix: &str, contents: impl AsRef<[u8]>) -> Result<ScratchFile> {
        ScratchFile::create(&self.path, prefix, contents)
    }

    /// Get the directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove scratch directory {:?}: {}", self.path, e),
        }
    }
}

/// A file that exists for the lifetime of this value.
///
/// The file is removed when the value is dropped, on every exit path.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Create `<dir>/<prefix>_<pid>_<random>.py` holding `contents`.
    pub fn create(dir: &Path, prefix: &str, contents: impl AsRef<[u8]>) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|source| SandboxError::Storage {
            path: dir.to_path_buf(),
            source,
        })?;

        for _ in 0..MAX_ATTEMPTS {
            let path = dir.join(unique_name(prefix, ".py"));
            let file = open_new(&path);

            match file {
                Ok(mut file) => {
                    // From here on, Drop cleans up even if the write fails.
                    let scratch = Self { path };
                    file.write_all(contents.as_ref())
                        .and_then(|_| file.flush())
                        .map_err(|source| SandboxError::Storage {
                            path: scratch.path.clone(),
                            source,
                        })?;
                    return Ok(scratch);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(SandboxError::Storage { path, source }),
            }
        }

        Err(exhausted(dir))
    }

    /// Get the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove scratch file {:?}: {}", self.path, e),
        }
    }
}

#[cfg(unix)]
fn open_new(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_new(path: &Path) -> std::io::Result<std::fs::File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

#[cfg(unix)]
fn private_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    DirBuilder::new().mode(0o700).create(path)
}

#[cfg(not(unix))]
fn private_dir(path: &Path) -> std::io::Result<()> {
    DirBuilder::new().create(path)
}

fn exhausted(dir: &Path) -> SandboxError {
    SandboxError::Storage {
        path: dir.to_path_buf(),
        source: std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "could not allocate a unique scratch name",
        ),
    }
}

/// Generate a unique name.
fn unique_name(prefix: &str, extension: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: u64 = rng.gen();
    format!("{}_{}_{:016x}{}", prefix, std::process::id(), suffix, extension)
}
