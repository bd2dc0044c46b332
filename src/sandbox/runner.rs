//! Isolated child-process execution with ceilings and a wall-clock timeout.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::config::SandboxConfig;
use crate::debug_log;
use crate::error::{Result, SandboxError};
use crate::sandbox::limits::ResourceLimits;

/// Return code reported when the wall-clock budget is exceeded.
pub const TIMEOUT_EXIT: i32 = 124;

/// How long to keep draining pipes after the child is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

const READ_CHUNK: usize = 8192;

/// Variables passed through from the host; everything else is dropped.
const PASSTHROUGH_VARS: &[&str] = &["PATH", "HOME", "LANG", "TZ"];

const FALLBACK_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// What a child produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRun {
    pub return_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
}

/// Spawns one isolated interpreter per run.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    interpreter: String,
    limits: ResourceLimits,
    max_output_bytes: usize,
}

impl ProcessRunner {
    pub fn new(interpreter: &str, limits: ResourceLimits, max_output_bytes: usize) -> Self {
        #[cfg(not(unix))]
        tracing::warn!("Resource ceilings are not supported on this platform; only the timeout applies");

        Self {
            interpreter: interpreter.to_string(),
            limits,
            max_output_bytes,
        }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self::new(
            &config.interpreter,
            ResourceLimits::from_config(&config.limits),
            config.limits.max_output_bytes,
        )
    }

    /// Run the wrapper and wait up to `timeout` for it to finish.
    ///
    /// On timeout the whole process group is killed, whatever output was
    /// produced so far is kept and the return code is [`TIMEOUT_EXIT`].
    pub async fn execute(&self, wrapper_path: &Path, timeout: Duration) -> Result<RawRun> {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg("-B")
            .arg("-u")
            .arg(wrapper_path)
            .env_clear()
            .envs(minimal_env(host_vars()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        {
            let limits = self.limits;
            cmd.process_group(0);
            // SAFETY: the hook only issues getrlimit/setrlimit, which are
            // async-signal-safe, and touches no shared state.
            unsafe {
                cmd.pre_exec(move || limits.apply());
            }
        }

        debug_log!(
            "Spawning {} {} (timeout {:?}, limits {:?})",
            self.interpreter,
            wrapper_path.display(),
            timeout,
            self.limits
        );

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| SandboxError::Spawn {
            interpreter: self.interpreter.clone(),
            source,
        })?;
        // The child leads its own group, so the group id is its pid.
        let group = child.id();

        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));
        let stdout_task = spawn_reader(child.stdout.take(), stdout_buf.clone(), self.max_output_bytes);
        let stderr_task = spawn_reader(child.stderr.take(), stderr_buf.clone(), self.max_output_bytes);

        let waited = tokio::time::timeout(timeout, child.wait()).await;
        let (status, timed_out) = match waited {
            Ok(Ok(status)) => (Some(status), false),
            Ok(Err(e)) => {
                terminate(&mut child, group).await;
                return Err(SandboxError::Io(e));
            }
            Err(_) => {
                tracing::warn!("Child exceeded {:?}, killing process group", timeout);
                terminate(&mut child, group).await;
                (None, true)
            }
        };
        // Stragglers forked by the target share its process group.
        kill_group(group);

        let stdout = drain(stdout_task, &stdout_buf).await;
        let mut stderr = drain(stderr_task, &stderr_buf).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let return_code = match status {
            Some(status) => exit_code(status),
            None => {
                if !stderr.is_empty() && !stderr.ends_with('\n') {
                    stderr.push('\n');
                }
                stderr.push_str(&format!("Timeout after {}s", timeout.as_secs_f64()));
                TIMEOUT_EXIT
            }
        };

        tracing::debug!(
            "Child finished: rc={} stdout={}B stderr={}B in {}ms",
            return_code,
            stdout.len(),
            stderr.len(),
            duration_ms
        );

        Ok(RawRun {
            return_code,
            stdout,
            stderr,
            duration_ms,
            timed_out,
        })
    }
}

/// Reduce the host environment to the variables a script needs.
pub fn minimal_env<I>(vars: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut env: Vec<(String, String)> = vars
        .into_iter()
        .filter(|(key, _)| PASSTHROUGH_VARS.contains(&key.as_str()) || key.starts_with("LC_"))
        .collect();

    if !env.iter().any(|(key, _)| key == "PATH") {
        env.push(("PATH".to_string(), FALLBACK_PATH.to_string()));
    }
    env.push(("PYTHONUNBUFFERED".to_string(), "1".to_string()));
    env.push(("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string()));
    env.sort();
    env
}

/// Host variables that are valid UTF-8; `std::env::vars` would panic on the rest.
fn host_vars() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os().filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

fn spawn_reader<R>(reader: Option<R>, buf: Arc<Mutex<Vec<u8>>>, cap: usize) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut reader) = reader else { return };
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let mut buf = buf.lock();
                    let room = cap.saturating_sub(buf.len());
                    // Past the cap we keep reading so the child never blocks on a full pipe.
                    buf.extend_from_slice(&chunk[..n.min(room)]);
                }
            }
        }
    })
}

async fn drain(mut task: JoinHandle<()>, buf: &Arc<Mutex<Vec<u8>>>) -> String {
    if tokio::time::timeout(DRAIN_GRACE, &mut task).await.is_err() {
        task.abort();
    }
    let bytes = std::mem::take(&mut *buf.lock());
    String::from_utf8_lossy(&bytes).into_owned()
}

async fn terminate(child: &mut Child, group: Option<u32>) {
    kill_group(group);
    if let Err(e) = child.kill().await {
        tracing::debug!("Child already gone: {}", e);
    }
}

#[cfg(unix)]
fn kill_group(group: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pgid) = group {
        // ESRCH just means the group is already empty.
        let _ = killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_group: Option<u32>) {}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
