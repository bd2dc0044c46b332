//! End-to-end runs against a real interpreter.
//!
//! Tests that need Python return early when `python3` is not installed.

use std::path::Path;
use std::time::{Duration, Instant};

use code_sandbox::config::{PolicyOverride, SandboxConfig};
use code_sandbox::manager::{ExecutionRequest, Sandbox};
use code_sandbox::sandbox::check_interpreter;
use code_sandbox::verdict::Outcome;

fn have_python() -> bool {
    let found = check_interpreter("python3");
    if !found {
        eprintln!("python3 not found, skipping");
    }
    found
}

fn config_in(dir: &Path) -> SandboxConfig {
    let mut config = SandboxConfig {
        data_dir: Some(dir.to_path_buf()),
        ..SandboxConfig::default()
    };
    config
        .policy_overrides
        .insert("open".to_string(), PolicyOverride::default());
    config
}

fn scratch_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir.join("tmp"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_hello_world_under_open_profile() {
    if !have_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let sandbox = Sandbox::new(config_in(dir.path()));

    let result = sandbox
        .run_snippet("print('hello')\n", Some("open"))
        .await
        .unwrap();

    assert!(result.ok, "stderr: {}", result.stderr);
    assert!(result.valid);
    assert_eq!(result.return_code, 0);
    assert_eq!(result.stdout.trim(), "hello");
    assert_eq!(result.profile_used, "open");
    assert_eq!(scratch_entries(dir.path()), 0);
}

#[tokio::test]
async fn test_blocked_import_rejected_with_line_number() {
    if !have_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let sandbox = Sandbox::new(config_in(dir.path()));

    let result = sandbox
        .run_snippet("x = 1\nimport requests\nprint(x)\n", Some("headless"))
        .await
        .unwrap();

    assert!(!result.ok);
    assert_eq!(result.return_code, 2);
    assert_eq!(result.outcome, Outcome::PolicyViolation);
    assert_eq!(result.violations.len(), 1);
    assert_eq!(result.violations[0].name, "requests");
    assert_eq!(result.violations[0].line_number, 2);
    assert!(result.stdout.is_empty());
}

#[tokio::test]
async fn test_preflight_is_deterministic() {
    if !have_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let sandbox = Sandbox::new(config_in(dir.path()));
    let code = "import socket, tkinter\nos.system('ls')\nimport pygame\n";

    let first = sandbox.run_snippet(code, Some("headless")).await.unwrap();
    let second = sandbox.run_snippet(code, Some("headless")).await.unwrap();

    assert_eq!(first.violations, second.violations);
    assert_eq!(first.stderr, second.stderr);
    assert_eq!(first.violations.len(), 4);
}

#[tokio::test]
async fn test_infinite_loop_times_out() {
    if !have_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let sandbox = Sandbox::new(config_in(dir.path()));

    let started = Instant::now();
    let request = ExecutionRequest::snippet("print('start', flush=True)\nwhile True:\n    pass\n")
        .with_profile(Some("open"))
        .with_timeout(Duration::from_secs(1));
    let result = sandbox.run(request).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!result.ok);
    assert_eq!(result.return_code, 124);
    assert_eq!(result.outcome, Outcome::Timeout);
    assert!(result.stderr.contains("Timeout"));
    assert!(result.stdout.contains("start"));
    assert_eq!(scratch_entries(dir.path()), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_memory_ceiling() {
    if !have_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.limits.memory_mb = 256;
    let sandbox = Sandbox::new(config);

    let result = sandbox
        .run_snippet("data = bytearray(1024 * 1024 * 1024)\nprint(len(data))\n", Some("open"))
        .await
        .unwrap();

    assert!(!result.ok);
    assert_ne!(result.return_code, 0);
}

#[tokio::test]
async fn test_indirect_blocked_call() {
    if !have_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let sandbox = Sandbox::new(config_in(dir.path()));

    let code = "import os\nrun = getattr(os, 'sys' + 'tem')\nrun('echo leaked')\n";
    let result = sandbox.run_snippet(code, Some("headless")).await.unwrap();

    assert!(!result.ok);
    assert_eq!(result.return_code, 1);
    assert!(result.violations.is_empty());
    assert!(result.stderr.contains("SandboxViolation: blocked call 'os.system'"));
    assert!(!result.stdout.contains("leaked"));
}

#[tokio::test]
async fn test_dynamic_import_blocked_at_runtime() {
    if !have_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let sandbox = Sandbox::new(config_in(dir.path()));

    let code = "name = 'soc' + 'ket'\nmod = __import__(name)\nprint('escaped')\n";
    let result = sandbox.run_snippet(code, Some("headless")).await.unwrap();

    assert!(!result.ok);
    assert_eq!(result.return_code, 2);
    assert!(result.stderr.contains("SandboxViolation: blocked import 'socket'"));
    assert!(!result.stdout.contains("escaped"));
}

#[tokio::test]
async fn test_uncaught_exception() {
    if !have_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let sandbox = Sandbox::new(config_in(dir.path()));

    let result = sandbox
        .run_snippet("raise ValueError('boom')\n", Some("open"))
        .await
        .unwrap();

    assert_eq!(result.return_code, 1);
    assert_eq!(result.outcome, Outcome::RuntimeFailure);
    assert!(result.stderr.contains("ValueError: boom"));
    assert!(result.hint.is_some());
}

#[tokio::test]
async fn test_run_file_in_place() {
    if !have_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let sandbox = Sandbox::new(config_in(dir.path()));

    let project = tempfile::tempdir().unwrap();
    std::fs::write(project.path().join("helper.py"), "VALUE = 41\n").unwrap();
    let script = project.path().join("main.py");
    std::fs::write(
        &script,
        "import sys\nfrom helper import VALUE\nprint(VALUE + 1, __name__)\nprint(__file__)\nsys.exit(3)\n",
    )
    .unwrap();

    let result = sandbox.run_file(&script, Some("headless")).await.unwrap();

    // The script runs from a staged copy but still sees its own location
    let canonical = std::fs::canonicalize(&script).unwrap();
    let lines: Vec<&str> = result.stdout.lines().collect();
    assert_eq!(lines, vec!["42 __main__", &*canonical.to_string_lossy()]);
    assert_eq!(result.return_code, 3);
    assert!(!result.ok);
    assert!(script.exists());
    assert_eq!(scratch_entries(dir.path()), 0);
}

#[tokio::test]
async fn test_run_file_with_declared_encoding() {
    if !have_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let sandbox = Sandbox::new(config_in(dir.path()));

    let project = tempfile::tempdir().unwrap();
    let script = project.path().join("latin.py");
    std::fs::write(&script, b"# -*- coding: latin-1 -*-\nword = 'caf\xe9'\nprint(len(word), ord(word[-1]))\n").unwrap();

    let result = sandbox.run_file(&script, Some("headless")).await.unwrap();

    assert!(result.ok, "stderr: {}", result.stderr);
    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(result.stdout.trim(), "4 233");
}

#[tokio::test]
async fn test_non_utf8_file_is_still_scanned() {
    let dir = tempfile::tempdir().unwrap();
    let sandbox = Sandbox::new(config_in(dir.path()));

    let project = tempfile::tempdir().unwrap();
    let script = project.path().join("latin.py");
    std::fs::write(&script, b"# -*- coding: latin-1 -*-\n# caf\xe9\nimport socket\n").unwrap();

    let result = sandbox.run_file(&script, Some("headless")).await.unwrap();

    assert_eq!(result.return_code, 2);
    assert_eq!(result.outcome, Outcome::PolicyViolation);
    assert_eq!(result.violations[0].line_number, 3);
}

#[tokio::test]
async fn test_blocked_call_through_alias_module() {
    if !have_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let sandbox = Sandbox::new(config_in(dir.path()));

    // posix.system is the same object as os.system; both must be revoked
    let code = "import os, posix\nprint(posix.system is os.system)\nposix.system('echo LEAKED')\n";
    let result = sandbox.run_snippet(code, Some("headless")).await.unwrap();

    assert!(!result.ok);
    assert_eq!(result.return_code, 1);
    assert_eq!(result.stdout.trim(), "True");
    assert!(result.stderr.contains("SandboxViolation: blocked call 'os.system'"));
    assert!(!result.stdout.contains("LEAKED"));
}

#[tokio::test]
async fn test_runs_cannot_see_each_other() {
    if !have_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let sandbox = Sandbox::new(config_in(dir.path()));

    let tmp = dir.path().join("tmp");
    std::fs::create_dir_all(&tmp).unwrap();
    let planted = tmp.join("user_1_other.py");
    std::fs::write(&planted, "print('from another run')\n").unwrap();

    let code = "import os\nprint(sorted(name[:5] for name in os.listdir(os.path.dirname(__file__))))\ntry:\n    import user_1_other\nexcept ImportError:\n    print('isolated')\n";
    let result = sandbox.run_snippet(code, Some("open")).await.unwrap();

    assert!(result.ok, "stderr: {}", result.stderr);
    assert_eq!(result.stdout, "['user_', 'wrap_']\nisolated\n");
    assert!(planted.exists());
    assert_eq!(scratch_entries(dir.path()), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_cpu_ceiling_ends_busy_loop() {
    if !have_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.limits.cpu_seconds = 1;
    let sandbox = Sandbox::new(config);

    let started = Instant::now();
    let request = ExecutionRequest::snippet("while True:\n    pass\n")
        .with_profile(Some("open"))
        .with_timeout(Duration::from_secs(10));
    let result = sandbox.run(request).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(8));
    assert!(!result.ok);
    assert_ne!(result.return_code, 0);
    assert_ne!(result.return_code, 124);
    // SIGXCPU at the soft limit, SIGKILL at the hard one
    assert!(
        result.return_code == 128 + 24 || result.return_code == 128 + 9,
        "rc={}",
        result.return_code
    );
    assert_eq!(result.outcome, Outcome::RuntimeFailure);
}

#[tokio::test]
async fn test_missing_file_names_path() {
    let dir = tempfile::tempdir().unwrap();
    let sandbox = Sandbox::new(config_in(dir.path()));
    let missing = dir.path().join("does_not_exist.py");

    let result = sandbox.run_file(&missing, None).await.unwrap();

    assert_eq!(result.return_code, 2);
    assert_eq!(result.outcome, Outcome::NotFound);
    assert!(result.stderr.contains(&*missing.to_string_lossy()));
}

#[tokio::test]
async fn test_every_run_is_logged() {
    if !have_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let sandbox = Sandbox::new(config_in(dir.path()));

    sandbox.run_snippet("print(1)\n", Some("open")).await.unwrap();
    sandbox.run_snippet("import socket\n", Some("headless")).await.unwrap();

    let log = std::fs::read_to_string(dir.path().join("logs").join("code_exec.log")).unwrap();
    let events: Vec<serde_json::Value> = log
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["returncode"], 0);
    assert_eq!(events[1]["returncode"], 2);
    assert_eq!(events[1]["profile"], "headless");

    let failures = sandbox.failure_journal().recent(10);
    assert_eq!(failures.len(), 1);
    assert!(failures[0].stderr.contains("socket"));
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    if !have_python() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let sandbox = std::sync::Arc::new(Sandbox::new(config_in(dir.path())));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let sandbox = sandbox.clone();
            tokio::spawn(async move {
                sandbox
                    .run_snippet(&format!("print({})\n", i), Some("open"))
                    .await
                    .unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap();
        assert_eq!(result.stdout.trim(), i.to_string());
    }
    assert_eq!(scratch_entries(dir.path()), 0);
}
