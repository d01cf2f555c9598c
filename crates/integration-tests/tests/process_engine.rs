//! Process engine tests against real OS processes
//!
//! Covers the guarantees workflows rely on: both streams captured without
//! deadlock, timeouts forced to exit code 124, credentials kept out of the
//! logged command line.
#![cfg(unix)]

use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::sync::Arc;
use std::time::{Duration, Instant};
use workbench_core::application::task::constants::TIMEOUT_EXIT_CODE;
use workbench_core::domain::{CommandSpec, ProcessSlot};
use workbench_core::port::time_provider::SystemTimeProvider;
use workbench_core::port::{CommandRunner, ExecutionError};
use workbench_infra_system::SubprocessExecutor;

const ONE_MB: usize = 1024 * 1024;

fn executor() -> SubprocessExecutor {
    SubprocessExecutor::new(Arc::new(SystemTimeProvider))
        .with_grace(Duration::from_secs(2), Duration::from_secs(2))
}

fn shell(script: &str) -> CommandSpec {
    CommandSpec::builder("")
        .args(["sh", "-c", script])
        .timeout(Duration::from_secs(30))
        .build()
}

/// Test 1: A megabyte on each stream must not block the child
#[tokio::test]
async fn test_large_output_on_both_streams() {
    let spec = shell("head -c 1048576 /dev/zero | tr '\\0' a; head -c 1048576 /dev/zero | tr '\\0' b >&2");

    let result = executor().execute(&spec).await.unwrap();

    assert!(result.is_ok(), "exit {} stderr len {}", result.exit_code, result.stderr.len());
    assert_eq!(result.stdout.len(), ONE_MB);
    assert_eq!(result.stderr.len(), ONE_MB);
    assert!(result.stdout.bytes().all(|b| b == b'a'));
    assert!(result.stderr.bytes().all(|b| b == b'b'));
}

/// Test 2: Stdin is closed, so a reader sees EOF instead of hanging
#[tokio::test]
async fn test_stdin_closed() {
    let spec = CommandSpec::builder("")
        .arg("cat")
        .timeout(Duration::from_secs(10))
        .build();

    let started = Instant::now();
    let result = executor().execute(&spec).await.unwrap();

    assert_eq!(result.exit_code, 0);
    assert!(result.stdout.is_empty());
    assert!(started.elapsed() < Duration::from_secs(5));
}

/// Test 3: A timeout terminates the process and reports 124
#[tokio::test]
async fn test_timeout_terminates_process() {
    let spec = CommandSpec::builder("")
        .args(["sleep", "30"])
        .timeout(Duration::from_millis(300))
        .build();

    let started = Instant::now();
    let result = executor().execute(&spec).await.unwrap();

    assert_eq!(result.exit_code, TIMEOUT_EXIT_CODE);
    assert!(result.timed_out);
    assert!(result
        .stderr
        .contains("Process 'sleep 30' had been terminated forcibly after timeout."));
    assert!(started.elapsed() < Duration::from_secs(10));

    let pid = result.pid.expect("spawned process has a pid");
    assert!(
        kill(Pid::from_raw(pid as i32), None).is_err(),
        "process {} should be gone",
        pid
    );
}

/// Test 4: Credentials reach the process but never the display line
#[tokio::test]
async fn test_credentials_hidden_from_display() {
    let spec = CommandSpec::builder("")
        .args(["sh", "-c", "echo \"$1\"", "sh"])
        .credentials(["--token=hunter2"])
        .timeout(Duration::from_secs(10))
        .build();

    let result = executor().execute(&spec).await.unwrap();

    assert_eq!(result.stdout.trim(), "--token=hunter2");
    assert!(!spec.display_line().contains("hunter2"));
    assert!(!format!("{:?}", spec).contains("hunter2"));
}

/// Test 5: Unknown executables fail before anything is spawned
#[tokio::test]
async fn test_unknown_executable_not_found() {
    let spec = CommandSpec::builder("ois-no-such-tool-4242")
        .arg("--version")
        .build();

    let err = executor().execute(&spec).await.unwrap_err();

    assert!(matches!(err, ExecutionError::NotFound(name) if name == "ois-no-such-tool-4242"));
}

/// Test 6: Overlay variables are visible next to the inherited environment
#[tokio::test]
async fn test_env_overlay_and_working_dir() {
    let dir = tempfile::TempDir::new().unwrap();
    let spec = CommandSpec::builder("")
        .args(["sh", "-c", "echo \"$OIS_OVERLAY\"; pwd; command -v sh"])
        .env_var("OIS_OVERLAY", "from-overlay")
        .working_dir(dir.path())
        .timeout(Duration::from_secs(10))
        .build();

    let result = executor().execute(&spec).await.unwrap();
    let lines: Vec<&str> = result.stdout.lines().collect();

    assert_eq!(lines[0], "from-overlay");
    assert_eq!(
        std::fs::canonicalize(lines[1]).unwrap(),
        std::fs::canonicalize(dir.path()).unwrap()
    );
    // PATH still finds the system shell
    assert!(lines[2].ends_with("/sh"));
}

/// Test 7: A tracked process can be killed from outside while it runs
#[tokio::test]
async fn test_kill_tracked_process() {
    let executor = Arc::new(executor());
    let slot = Arc::new(ProcessSlot::new());

    let task = {
        let executor = Arc::clone(&executor);
        let slot = Arc::clone(&slot);
        tokio::spawn(async move {
            let spec = CommandSpec::builder("")
                .args(["sleep", "30"])
                .timeout(Duration::from_secs(60))
                .build();
            executor.execute_tracked(&spec, Some(slot.as_ref())).await
        })
    };

    let mut pid = None;
    for _ in 0..100 {
        if let Some(current) = slot.current() {
            pid = Some(current);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let pid = pid.expect("process published its pid");
    assert!(executor.is_alive(pid));

    executor.kill(pid).await.unwrap();
    let result = task.await.unwrap().unwrap();

    assert!(!result.is_ok());
    assert!(!executor.is_alive(pid));
    assert_eq!(slot.current(), None);
}

/// Test 8: A background child holding the pipes cannot stall the call past
/// the drain grace; what was written before the exit is kept
#[tokio::test]
async fn test_drain_grace_bounds_inherited_pipes() {
    let executor = SubprocessExecutor::new(Arc::new(SystemTimeProvider))
        .with_grace(Duration::from_millis(500), Duration::from_secs(1));

    let started = Instant::now();
    let result = executor
        .execute(&shell("sleep 5 & echo hi; exit 0"))
        .await
        .unwrap();

    assert_eq!(result.exit_code, TIMEOUT_EXIT_CODE);
    assert!(result.timed_out);
    assert!(result.stdout.starts_with("hi\n"), "{:?}", result.stdout);
    assert!(started.elapsed() < Duration::from_secs(3));
}
