//! End-to-end tests driving the compiled binary against small fake-backend
//! shell scripts that emit canned NDJSON, the same harness shape as
//! `tumf-agent-exec/tests/integration.rs` (`binary()` locates the compiled
//! exe relative to the test binary's own path; each test runs the process
//! and inspects its stdout/stderr/exit code directly).

use std::path::PathBuf;
use std::process::{Command, Output};

fn binary() -> PathBuf {
    let mut p = std::env::current_exe().expect("current exe");
    p.pop();
    if p.ends_with("deps") {
        p.pop();
    }
    p.push("codex-supervisor");
    if cfg!(windows) {
        p.set_extension("exe");
    }
    p
}

fn fixture(name: &str) -> PathBuf {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&path).expect("fixture exists").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod fixture");
    }
    path
}

fn run(backend: &str, args: &[&str], stdin_text: Option<&str>) -> Output {
    use std::io::Write;
    let mut cmd = Command::new(binary());
    cmd.args(args);
    cmd.env("CODEX_EXEC_BINARY", fixture(backend));
    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    let mut child = cmd.spawn().expect("spawn codex-supervisor");
    if let Some(text) = stdin_text {
        child
            .stdin
            .take()
            .expect("stdin piped")
            .write_all(text.as_bytes())
            .expect("write stdin");
    } else {
        drop(child.stdin.take());
    }
    child.wait_with_output().expect("wait for codex-supervisor")
}

#[test]
fn single_task_success_prints_message_and_session_id() {
    let output = run("fake_backend_success.sh", &["hello world"], None);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("echo: hello world"), "stdout: {stdout}");
    assert!(stdout.contains("---"));
    assert!(stdout.contains("SESSION_ID: fixture-session"));
}

#[test]
fn single_task_failure_writes_nothing_to_stdout() {
    let output = run("fake_backend_failure.sh", &["hello"], None);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stdout).is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("simulated backend failure"));
}

#[test]
fn silent_success_is_treated_as_failure() {
    let output = run("fake_backend_silent_success.sh", &["hello"], None);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).is_empty());
}

#[test]
fn backend_not_found_exits_127() {
    let mut cmd = Command::new(binary());
    cmd.args(["hello"]);
    cmd.env("CODEX_EXEC_BINARY", "codex-supervisor-test-definitely-missing-binary");
    let output = cmd.output().expect("run codex-supervisor");
    assert_eq!(output.status.code(), Some(127));
}

#[test]
fn stdin_delivery_round_trips_long_task_body() {
    let long_task = "x".repeat(900);
    let output = run("fake_backend_success.sh", &[&long_task], None);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("echo: {long_task}")));
}

#[test]
fn workdir_argument_passes_through_to_backend() {
    // Isolated temp root owning a `tempfile::TempDir`, rather than sharing
    // real cwd across tests.
    let tmp = tempfile::tempdir().expect("create tempdir");
    let workdir = tmp.path().to_str().expect("tempdir path is valid UTF-8");

    let output = run("fake_backend_echo_args.sh", &["hello", workdir], None);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(workdir), "stdout: {stdout}");
}

#[test]
fn dash_reads_task_from_supervisors_own_stdin() {
    let output = run("fake_backend_success.sh", &["-"], Some("piped task text"));
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("echo: piped task text"));
}

#[test]
fn timeout_escalation_kills_hung_backend() {
    let mut cmd = Command::new(binary());
    cmd.args(["hello"]);
    cmd.env("CODEX_EXEC_BINARY", fixture("fake_backend_hang.sh"));
    cmd.env("CODEX_TIMEOUT", "1");
    let output = cmd.output().expect("run codex-supervisor");
    assert_eq!(output.status.code(), Some(124));
}

#[test]
fn parallel_batch_reports_totals_and_runs_independent_tasks() {
    let batch = concat!(
        "id: a\n---CONTENT---\nfirst\n",
        "---TASK---\n",
        "id: b\n---CONTENT---\nsecond\n",
    );
    let mut cmd = Command::new(binary());
    cmd.arg("--parallel");
    cmd.env("CODEX_EXEC_BINARY", fixture("fake_backend_success.sh"));
    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    let mut child = cmd.spawn().expect("spawn codex-supervisor");
    {
        use std::io::Write;
        child
            .stdin
            .take()
            .expect("stdin piped")
            .write_all(batch.as_bytes())
            .expect("write batch");
    }
    let output = child.wait_with_output().expect("wait for codex-supervisor");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Total: 2 | Success: 2 | Failed: 0"));
    assert!(stdout.contains("[a] SUCCESS"));
    assert!(stdout.contains("[b] SUCCESS"));
}

#[test]
fn parallel_dependency_failure_cascades_to_skip() {
    let batch = concat!(
        "id: a\n---CONTENT---\nfirst\n",
        "---TASK---\n",
        "id: b\ndependencies: a\n---CONTENT---\nsecond\n",
    );
    let mut cmd = Command::new(binary());
    cmd.arg("--parallel");
    cmd.env("CODEX_EXEC_BINARY", fixture("fake_backend_failure.sh"));
    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    let mut child = cmd.spawn().expect("spawn codex-supervisor");
    {
        use std::io::Write;
        child
            .stdin
            .take()
            .expect("stdin piped")
            .write_all(batch.as_bytes())
            .expect("write batch");
    }
    let output = child.wait_with_output().expect("wait for codex-supervisor");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[a] FAILED"));
    assert!(stdout.contains("[b] FAILED"));
    assert!(stdout.contains("skipped due to failed dependencies: a"));
}

#[test]
fn parallel_rejects_additional_arguments() {
    let mut cmd = Command::new(binary());
    cmd.args(["--parallel", "extra"]);
    let output = cmd.output().expect("run codex-supervisor");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn help_and_version_flags() {
    let help = Command::new(binary()).arg("--help").output().expect("run");
    assert!(help.status.success());
    assert!(String::from_utf8_lossy(&help.stdout).contains("codex-supervisor"));

    let version = Command::new(binary()).arg("-v").output().expect("run");
    assert!(version.status.success());
    assert!(String::from_utf8_lossy(&version.stdout).contains("codex-supervisor"));
}
