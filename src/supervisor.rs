//! Process Supervisor (component E): runs one backend invocation end to
//! end and returns a [`TaskResult`].
//!
//! Grounded directly on `tumf-agent-exec::run::supervise`:
//! `std::process::Command` with piped stdout/stderr, one reader thread per
//! stream, a watcher thread that escalates `SIGTERM` → `SIGKILL` via
//! `libc::kill` on a deadline, and the Windows Job-Object fallback in
//! `tumf-agent-exec::run::assign_to_job_object` /
//! `tumf-agent-exec::kill::send_signal`. Adapted so that the supervisor's
//! own received SIGINT/SIGTERM (not just a deadline) drives the same
//! escalation path, via a shared cancellation flag rather than global
//! signal state.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::{self, KILL_GRACE, STDERR_TAIL_BYTES, STDOUT_TEE_LINE_BYTES};
use crate::error::{BackendNotFound, Interrupted, TimedOut};
use crate::event_parser;
use crate::logger::Logger;
use crate::task::{TaskResult, TaskSpec};

/// Cooperative cancellation signal shared with the top-level signal
/// handler. Checked at suspension points rather than read as global signal
/// state.
pub type Cancel = std::sync::Arc<AtomicBool>;

/// Execute `spec` against the backend and return its outcome.
///
/// `silent` suppresses forwarding of the child's stderr to the
/// supervisor's own stderr (used by the concurrent executor, where N
/// workers sharing one terminal would interleave illegibly).
pub fn run(spec: &TaskSpec, logger: &Logger, silent: bool, cancel: &Cancel) -> TaskResult {
    let timeout = config::resolve_timeout();
    let binary = config::backend_binary();
    let args = build_args(spec);

    let mut command = Command::new(&binary);
    command.args(&args);
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    command.stdin(if spec.use_stdin { Stdio::piped() } else { Stdio::null() });

    logger.info(format!("spawning {binary} {}", args.join(" ")));

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            logger.error(format!("backend binary not found: {binary}"));
            let err = BackendNotFound { binary };
            return failure_result(spec, err.exit_code(), err.to_string(), "");
        }
        Err(e) => {
            logger.error(format!("failed to spawn backend: {e}"));
            return failure_result(spec, 1, format!("failed to start backend: {e}"), "");
        }
    };

    let pid = child.id();
    logger.info(format!("backend started, pid={pid}"));

    let stdout = child.stdout.take().expect("stdout piped");
    let stderr = child.stderr.take().expect("stderr piped");
    let stdin = child.stdin.take();

    let child_done = AtomicBool::new(false);
    let timed_out = AtomicBool::new(false);
    let interrupted = AtomicBool::new(false);

    let (parsed, stderr_tail) = std::thread::scope(|scope| {
        if let (Some(mut stdin), true) = (stdin, spec.use_stdin) {
            let task_bytes = spec.task.clone().into_bytes();
            scope.spawn(move || {
                // Short-circuit on write errors; a dead child just means
                // the pipe closes from the other end.
                let _ = stdin.write_all(&task_bytes);
            });
        }

        let stdout_handle = scope.spawn(|| {
            let tee = TeeReader::new(stdout, logger, "CODEX_STDOUT: ");
            event_parser::parse(tee, logger)
        });

        let stderr_handle = scope.spawn(|| drain_stderr(stderr, logger, silent));

        scope.spawn(|| {
            watch(pid, timeout, cancel, &child_done, &timed_out, &interrupted);
        });

        let wait_result = child.wait();
        child_done.store(true, Ordering::Release);

        let parsed = stdout_handle.join().unwrap_or_default();
        let stderr_tail = stderr_handle.join().unwrap_or_default();

        (parsed, (wait_result, stderr_tail))
    });

    let (wait_result, stderr_tail) = stderr_tail;

    if interrupted.load(Ordering::Acquire) {
        logger.warn("backend invocation interrupted by signal");
        return failure_result(spec, Interrupted.exit_code(), Interrupted.to_string(), &stderr_tail);
    }
    if timed_out.load(Ordering::Acquire) {
        logger.warn("backend invocation exceeded deadline");
        return failure_result(spec, TimedOut.exit_code(), TimedOut.to_string(), &stderr_tail);
    }

    let status = match wait_result {
        Ok(status) => status,
        Err(e) => {
            return failure_result(spec, 1, format!("failed to wait for backend: {e}"), &stderr_tail);
        }
    };

    let session_id = if !parsed.thread_id.is_empty() {
        parsed.thread_id
    } else {
        spec.session_id.clone().unwrap_or_default()
    };

    match status.code() {
        Some(0) => {
            if parsed.message.is_empty() {
                failure_result(
                    spec,
                    1,
                    "codex completed without agent_message output".to_string(),
                    &stderr_tail,
                )
            } else {
                TaskResult {
                    task_id: spec.id.clone(),
                    exit_code: 0,
                    message: parsed.message,
                    session_id,
                    error: String::new(),
                }
            }
        }
        Some(code) => failure_result(spec, code, format!("codex exited with status {code}"), &stderr_tail),
        None => failure_result(spec, 1, "codex terminated by signal".to_string(), &stderr_tail),
    }
}

fn failure_result(spec: &TaskSpec, exit_code: i32, message: String, stderr_tail: &str) -> TaskResult {
    TaskResult {
        task_id: spec.id.clone(),
        exit_code,
        message: String::new(),
        session_id: spec.session_id.clone().unwrap_or_default(),
        error: with_stderr_tail(&message, stderr_tail),
    }
}

fn with_stderr_tail(message: &str, tail: &str) -> String {
    if tail.is_empty() {
        message.to_string()
    } else {
        format!("{message}\nstderr tail:\n{tail}")
    }
}

/// Build the backend's argument vector for `spec` (new-session or resume
/// form, stdin target marker `-` when the task body is delivered on stdin).
fn build_args(spec: &TaskSpec) -> Vec<String> {
    let target = if spec.use_stdin {
        "-".to_string()
    } else {
        spec.task.clone()
    };

    match &spec.session_id {
        Some(session_id) => vec![
            "e".to_string(),
            "--skip-git-repo-check".to_string(),
            "--json".to_string(),
            "resume".to_string(),
            session_id.clone(),
            target,
        ],
        None => {
            let workdir = spec
                .workdir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ".".to_string());
            vec![
                "e".to_string(),
                "--skip-git-repo-check".to_string(),
                "-C".to_string(),
                workdir,
                "--json".to_string(),
                target,
            ]
        }
    }
}

/// Poll for a deadline or an external cancellation request, escalating
/// `SIGTERM` then `SIGKILL` on either. Mirrors the watcher thread in
/// `tumf-agent-exec::run::supervise`, generalized to also watch `cancel`.
fn watch(
    pid: u32,
    timeout: Duration,
    cancel: &Cancel,
    child_done: &AtomicBool,
    timed_out: &AtomicBool,
    interrupted: &AtomicBool,
) {
    let start = Instant::now();
    let poll_interval = Duration::from_millis(100);

    loop {
        std::thread::sleep(poll_interval);
        if child_done.load(Ordering::Acquire) {
            return;
        }

        if cancel.load(Ordering::Acquire) {
            interrupted.store(true, Ordering::Release);
            terminate_with_grace(pid, child_done);
            return;
        }
        if start.elapsed() >= timeout {
            timed_out.store(true, Ordering::Release);
            terminate_with_grace(pid, child_done);
            return;
        }
    }
}

fn terminate_with_grace(pid: u32, child_done: &AtomicBool) {
    send_signal(pid, Signal::Term);

    let deadline = Instant::now() + KILL_GRACE;
    while Instant::now() < deadline {
        if child_done.load(Ordering::Acquire) {
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    if !child_done.load(Ordering::Acquire) {
        send_signal(pid, Signal::Kill);
    }
}

enum Signal {
    Term,
    Kill,
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: Signal) {
    let signum = match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // SAFETY: kill(2) accepts any pid/signal pair; ESRCH (already exited)
    // is not an error for our purposes.
    unsafe {
        libc::kill(pid as libc::pid_t, signum);
    }
}

#[cfg(windows)]
fn send_signal(pid: u32, signal: Signal) {
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

    // Windows has no SIGTERM; both stages terminate the process directly.
    // Process-tree cleanup for any grandchildren is handled by the Job
    // Object the child was assigned to, as in
    // `tumf-agent-exec::run::assign_to_job_object`.
    let _ = signal;
    unsafe {
        if let Ok(handle) = OpenProcess(PROCESS_TERMINATE, false, pid) {
            let _ = TerminateProcess(handle, 1);
            let _ = CloseHandle(handle);
        }
    }
}

/// Read the child's stderr to EOF, retaining only the last
/// [`STDERR_TAIL_BYTES`] for error reports, teeing each line to the logger
/// (prefixed `CODEX_STDERR: `, truncated to [`STDOUT_TEE_LINE_BYTES`]), and
/// forwarding raw bytes to the supervisor's own stderr unless `silent`.
fn drain_stderr<R: Read>(mut stream: R, logger: &Logger, silent: bool) -> String {
    let mut tail: Vec<u8> = Vec::new();
    let mut line_buf: Vec<u8> = Vec::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        let chunk = &buf[..n];

        if !silent {
            let _ = std::io::stderr().write_all(chunk);
        }

        tail.extend_from_slice(chunk);
        if tail.len() > STDERR_TAIL_BYTES {
            let excess = tail.len() - STDERR_TAIL_BYTES;
            tail.drain(..excess);
        }

        for &b in chunk {
            if b == b'\n' {
                tee_line(logger, "CODEX_STDERR: ", &line_buf);
                line_buf.clear();
            } else {
                line_buf.push(b);
            }
        }
    }
    if !line_buf.is_empty() {
        tee_line(logger, "CODEX_STDERR: ", &line_buf);
    }

    String::from_utf8_lossy(&tail).into_owned()
}

fn tee_line(logger: &Logger, prefix: &str, line: &[u8]) {
    let truncated = &line[..line.len().min(STDOUT_TEE_LINE_BYTES)];
    let text = String::from_utf8_lossy(truncated);
    logger.info(format!("{prefix}{text}"));
}

/// Wraps a `Read` stream, teeing every line (prefixed, truncated) to the
/// logger as bytes pass through, while leaving the underlying bytes
/// untouched for the caller (`event_parser::parse`).
struct TeeReader<'a, R> {
    inner: R,
    logger: &'a Logger,
    prefix: &'static str,
    line_buf: Vec<u8>,
}

impl<'a, R> TeeReader<'a, R> {
    fn new(inner: R, logger: &'a Logger, prefix: &'static str) -> Self {
        TeeReader {
            inner,
            logger,
            prefix,
            line_buf: Vec::new(),
        }
    }
}

impl<'a, R: Read> Read for TeeReader<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !self.line_buf.is_empty() {
            tee_line(self.logger, self.prefix, &self.line_buf);
            self.line_buf.clear();
            return Ok(0);
        }
        for &b in &buf[..n] {
            if b == b'\n' {
                tee_line(self.logger, self.prefix, &self.line_buf);
                self.line_buf.clear();
            } else {
                self.line_buf.push(b);
            }
        }
        Ok(n)
    }
}
