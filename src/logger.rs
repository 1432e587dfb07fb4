//! Async Logger (component A): a bounded, non-blocking, single-writer log
//! sink to a per-process file under the OS temp directory.
//!
//! Grounded on the thread-per-stream shape of `tumf-agent-exec::run::supervise`
//! (a dedicated thread owns the file handle; producers only ever hand it
//! bytes through a channel) and on the bounded-`try_send`-drop-on-full
//! discipline of `init_file_logger` in
//! `examples/other_examples/654cbb15_hahatianx-lumo__src-utilities-logger.rs.rs`,
//! translated from `tokio::mpsc`/an async task to `std::sync::mpsc`/a plain
//! `std::thread` to match this crate's synchronous process-supervision style.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::{LOG_CLOSE_TIMEOUT, LOG_FLUSH_INTERVAL, LOG_QUEUE_CAPACITY};

/// Severity of one log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Debug,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Debug => "DEBUG",
            Level::Error => "ERROR",
        };
        f.write_str(s)
    }
}

struct LogEntry {
    level: Level,
    message: String,
    timestamp: SystemTime,
    pid: u32,
}

enum Msg {
    Entry(LogEntry),
    Flush(mpsc::Sender<()>),
    Close,
}

/// Handle to the running logger. Cheap to clone-by-reference (it is not
/// `Clone` itself, but is typically shared behind an `Arc`).
pub struct Logger {
    tx: SyncSender<Msg>,
    path: PathBuf,
    closed: Arc<AtomicBool>,
    handle: std::sync::Mutex<Option<JoinHandle<()>>>,
    done_rx: std::sync::Mutex<mpsc::Receiver<()>>,
}

impl Logger {
    /// Open a new log file under the OS temp directory, named
    /// `codex-wrapper-<pid>[-suffix].log`, and spawn its writer thread.
    pub fn open(suffix: Option<&str>) -> anyhow::Result<Logger> {
        let pid = std::process::id();
        let filename = match suffix {
            Some(s) if !s.is_empty() => format!("codex-wrapper-{pid}-{s}.log"),
            _ => format!("codex-wrapper-{pid}.log"),
        };
        let path = std::env::temp_dir().join(filename);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| anyhow::anyhow!("open log file {}: {e}", path.display()))?;

        let (tx, rx) = mpsc::sync_channel::<Msg>(LOG_QUEUE_CAPACITY);
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let handle = std::thread::spawn(move || writer_loop(file, rx, done_tx));

        Ok(Logger {
            tx,
            path,
            closed: Arc::new(AtomicBool::new(false)),
            handle: std::sync::Mutex::new(Some(handle)),
            done_rx: std::sync::Mutex::new(done_rx),
        })
    }

    /// Enqueue a log entry. Never blocks: if the queue is full or the
    /// logger is closing, the entry is silently dropped.
    pub fn log(&self, level: Level, message: impl Into<String>) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let entry = LogEntry {
            level,
            message: message.into(),
            timestamp: SystemTime::now(),
            pid: std::process::id(),
        };
        let _ = self.tx.try_send(Msg::Entry(entry));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, message);
    }
    pub fn warn(&self, message: impl Into<String>) {
        self.log(Level::Warn, message);
    }
    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::Debug, message);
    }
    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::Error, message);
    }

    /// Request an explicit sync and wait for it, capped at
    /// [`LOG_CLOSE_TIMEOUT`].
    pub fn flush(&self) -> anyhow::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.tx.send(Msg::Flush(ack_tx)).is_err() {
            return Ok(());
        }
        match ack_rx.recv_timeout(LOG_CLOSE_TIMEOUT) {
            Ok(()) => Ok(()),
            Err(_) => anyhow::bail!("logger flush timed out"),
        }
    }

    /// Idempotent: closes the queue, waits up to [`LOG_CLOSE_TIMEOUT`] for
    /// the writer to drain, then flushes, syncs, and closes the file. If
    /// the writer does not exit in time, `close` proceeds and reports a
    /// timeout error.
    pub fn close(&self) -> anyhow::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        // Best-effort: the writer may already be gone if it hit an
        // unrecoverable I/O error.
        let _ = self.tx.send(Msg::Close);

        let done_rx = self.done_rx.lock().expect("done_rx mutex poisoned");
        let drained = done_rx.recv_timeout(LOG_CLOSE_TIMEOUT).is_ok();

        if let Some(handle) = self.handle.lock().expect("handle mutex poisoned").take() {
            // The writer thread has either signaled completion or we are
            // past the deadline; either way, don't block the caller further
            // by joining without timeout semantics. A finished thread joins
            // instantly; an overrun one is left to exit on its own.
            if drained {
                let _ = handle.join();
            }
        }

        if !drained {
            anyhow::bail!("logger close timed out waiting for writer thread");
        }
        Ok(())
    }

    /// Absolute path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the log file. Preservation across exits is the default;
    /// this is an explicit opt-in for callers that want cleanup.
    pub fn remove(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn writer_loop(file: File, rx: mpsc::Receiver<Msg>, done_tx: mpsc::Sender<()>) {
    let mut writer = BufWriter::new(file);
    loop {
        match rx.recv_timeout(LOG_FLUSH_INTERVAL) {
            Ok(Msg::Entry(entry)) => {
                let line = format_line(&entry);
                // Write failures are absorbed: logging must never crash
                // the supervisor.
                let _ = writer.write_all(line.as_bytes());
            }
            Ok(Msg::Flush(ack)) => {
                let _ = writer.flush();
                let _ = writer.get_ref().sync_all();
                let _ = ack.send(());
            }
            Ok(Msg::Close) => break,
            Err(RecvTimeoutError::Timeout) => {
                let _ = writer.flush();
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    let _ = writer.flush();
    let _ = writer.get_ref().sync_all();
    let _ = done_tx.send(());
}

fn format_line(entry: &LogEntry) -> String {
    format!(
        "[{}] [PID:{}] {}: {}\n",
        format_timestamp(entry.timestamp),
        entry.pid,
        entry.level,
        entry.message
    )
}

/// Format as `YYYY-MM-DD HH:MM:SS.mmm` (UTC), with no external time crate.
fn format_timestamp(t: SystemTime) -> String {
    let d = t.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
    let millis = d.subsec_millis();
    let mut secs = d.as_secs();

    let second = secs % 60;
    secs /= 60;
    let minute = secs % 60;
    secs /= 60;
    let hour = secs % 24;
    let mut days = secs / 24;

    let mut year = 1970u64;
    loop {
        let days_in_year = if is_leap(year) { 366 } else { 365 };
        if days < days_in_year {
            break;
        }
        days -= days_in_year;
        year += 1;
    }
    let leap = is_leap(year);
    let month_days: [u64; 12] = [31, if leap { 29 } else { 28 }, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let mut month = 0usize;
    for (i, &dim) in month_days.iter().enumerate() {
        if days < dim {
            month = i;
            break;
        }
        days -= dim;
    }
    let day = days + 1;

    format!(
        "{year:04}-{:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{millis:03}",
        month + 1
    )
}

fn is_leap(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
