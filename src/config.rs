//! Process-wide configuration: environment variable resolution and the
//! constants referenced across components.
//!
//! Centralizing this mirrors `tumf-agent-exec::jobstore::resolve_root`,
//! which resolves its own environment/XDG chain in one place rather than
//! scattering `std::env::var` calls through the codebase.

use std::time::Duration;

use tracing::warn;

/// Default per-task deadline when `CODEX_TIMEOUT` is unset or invalid.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(7200);

/// Threshold at which `CODEX_TIMEOUT` switches from seconds to milliseconds.
const TIMEOUT_SECONDS_CEILING: u64 = 10_000;

/// Grace period between `SIGTERM` and the `SIGKILL` fallback.
pub const KILL_GRACE: Duration = Duration::from_secs(5);

/// Bounded capacity of the async logger's queue.
pub const LOG_QUEUE_CAPACITY: usize = 1000;

/// Periodic flush interval for the async logger's writer thread.
pub const LOG_FLUSH_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound on how long `Logger::flush`/`close` will wait.
pub const LOG_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum accepted length of one NDJSON line from the backend.
pub const MAX_EVENT_LINE_BYTES: usize = 10 * 1024 * 1024;

/// Size of the retained stderr tail buffer.
pub const STDERR_TAIL_BYTES: usize = 4 * 1024;

/// Max bytes of one stdout line teed into the log file.
pub const STDOUT_TEE_LINE_BYTES: usize = 1000;

/// Name of the backend binary invoked by the supervisor.
pub fn backend_binary() -> String {
    std::env::var("CODEX_EXEC_BINARY").unwrap_or_else(|_| "codex".to_string())
}

/// Resolve the per-task timeout from `CODEX_TIMEOUT`.
///
/// Values `<= 10000` are seconds; larger values are milliseconds. Missing
/// or unparsable values fall back to [`DEFAULT_TIMEOUT`] with a warning.
pub fn resolve_timeout() -> Duration {
    match std::env::var("CODEX_TIMEOUT") {
        Err(_) => DEFAULT_TIMEOUT,
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(0) => {
                warn!(value = %raw, "CODEX_TIMEOUT is zero; falling back to default");
                DEFAULT_TIMEOUT
            }
            Ok(n) if n <= TIMEOUT_SECONDS_CEILING => Duration::from_secs(n),
            Ok(n) => Duration::from_millis(n),
            Err(_) => {
                warn!(value = %raw, "CODEX_TIMEOUT is not a positive integer; falling back to default");
                DEFAULT_TIMEOUT
            }
        },
    }
}
