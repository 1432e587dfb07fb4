//! Marker error types used to label task-level failures with both a
//! message and the process exit code that failure mode maps to.
//!
//! Unlike `tumf-agent-exec::jobstore::JobNotFound`, which is wrapped by
//! `anyhow` and recovered via `downcast_ref` at the top of the call stack,
//! these never leave `supervisor::run` as a propagated `anyhow::Error`:
//! every task outcome (single-task or one of a batch) is reported through
//! a `TaskResult { exit_code, message, error, .. }`, not a `Result`, so
//! there is nothing upstream to downcast. Each marker type instead exposes
//! its exit code directly via `exit_code()`, read at its construction site
//! in `supervisor.rs`.

use std::fmt;

/// The backend binary could not be found on `PATH`.
#[derive(Debug)]
pub struct BackendNotFound {
    pub binary: String,
}

impl BackendNotFound {
    pub fn exit_code(&self) -> i32 {
        127
    }
}

impl fmt::Display for BackendNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "backend binary not found: {}", self.binary)
    }
}

impl std::error::Error for BackendNotFound {}

/// The backend exceeded its deadline.
#[derive(Debug)]
pub struct TimedOut;

impl TimedOut {
    pub fn exit_code(&self) -> i32 {
        124
    }
}

impl fmt::Display for TimedOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "codex execution timeout")
    }
}

impl std::error::Error for TimedOut {}

/// The supervisor was interrupted by an external signal.
#[derive(Debug)]
pub struct Interrupted;

impl Interrupted {
    pub fn exit_code(&self) -> i32 {
        130
    }
}

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "execution cancelled")
    }
}

impl std::error::Error for Interrupted {}

/// Map a top-level `anyhow::Error` to a process exit code. Used only at
/// `main.rs`'s CLI-parse/batch-parse/schedule call sites: generic
/// configuration errors that never carry one of the typed markers above,
/// so this always resolves to 1. It exists as one named seam for future
/// error kinds rather than three inlined literals at those call sites.
pub fn exit_code_for(_err: &anyhow::Error) -> i32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_types_carry_their_own_exit_code() {
        assert_eq!(BackendNotFound { binary: "codex".into() }.exit_code(), 127);
        assert_eq!(TimedOut.exit_code(), 124);
        assert_eq!(Interrupted.exit_code(), 130);
    }

    #[test]
    fn unknown_error_maps_to_one() {
        let e = anyhow::anyhow!("something else");
        assert_eq!(exit_code_for(&e), 1);
    }
}
