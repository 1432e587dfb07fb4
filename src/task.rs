//! Core data model: [`TaskSpec`] and [`TaskResult`].
//!
//! A `TaskSpec` is an immutable description of one unit of backend work,
//! produced once by the batch parser (or synthesized for single-task mode)
//! and consumed exactly once by the executor.

use std::path::PathBuf;

/// Bytes above which a task's prompt is delivered via the child's stdin
/// instead of as a CLI argument (see the stdin heuristic in `supervisor`).
pub const STDIN_THRESHOLD_BYTES: usize = 800;

/// Characters whose presence in a task's prompt forces stdin delivery,
/// because they are unsafe or inconvenient as a single CLI argument.
const STDIN_FORCING_CHARS: &[char] = &['\n', '\\', '"', '\'', '`', '$'];

/// Immutable description of one unit of backend work.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    /// Non-empty, unique within a batch.
    pub id: String,
    /// The prompt text; arbitrary bytes, may contain newlines and shell
    /// metacharacters.
    pub task: String,
    /// Working directory for the child; `None` means the process cwd.
    pub workdir: Option<PathBuf>,
    /// Ids of other specs in the same batch that must complete
    /// successfully before this one may start.
    pub dependencies: Vec<String>,
    /// When present, the backend is invoked in resume mode.
    pub session_id: Option<String>,
    /// Derived flag: true when `task` must be streamed on the child's
    /// stdin rather than passed as an argument.
    pub use_stdin: bool,
}

impl TaskSpec {
    /// Build a spec for single-task mode, applying the stdin heuristic.
    ///
    /// `forced_stdin` is true when the caller explicitly requested stdin
    /// delivery (`-`) or the task text originated from the parent's own
    /// piped stdin.
    pub fn single(
        task: String,
        workdir: Option<PathBuf>,
        session_id: Option<String>,
        forced_stdin: bool,
    ) -> Self {
        let use_stdin = forced_stdin || wants_stdin(&task);
        TaskSpec {
            id: "task".to_string(),
            task,
            workdir,
            dependencies: Vec::new(),
            session_id,
            use_stdin,
        }
    }

    /// Build a spec parsed out of a batch block.
    pub fn batch(
        id: String,
        task: String,
        workdir: Option<PathBuf>,
        dependencies: Vec<String>,
        session_id: Option<String>,
    ) -> Self {
        let use_stdin = wants_stdin(&task);
        TaskSpec {
            id,
            task,
            workdir,
            dependencies,
            session_id,
            use_stdin,
        }
    }
}

/// True when `task` must go through stdin under the size/character
/// heuristic (not counting caller-forced or piped-stdin cases).
fn wants_stdin(task: &str) -> bool {
    task.len() > STDIN_THRESHOLD_BYTES || task.contains(STDIN_FORCING_CHARS)
}

/// Outcome of one spec.
#[derive(Debug, Clone, Default)]
pub struct TaskResult {
    pub task_id: String,
    pub exit_code: i32,
    pub message: String,
    pub session_id: String,
    pub error: String,
}

impl TaskResult {
    /// A task is successful iff `exit_code == 0 && error.is_empty()`.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && self.error.is_empty()
    }

    pub fn skipped(task_id: impl Into<String>, blocking_ids: &[String]) -> Self {
        TaskResult {
            task_id: task_id.into(),
            exit_code: 1,
            message: String::new(),
            session_id: String::new(),
            error: format!(
                "skipped due to failed dependencies: {}",
                blocking_ids.join(", ")
            ),
        }
    }

    pub fn panicked(task_id: impl Into<String>, payload: &str) -> Self {
        TaskResult {
            task_id: task_id.into(),
            exit_code: 1,
            message: String::new(),
            session_id: String::new(),
            error: format!("panic: {payload}"),
        }
    }
}
