//! Result Reporter (component G): renders a deterministic plain-text
//! report over a batch's [`TaskResult`]s.
//!
//! Unlike `tumf-agent-exec`'s `schema::Response<T>` JSON envelope (whose
//! stdout-is-JSON-only contract doesn't apply here, since this crate's
//! external interface is plain text), this is a small formatter function.

use crate::task::TaskResult;

/// Render the report and compute the batch exit code (the last observed
/// non-zero task exit code, or zero).
pub fn report(results: &[TaskResult]) -> (String, i32) {
    let total = results.len();
    let success = results.iter().filter(|r| r.is_success()).count();
    let failed = total - success;

    let mut out = String::new();
    out.push_str(&format!("Total: {total} | Success: {success} | Failed: {failed}\n"));

    let mut exit_code = 0;
    for result in results {
        out.push('\n');
        out.push_str(&format!("[{}] ", result.task_id));
        if result.is_success() {
            out.push_str("SUCCESS\n");
        } else {
            out.push_str(&format!("FAILED (exit code {})\n", result.exit_code));
            if result.exit_code != 0 {
                exit_code = result.exit_code;
            }
        }
        if !result.session_id.is_empty() {
            out.push_str(&format!("session_id: {}\n", result.session_id));
        }
        if !result.error.is_empty() {
            out.push_str(&format!("error: {}\n", result.error));
        }
        if !result.message.is_empty() {
            out.push_str(&result.message);
            out.push('\n');
        }
    }

    (out, exit_code)
}
