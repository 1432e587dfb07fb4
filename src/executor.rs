//! Concurrent Executor (component F): runs a layered task plan, one
//! `std::thread` per task within a layer, advancing to the next layer only
//! once every task in the current one has finished.
//!
//! `std::panic::catch_unwind` around each worker closure turns a worker
//! fault into a result instead of aborting the whole batch.
//! Layer barriers are plain `JoinHandle::join` loops, the per-layer
//! analogue of the thread-joining `tumf-agent-exec::run::supervise` does
//! at the end of one invocation.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;

use crate::logger::Logger;
use crate::scheduler::Layer;
use crate::supervisor::{self, Cancel};
use crate::task::TaskResult;

/// Run every layer in order, returning one [`TaskResult`] per input task.
/// Dependency failures cascade as synthesized skip results without
/// launching a child process.
pub fn execute(layers: Vec<Layer>, logger: &Logger, cancel: &Cancel) -> Vec<TaskResult> {
    let mut results = Vec::new();
    let mut failed_ids: HashSet<String> = HashSet::new();

    for layer in layers {
        let mut to_run = Vec::new();

        for spec in layer {
            let blockers: Vec<String> = spec
                .dependencies
                .iter()
                .filter(|dep| failed_ids.contains(*dep))
                .cloned()
                .collect();
            if !blockers.is_empty() {
                logger.warn(format!(
                    "skipping task {:?}: blocked by failed dependencies {:?}",
                    spec.id, blockers
                ));
                failed_ids.insert(spec.id.clone());
                results.push(TaskResult::skipped(spec.id.clone(), &blockers));
            } else {
                to_run.push(spec);
            }
        }

        let layer_results = std::thread::scope(|scope| {
            let handles: Vec<_> = to_run
                .into_iter()
                .map(|spec| {
                    scope.spawn(move || {
                        let task_id = spec.id.clone();
                        match std::panic::catch_unwind(AssertUnwindSafe(|| {
                            supervisor::run(&spec, logger, true, cancel)
                        })) {
                            Ok(result) => result,
                            Err(payload) => TaskResult::panicked(task_id, &panic_message(&payload)),
                        }
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|_| TaskResult::panicked("unknown", "worker thread join failed")))
                .collect::<Vec<_>>()
        });

        for result in layer_results {
            if !result.is_success() {
                failed_ids.insert(result.task_id.clone());
            }
            results.push(result);
        }
    }

    results
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
