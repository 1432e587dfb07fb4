//! Parallel Config Parser (component C): turns the raw bytes of a batch
//! request into an ordered list of [`TaskSpec`]s.
//!
//! A small hand-written line-oriented parser, the same "straight-line
//! parsing, no grammar crate" register as `tumf-agent-exec::skills`'s own
//! hand-parsed legacy lockfile shape.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::task::TaskSpec;

const TASK_SEPARATOR: &str = "---TASK---";
const CONTENT_SEPARATOR: &str = "---CONTENT---";

/// Parse the `---TASK---`/`---CONTENT---` batch grammar into task specs,
/// in the order their blocks appear.
pub fn parse(input: &str) -> anyhow::Result<Vec<TaskSpec>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        anyhow::bail!("batch input is empty");
    }

    let blocks: Vec<&str> = trimmed
        .split(TASK_SEPARATOR)
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .collect();
    if blocks.is_empty() {
        anyhow::bail!("batch input is empty");
    }

    let mut specs = Vec::with_capacity(blocks.len());
    let mut seen_ids = HashSet::with_capacity(blocks.len());

    for block in blocks {
        let spec = parse_block(block)?;
        if !seen_ids.insert(spec.id.clone()) {
            anyhow::bail!("duplicate task id: {}", spec.id);
        }
        specs.push(spec);
    }

    Ok(specs)
}

fn parse_block(block: &str) -> anyhow::Result<TaskSpec> {
    let (meta_section, content_section) = block
        .split_once(CONTENT_SEPARATOR)
        .ok_or_else(|| anyhow::anyhow!("task block missing {CONTENT_SEPARATOR}"))?;

    let content = content_section.trim();
    if content.is_empty() {
        anyhow::bail!("task block has empty content");
    }

    let mut id = None;
    let mut workdir = None;
    let mut dependencies = Vec::new();
    let mut session_id = None;

    for raw_line in meta_section.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("malformed metadata line: {line:?}"))?;
        let key = key.trim();
        let value = value.trim();
        match key {
            "id" => id = Some(value.to_string()),
            "workdir" => workdir = Some(PathBuf::from(value)),
            "dependencies" => {
                dependencies = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "session_id" => session_id = Some(value.to_string()),
            _ => {}
        }
    }

    let id = id.ok_or_else(|| anyhow::anyhow!("task block missing required key: id"))?;
    if id.is_empty() {
        anyhow::bail!("task block has empty id");
    }

    Ok(TaskSpec::batch(id, content.to_string(), workdir, dependencies, session_id))
}
