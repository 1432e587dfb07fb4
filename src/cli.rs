//! CLI argument layer: the non-standard positional grammar for invoking
//! the supervisor (`<task> [workdir]`, `resume <session_id> <task>
//! [workdir]`, `-` for stdin, `--parallel`).
//!
//! Uses `clap::Parser` with `trailing_var_arg` the way
//! `tumf-agent-exec::main::Cli`'s `Run`/`_supervise` variants capture a
//! free-form trailing command vector, but built-in `--help`/`--version`
//! are disabled and reimplemented by hand: this grammar's `-v` means
//! "print version", not "increase verbosity".

use std::io::Read;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::task::TaskSpec;

#[derive(Debug, Parser)]
#[command(
    name = "codex-supervisor",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct RawCli {
    #[arg(long, short = 'h', action = ArgAction::SetTrue)]
    help: bool,

    #[arg(long, short = 'v', action = ArgAction::SetTrue)]
    version: bool,

    #[arg(long, action = ArgAction::SetTrue)]
    parallel: bool,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    positional: Vec<String>,
}

/// What the user asked the supervisor to do, resolved from argv (and, when
/// the task text is `-`, from the supervisor's own stdin).
#[derive(Debug)]
pub enum Invocation {
    Help,
    Version,
    Parallel,
    Single(TaskSpec),
}

pub const USAGE: &str = "\
codex-supervisor <task> [workdir]
codex-supervisor - [workdir]
codex-supervisor resume <session_id> <task> [workdir]
codex-supervisor resume <session_id> - [workdir]
codex-supervisor --parallel
codex-supervisor --version | -v
codex-supervisor --help    | -h";

/// Parse argv (including the program name at index 0) into an
/// [`Invocation`]. `stdin` is injected rather than read from the real
/// process stdin directly, so tests can supply an alternative reader
/// instead of mutating global state.
pub fn parse<I, T>(args: I, stdin: &mut dyn Read) -> anyhow::Result<Invocation>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let raw = RawCli::try_parse_from(args)?;

    if raw.help {
        return Ok(Invocation::Help);
    }
    if raw.version {
        return Ok(Invocation::Version);
    }
    if raw.parallel {
        if !raw.positional.is_empty() {
            anyhow::bail!("--parallel accepts no additional arguments");
        }
        return Ok(Invocation::Parallel);
    }

    let pos = raw.positional;
    if pos.is_empty() {
        anyhow::bail!("missing task argument\n\n{USAGE}");
    }

    if pos[0] == "resume" {
        if pos.len() < 3 {
            anyhow::bail!("resume requires <session_id> <task>\n\n{USAGE}");
        }
        if pos.len() > 4 {
            anyhow::bail!("too many arguments\n\n{USAGE}");
        }
        let session_id = pos[1].clone();
        let (task, forced_stdin) = resolve_task(&pos[2], stdin)?;
        let workdir = pos.get(3).map(PathBuf::from);
        Ok(Invocation::Single(TaskSpec::single(
            task,
            workdir,
            Some(session_id),
            forced_stdin,
        )))
    } else {
        if pos.len() > 2 {
            anyhow::bail!("too many arguments\n\n{USAGE}");
        }
        let (task, forced_stdin) = resolve_task(&pos[0], stdin)?;
        let workdir = pos.get(1).map(PathBuf::from);
        Ok(Invocation::Single(TaskSpec::single(task, workdir, None, forced_stdin)))
    }
}

/// Resolve the literal task text, reading from `stdin` when the caller
/// passed the `-` sentinel. The second element is true when the task
/// originated from the supervisor's own piped stdin, which forces stdin
/// delivery to the backend regardless of length/content.
fn resolve_task(arg: &str, stdin: &mut dyn Read) -> anyhow::Result<(String, bool)> {
    if arg == "-" {
        let mut buf = String::new();
        stdin
            .read_to_string(&mut buf)
            .map_err(|e| anyhow::anyhow!("failed to read task from stdin: {e}"))?;
        Ok((buf, true))
    } else {
        Ok((arg.to_string(), false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse_args(args: &[&str]) -> anyhow::Result<Invocation> {
        let mut stdin = Cursor::new(Vec::new());
        let argv: Vec<String> = std::iter::once("codex-supervisor".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        parse(argv, &mut stdin)
    }

    #[test]
    fn parses_single_task_without_workdir() {
        let inv = parse_args(&["do the thing"]).expect("parse");
        match inv {
            Invocation::Single(spec) => {
                assert_eq!(spec.task, "do the thing");
                assert!(spec.workdir.is_none());
                assert!(spec.session_id.is_none());
            }
            other => panic!("unexpected invocation: {other:?}"),
        }
    }

    #[test]
    fn parses_single_task_with_workdir() {
        let inv = parse_args(&["do the thing", "/tmp/work"]).expect("parse");
        match inv {
            Invocation::Single(spec) => {
                assert_eq!(spec.workdir, Some(PathBuf::from("/tmp/work")));
            }
            other => panic!("unexpected invocation: {other:?}"),
        }
    }

    #[test]
    fn parses_resume_with_workdir() {
        let inv = parse_args(&["resume", "sess-1", "do it", "/tmp/w"]).expect("parse");
        match inv {
            Invocation::Single(spec) => {
                assert_eq!(spec.session_id, Some("sess-1".to_string()));
                assert_eq!(spec.task, "do it");
                assert_eq!(spec.workdir, Some(PathBuf::from("/tmp/w")));
            }
            other => panic!("unexpected invocation: {other:?}"),
        }
    }

    #[test]
    fn dash_reads_task_from_stdin_and_forces_stdin_delivery() {
        let mut stdin = Cursor::new(b"task from stdin".to_vec());
        let argv = vec!["codex-supervisor".to_string(), "-".to_string()];
        let inv = parse(argv, &mut stdin).expect("parse");
        match inv {
            Invocation::Single(spec) => {
                assert_eq!(spec.task, "task from stdin");
                assert!(spec.use_stdin);
            }
            other => panic!("unexpected invocation: {other:?}"),
        }
    }

    #[test]
    fn parallel_rejects_additional_arguments() {
        assert!(parse_args(&["--parallel", "extra"]).is_err());
    }

    #[test]
    fn parallel_with_no_args_is_accepted() {
        let inv = parse_args(&["--parallel"]).expect("parse");
        assert!(matches!(inv, Invocation::Parallel));
    }

    #[test]
    fn help_and_version_flags_short_and_long() {
        assert!(matches!(parse_args(&["--help"]).unwrap(), Invocation::Help));
        assert!(matches!(parse_args(&["-h"]).unwrap(), Invocation::Help));
        assert!(matches!(parse_args(&["--version"]).unwrap(), Invocation::Version));
        assert!(matches!(parse_args(&["-v"]).unwrap(), Invocation::Version));
    }

    #[test]
    fn missing_task_is_an_error() {
        assert!(parse_args(&[]).is_err());
    }

    #[test]
    fn too_many_positional_arguments_is_an_error() {
        assert!(parse_args(&["task", "workdir", "extra"]).is_err());
        assert!(parse_args(&["resume", "s", "task", "workdir", "extra"]).is_err());
    }
}
