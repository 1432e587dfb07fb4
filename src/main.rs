//! codex-supervisor entry point.
//!
//! Diagnostics go to stderr via `tracing`; the structured, spec-mandated
//! log file is independent (see `logger.rs`). Single-task mode prints the
//! final agent message to stdout on success and nothing on failure; batch
//! mode always prints the reporter's text.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use codex_supervisor::{batch_parser, cli, error, executor, logger::Logger, reporter, scheduler, supervisor, task::TaskSpec};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut stdin = std::io::stdin();
    let invocation = match cli::parse(std::env::args(), &mut stdin) {
        Ok(inv) => inv,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(error::exit_code_for(&e));
        }
    };

    let exit_code = match invocation {
        cli::Invocation::Help => {
            println!("{}", cli::USAGE);
            0
        }
        cli::Invocation::Version => {
            println!("codex-supervisor {}", env!("CARGO_PKG_VERSION"));
            0
        }
        cli::Invocation::Parallel => run_parallel(&mut stdin),
        cli::Invocation::Single(spec) => run_single(spec),
    };

    std::process::exit(exit_code);
}

/// Install the top-level SIGINT/SIGTERM handler, flipping a shared flag the
/// running supervisor(s) poll at their suspension points: a cancellation
/// flag rather than global signal state.
fn install_signal_handler() -> supervisor::Cancel {
    let cancel: supervisor::Cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    // Best-effort: if a handler is already installed (e.g. under a test
    // harness), leave cancellation to the caller.
    let _ = ctrlc::set_handler(move || {
        flag.store(true, Ordering::Release);
    });
    cancel
}

fn run_single(spec: TaskSpec) -> i32 {
    let logger = match Logger::open(None) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("failed to open log file: {e}");
            return 1;
        }
    };

    let cancel = install_signal_handler();
    let result = supervisor::run(&spec, &logger, false, &cancel);
    let _ = logger.close();

    if result.is_success() {
        println!("{}", result.message);
        println!();
        println!("---");
        if !result.session_id.is_empty() {
            println!("SESSION_ID: {}", result.session_id);
        }
        0
    } else {
        eprintln!("{}", result.error);
        result.exit_code
    }
}

fn run_parallel(stdin: &mut dyn Read) -> i32 {
    let mut input = String::new();
    if let Err(e) = stdin.read_to_string(&mut input) {
        eprintln!("failed to read batch input: {e}");
        return 1;
    }

    let specs = match batch_parser::parse(&input) {
        Ok(specs) => specs,
        Err(e) => {
            eprintln!("{e}");
            return error::exit_code_for(&e);
        }
    };

    let layers = match scheduler::schedule(specs) {
        Ok(layers) => layers,
        Err(e) => {
            eprintln!("{e}");
            return error::exit_code_for(&e);
        }
    };

    let logger = match Logger::open(None) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("failed to open log file: {e}");
            return 1;
        }
    };

    let cancel = install_signal_handler();
    let results = executor::execute(layers, &logger, &cancel);
    let _ = logger.close();

    let (text, exit_code) = reporter::report(&results);
    println!("{text}");
    exit_code
}
