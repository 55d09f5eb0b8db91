//! Command-aware output reduction strategies.
//!
//! Each strategy bundles a stable name, a predicate over the wrapped command
//! line, and a reduction over the captured stdout bytes. The [`Registry`]
//! picks the first matching strategy in priority order and falls back to
//! pass-through. Reductions are panic-safe: a strategy that panics degrades
//! to pass-through instead of taking the supervisor down.

pub mod ansi;
pub mod cargo;
pub mod docker;
pub mod generic;
pub mod git;
pub mod go_cmd;
pub mod grep;
pub mod passthrough;
pub mod progress;
pub mod registry;

pub use ansi::strip_ansi;
pub use cargo::{CargoBuildStrategy, CargoTestStrategy};
pub use docker::DockerBuildStrategy;
pub use generic::GenericErrorStrategy;
pub use git::{GitDiffStrategy, GitLogStrategy, GitStatusStrategy};
pub use go_cmd::{GoBuildStrategy, GoTestStrategy};
pub use grep::GrepGroupStrategy;
pub use passthrough::PassthroughStrategy;
pub use progress::ProgressStripStrategy;
pub use registry::Registry;

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// The outcome of filtering: the text to show the caller and whether the
/// reduction actually shrank the output (drives the log footer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterResult {
    pub filtered: String,
    pub was_reduced: bool,
}

impl FilterResult {
    /// The raw input rendered as-is, flagged unreduced.
    fn passthrough(raw: &[u8]) -> Self {
        Self {
            filtered: String::from_utf8_lossy(raw).into_owned(),
            was_reduced: false,
        }
    }
}

/// A command-scoped output reduction strategy.
///
/// Implementors provide [`reduce`](Strategy::reduce); callers go through
/// [`filter`](Strategy::filter), which wraps the reduction in a panic guard
/// so that no strategy can crash the supervisor.
pub trait Strategy: Send + Sync {
    /// Short stable identifier used in diagnostics.
    fn name(&self) -> &'static str;

    /// Whether this strategy applies to the given command line.
    fn can_handle(&self, command: &str, args: &[String]) -> bool;

    /// The reduction itself. May panic; [`filter`](Strategy::filter) recovers.
    fn reduce(&self, raw: &[u8], command: &str, args: &[String], exit_code: i32) -> FilterResult;

    /// Runs the reduction behind a panic barrier. On panic the input passes
    /// through unchanged and a note lands on stderr.
    fn filter(&self, raw: &[u8], command: &str, args: &[String], exit_code: i32) -> FilterResult {
        match catch_unwind(AssertUnwindSafe(|| self.reduce(raw, command, args, exit_code))) {
            Ok(result) => result,
            Err(payload) => {
                eprintln!(
                    "coc: filter {} recovered from panic: {}",
                    self.name(),
                    panic_message(payload.as_ref())
                );
                FilterResult::passthrough(raw)
            }
        }
    }
}

/// Extracts a printable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Finds the first non-flag argument and checks whether it equals `subcmd`,
/// skipping flags that consume a following value argument (like git's `-c`
/// or go's `-C`).
pub(crate) fn is_subcommand(args: &[String], subcmd: &str, value_flags: &[&str]) -> bool {
    let mut skip = false;
    for arg in args {
        if skip {
            skip = false;
            continue;
        }
        if value_flags.contains(&arg.as_str()) {
            skip = true;
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        return arg == subcmd;
    }
    false
}

/// Reports whether `s` ends with a newline character.
pub(crate) fn ends_with_newline(s: &str) -> bool {
    s.ends_with('\n')
}

/// Appends a newline if the original had one and the result doesn't.
pub(crate) fn ensure_trailing_newline(mut result: String, had_trailing: bool) -> String {
    if had_trailing && !result.ends_with('\n') {
        result.push('\n');
    }
    result
}
