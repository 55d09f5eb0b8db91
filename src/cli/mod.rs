//! Command-line surface.
//!
//! The root command is a proxy: everything from the first non-flag token
//! onward is the wrapped command and its arguments, captured verbatim.
//! `hook`, `init`, and `version` are reserved subcommands consumed before
//! any wrapping.

pub mod hook;
pub mod init;

use clap::{ArgAction, CommandFactory, Parser, Subcommand};

use crate::executor::{self, ExecConfig};
use crate::filter::Registry;

/// The `<version> (<commit>)` suffix; clap prepends the binary name when
/// rendering `--version`.
fn version_suffix() -> String {
    format!("{} ({})", env!("CARGO_PKG_VERSION"), env!("COC_BUILD_COMMIT"))
}

/// Returns the `<name> <version> (<commit>)` line printed by both
/// `coc version` and `coc --version`.
pub fn version_line() -> String {
    format!("coc {}", version_suffix())
}

/// CMD Output Curator -- curate CLI output for AI agents
#[derive(Parser)]
#[command(name = "coc")]
#[command(about = "CMD Output Curator -- curate CLI output for AI agents")]
#[command(
    long_about = "coc proxies CLI commands, tees output to log files, and filters stdout \
                  for reduced token consumption by AI agents."
)]
#[command(version = version_suffix())]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Override the base log directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<String>,

    /// Force the pass-through strategy; the log is still written
    #[arg(long)]
    no_filter: bool,

    /// Disable logging entirely (implies --no-filter)
    #[arg(long)]
    no_log: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version information
    Version,

    /// Claude Code PreToolUse hook handler
    ///
    /// Reads hook input from stdin and rewrites supported commands to run
    /// through coc. Emits nothing and exits 0 on any error so a broken hook
    /// never breaks the host agent.
    Hook,

    /// Install the coc hook into Claude Code settings
    Init {
        /// Remove the coc hook from Claude Code settings
        #[arg(long)]
        uninstall: bool,
    },

    // The wrapped command and its arguments, captured verbatim from the
    // first non-flag token onward.
    #[command(external_subcommand)]
    Wrap(Vec<String>),
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }

    /// Dispatches the parsed invocation and returns the process exit code.
    pub async fn execute(self) -> anyhow::Result<i32> {
        match self.command {
            Some(Commands::Version) => {
                println!("{}", version_line());
                Ok(0)
            }
            Some(Commands::Hook) => {
                hook::run();
                Ok(0)
            }
            Some(Commands::Init { uninstall }) => {
                init::run(uninstall)?;
                Ok(0)
            }
            Some(Commands::Wrap(mut tokens)) => {
                let command = tokens.remove(0);
                let cfg = ExecConfig {
                    command,
                    args: tokens,
                    log_dir: self.log_dir.unwrap_or_default(),
                    no_filter: self.no_filter || self.no_log,
                    no_log: self.no_log,
                    registry: Registry::default_set(),
                };
                let result = executor::run(cfg).await;
                Ok(result.exit_code)
            }
            None => {
                // No wrapped command: show help and exit clean.
                let mut cmd = Cli::command();
                let _ = cmd.print_help();
                println!();
                Ok(0)
            }
        }
    }
}
