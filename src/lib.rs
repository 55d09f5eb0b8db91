//! # coc
//!
//! CMD Output Curator -- a transparent subprocess proxy that tees command
//! output to per-invocation log files and filters stdout so AI agents burn
//! fewer context tokens on verbose command output.
//!
//! ## Usage
//!
//! ```bash
//! coc [flags] <command> [args...]
//! ```
//!
//! ## Modules
//!
//! - `cli` - Command-line surface: proxy flag parsing, `hook` and `init` subcommands
//! - `executor` - Child process supervision: concurrent tee, signal forwarding, filtering
//! - `filter` - Command-aware output reduction strategies and their registry
//! - `logpath` - Deterministic log file path derivation and creation

pub mod cli;
pub mod executor;
pub mod filter;
pub mod logpath;
