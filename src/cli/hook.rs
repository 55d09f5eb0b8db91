//! Claude Code PreToolUse hook handler.
//!
//! The hook contract is strict: any error path must emit nothing and exit 0.
//! A hook that exits non-zero or produces unexpected output breaks every
//! subsequent tool invocation in the host agent's session, so the hook must
//! be invisible whenever it cannot help.
//!
//! To debug behavior, run it by hand:
//!
//! ```bash
//! echo '{"tool_name":"Bash","tool_input":{"command":"git status"}}' | coc hook
//! ```

use std::io::Read;

use serde::{Deserialize, Serialize};

/// Base commands coc has filters for. Must stay in sync with
/// [`Registry::default_set`](crate::filter::Registry::default_set).
const SUPPORTED_COMMANDS: &[&str] = &[
    "git", "go", "cargo", "docker", "grep", "rg", "npm", "pip", "pip3", "yarn",
];

/// The JSON shape Claude Code sends to PreToolUse hooks.
#[derive(Deserialize, Default)]
#[serde(default)]
struct HookInput {
    tool_name: String,
    tool_input: ToolInput,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ToolInput {
    command: String,
}

/// The JSON shape returned to Claude Code when rewriting the invocation.
#[derive(Serialize)]
struct HookOutput {
    #[serde(rename = "hookSpecificOutput")]
    hook_specific_output: HookSpecificOutput,
}

#[derive(Serialize)]
struct HookSpecificOutput {
    #[serde(rename = "hookEventName")]
    hook_event_name: &'static str,
    #[serde(rename = "permissionDecision")]
    permission_decision: &'static str,
    #[serde(rename = "updatedInput")]
    updated_input: UpdatedInput,
}

#[derive(Serialize)]
struct UpdatedInput {
    command: String,
}

/// Reads hook input from stdin and prints the rewrite JSON when applicable.
pub fn run() {
    let mut input = Vec::new();
    if std::io::stdin().read_to_end(&mut input).is_err() {
        return;
    }
    if let Some(output) = rewrite(&input) {
        print!("{output}");
    }
}

/// Decides whether the tool invocation should be proxied and, if so, returns
/// the rewrite JSON. `None` on every error or not-applicable path.
pub(crate) fn rewrite(input: &[u8]) -> Option<String> {
    let input: HookInput = serde_json::from_slice(input).ok()?;

    if input.tool_name != "Bash" {
        return None;
    }

    let command = input.tool_input.command.trim();
    if command.is_empty() {
        return None;
    }

    // Pipelines, chains, and substitutions cannot be wrapped.
    if contains_shell_ops(command) {
        return None;
    }

    let first_word = command.split_whitespace().next()?;

    // Never double-wrap.
    if first_word == "coc" {
        return None;
    }

    if !SUPPORTED_COMMANDS.contains(&first_word) {
        return None;
    }

    let output = HookOutput {
        hook_specific_output: HookSpecificOutput {
            hook_event_name: "PreToolUse",
            permission_decision: "allow",
            updated_input: UpdatedInput { command: format!("coc {command}") },
        },
    };
    serde_json::to_string(&output).ok()
}

/// Checks for shell operators that prevent wrapping.
///
/// NOTE: plain substring matching produces false positives for operators
/// inside quoted strings (e.g. `git log --grep="|pattern"`). That is fine
/// here: a false positive just means the command runs unwrapped.
fn contains_shell_ops(cmd: &str) -> bool {
    cmd.contains('|')
        || cmd.contains("&&")
        || cmd.contains("||")
        || cmd.contains(';')
        || cmd.contains("$(")
        || cmd.contains('`')
}
