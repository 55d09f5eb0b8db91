//! Last-resort filter that extracts error/warning lines from failing commands.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ends_with_newline, ensure_trailing_newline, strip_ansi};
use super::{FilterResult, Strategy};

/// Highlights errors and warnings when the exit code is non-zero. Matches
/// every command, so it must be registered last before the fallback.
pub struct GenericErrorStrategy;

/// Common error/warning patterns in command output.
static GENERIC_ERROR_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\berror\b",
        r"(?i)\bERRO\b",
        r"(?i)\bwarning\b",
        r"(?i)\bWARN\b",
        r"(?i)\bfatal\b",
        r"(?i)\bpanic\b",
        r"^[EW] ",
        r"\S+:\d+:",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

impl Strategy for GenericErrorStrategy {
    fn name(&self) -> &'static str {
        "generic-error"
    }

    fn can_handle(&self, _command: &str, _args: &[String]) -> bool {
        true
    }

    fn reduce(&self, raw: &[u8], _command: &str, _args: &[String], exit_code: i32) -> FilterResult {
        let cleaned = strip_ansi(&String::from_utf8_lossy(raw)).into_owned();

        if exit_code == 0 {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        let had_trailing = ends_with_newline(&cleaned);
        let lines: Vec<&str> = cleaned.split('\n').collect();

        let matched: Vec<bool> = lines
            .iter()
            .map(|line| GENERIC_ERROR_PATTERNS.iter().any(|re| re.is_match(line)))
            .collect();
        let match_count = matched.iter().filter(|m| **m).count();

        let non_empty = lines.iter().filter(|line| !line.trim().is_empty()).count();
        if non_empty == 0 {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        // When a third or more of the output already is errors, extraction
        // buys nothing.
        if match_count as f64 / non_empty as f64 >= 0.3 {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        // Include each match plus one line of context either side.
        let mut included = vec![false; lines.len()];
        for (i, is_match) in matched.iter().enumerate() {
            if !is_match {
                continue;
            }
            included[i] = true;
            if i > 0 {
                included[i - 1] = true;
            }
            if i + 1 < lines.len() {
                included[i + 1] = true;
            }
        }

        let kept: Vec<&str> = lines
            .iter()
            .enumerate()
            .filter(|(i, _)| included[*i])
            .map(|(_, line)| *line)
            .collect();

        // Nothing found: the full output beats an empty screen.
        if kept.is_empty() {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        let mut out: Vec<String> =
            vec![format!("Showing errors/warnings from {} total lines:", lines.len())];
        out.extend(kept.iter().map(|line| line.to_string()));

        let filtered = ensure_trailing_newline(out.join("\n"), had_trailing);
        FilterResult { filtered, was_reduced: true }
    }
}
