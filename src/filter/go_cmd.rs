//! Filters for `go test` and `go build`/`go vet`/`go install`.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ends_with_newline, ensure_trailing_newline, is_subcommand, strip_ansi};
use super::{FilterResult, Strategy};

/// Go global flags that consume the next argument as a value.
const GO_VALUE_FLAGS: &[&str] = &["-C"];

// ---------------------------------------------------------------------------
// GoTestStrategy
// ---------------------------------------------------------------------------

/// Surfaces failures and summarizes passes in `go test` output.
pub struct GoTestStrategy;

static GO_TEST_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^=== RUN\s+(\S+)").unwrap());
static GO_TEST_PASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^--- PASS:\s").unwrap());
static GO_TEST_FAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^--- FAIL:\s").unwrap());
static GO_TEST_PAUSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^=== PAUSE\s").unwrap());
static GO_TEST_CONT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^=== CONT\s").unwrap());
static GO_TEST_STANDALONE_FAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^FAIL$").unwrap());

fn is_package_summary(line: &str) -> bool {
    line.starts_with("ok  \t") || line.starts_with("FAIL\t") || line.starts_with("?   \t")
}

#[derive(Default)]
struct TestBlock {
    lines: Vec<String>,
    failed: bool,
}

impl Strategy for GoTestStrategy {
    fn name(&self) -> &'static str {
        "go-test"
    }

    fn can_handle(&self, command: &str, args: &[String]) -> bool {
        command == "go" && is_subcommand(args, "test", GO_VALUE_FLAGS)
    }

    fn reduce(&self, raw: &[u8], _command: &str, _args: &[String], exit_code: i32) -> FilterResult {
        let cleaned = strip_ansi(&String::from_utf8_lossy(raw)).into_owned();
        let had_trailing = ends_with_newline(&cleaned);

        let lines: Vec<&str> = cleaned.split('\n').collect();

        // Small output passes through.
        let pkg_count = lines.iter().filter(|line| is_package_summary(line)).count();
        if pkg_count <= 2 && lines.len() < 10 {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        let mut summary_lines: Vec<&str> = Vec::new();
        let mut fail_blocks: Vec<TestBlock> = Vec::new();
        let mut current: Option<TestBlock> = None;
        let mut orphaned_lines: Vec<&str> = Vec::new();

        for line in &lines {
            if is_package_summary(line) || GO_TEST_STANDALONE_FAIL_RE.is_match(line) {
                summary_lines.push(line);
                continue;
            }

            // Test start. Flush a previous failing block first.
            if GO_TEST_RUN_RE.is_match(line) {
                if let Some(block) = current.take() {
                    if block.failed {
                        fail_blocks.push(block);
                    }
                }
                current = Some(TestBlock { lines: vec![line.to_string()], failed: false });
                continue;
            }

            if GO_TEST_PAUSE_RE.is_match(line) || GO_TEST_CONT_RE.is_match(line) {
                continue;
            }

            if GO_TEST_PASS_RE.is_match(line) {
                current = None;
                continue;
            }

            if GO_TEST_FAIL_RE.is_match(line) {
                if let Some(mut block) = current.take() {
                    block.failed = true;
                    block.lines.push(line.to_string());
                    fail_blocks.push(block);
                } else {
                    // A FAIL without a prior RUN is an orphan.
                    orphaned_lines.push(line);
                }
                continue;
            }

            // Plain output belongs to the open test block; otherwise it is an
            // orphan (compiler errors and the like).
            if let Some(block) = current.as_mut() {
                block.lines.push(line.to_string());
            } else if !line.trim().is_empty() {
                orphaned_lines.push(line);
            }
        }

        if let Some(block) = current.take() {
            if block.failed {
                fail_blocks.push(block);
            }
        }

        let mut out: Vec<String> = Vec::new();

        if exit_code == 0 {
            // Success: package summaries only.
            out.extend(summary_lines.iter().map(|line| line.to_string()));
            let passed_pkgs = summary_lines
                .iter()
                .filter(|line| line.starts_with("ok  \t") || line.starts_with("?   \t"))
                .count();
            out.push(format!("all tests passed ({passed_pkgs} packages)"));
        } else {
            // Failure: failing blocks, then orphans, then summaries.
            for block in &fail_blocks {
                out.extend(block.lines.iter().cloned());
            }
            out.extend(orphaned_lines.iter().map(|line| line.to_string()));
            out.extend(summary_lines.iter().map(|line| line.to_string()));
        }

        let filtered = ensure_trailing_newline(out.join("\n"), had_trailing);
        let was_reduced = filtered.len() < cleaned.len();
        FilterResult { filtered, was_reduced }
    }
}

// ---------------------------------------------------------------------------
// GoBuildStrategy
// ---------------------------------------------------------------------------

/// Keeps only compiler diagnostics from failing `go build`/`go vet`/`go install` runs.
pub struct GoBuildStrategy;

/// Matches compiler-style error lines: `file.go:line:col: message`.
static GO_BUILD_ERROR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\S+\.go:\d+:\d+:").unwrap());

impl Strategy for GoBuildStrategy {
    fn name(&self) -> &'static str {
        "go-build"
    }

    fn can_handle(&self, command: &str, args: &[String]) -> bool {
        if command != "go" {
            return false;
        }
        is_subcommand(args, "build", GO_VALUE_FLAGS)
            || is_subcommand(args, "vet", GO_VALUE_FLAGS)
            || is_subcommand(args, "install", GO_VALUE_FLAGS)
    }

    fn reduce(&self, raw: &[u8], _command: &str, _args: &[String], exit_code: i32) -> FilterResult {
        let cleaned = strip_ansi(&String::from_utf8_lossy(raw)).into_owned();

        // Success output (usually empty) passes through.
        if exit_code == 0 {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        let had_trailing = ends_with_newline(&cleaned);
        let lines: Vec<&str> = cleaned.split('\n').collect();

        let mut kept: Vec<&str> = Vec::new();
        let mut total_non_empty = 0usize;

        for line in &lines {
            if line.trim().is_empty() {
                continue;
            }
            total_non_empty += 1;

            if line.starts_with("# ") || GO_BUILD_ERROR_RE.is_match(line) {
                kept.push(line);
            }
        }

        // Nothing stripped means nothing gained.
        if kept.len() >= total_non_empty {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        let filtered = ensure_trailing_newline(kept.join("\n"), had_trailing);
        FilterResult { filtered, was_reduced: true }
    }
}
