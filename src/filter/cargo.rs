//! Filters for `cargo test` and `cargo build`/`cargo check`/`cargo clippy`.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ends_with_newline, ensure_trailing_newline, is_subcommand, strip_ansi};
use super::{FilterResult, Strategy};

/// Cargo flags that consume the next argument as a value.
const CARGO_VALUE_FLAGS: &[&str] = &["--manifest-path", "--color"];

// ---------------------------------------------------------------------------
// CargoTestStrategy
// ---------------------------------------------------------------------------

/// Surfaces failures and summarizes passes in `cargo test` output.
pub struct CargoTestStrategy;

static CARGO_TEST_RUNNING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^running \d+ tests?").unwrap());
static CARGO_TEST_RESULT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^test result:").unwrap());
static CARGO_TEST_FAILED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^test .+ FAILED$").unwrap());
static CARGO_FAILURES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^failures:").unwrap());
static CARGO_TEST_PASSED_COUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+) passed").unwrap());

/// Extracts the passed count from a `test result: ok. N passed; ...` line.
fn passed_count(line: &str) -> usize {
    CARGO_TEST_PASSED_COUNT_RE
        .captures(line)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

impl Strategy for CargoTestStrategy {
    fn name(&self) -> &'static str {
        "cargo-test"
    }

    fn can_handle(&self, command: &str, args: &[String]) -> bool {
        command == "cargo" && is_subcommand(args, "test", CARGO_VALUE_FLAGS)
    }

    fn reduce(&self, raw: &[u8], _command: &str, _args: &[String], exit_code: i32) -> FilterResult {
        let cleaned = strip_ansi(&String::from_utf8_lossy(raw)).into_owned();
        let had_trailing = ends_with_newline(&cleaned);

        let lines: Vec<&str> = cleaned.split('\n').collect();

        // Small output passes through.
        if lines.len() < 10 {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        if exit_code == 0 {
            // Success: keep the per-target headers and result summaries.
            let mut kept: Vec<&str> = Vec::new();
            let mut total_tests = 0usize;

            for line in &lines {
                if CARGO_TEST_RUNNING_RE.is_match(line) {
                    kept.push(line);
                    continue;
                }
                if CARGO_TEST_RESULT_RE.is_match(line) {
                    kept.push(line);
                    total_tests += passed_count(line);
                }
            }

            let mut out: Vec<String> = kept.iter().map(|line| line.to_string()).collect();
            out.push(format!("all tests passed ({total_tests} total)"));

            let filtered = ensure_trailing_newline(out.join("\n"), had_trailing);
            let was_reduced = filtered.len() < cleaned.len();
            return FilterResult { filtered, was_reduced };
        }

        // Failure: keep `running N tests` headers, the failures: section up to
        // its closing `test result:` line, all result lines, and FAILED lines.
        let mut kept: Vec<&str> = Vec::new();
        let mut in_failures_section = false;

        for line in &lines {
            if CARGO_TEST_RUNNING_RE.is_match(line) {
                kept.push(line);
                continue;
            }

            if CARGO_FAILURES_RE.is_match(line) {
                in_failures_section = true;
                kept.push(line);
                continue;
            }

            if in_failures_section {
                if CARGO_TEST_RESULT_RE.is_match(line) {
                    in_failures_section = false;
                }
                kept.push(line);
                continue;
            }

            if CARGO_TEST_RESULT_RE.is_match(line) || CARGO_TEST_FAILED_RE.is_match(line) {
                kept.push(line);
            }
        }

        let filtered = ensure_trailing_newline(kept.join("\n"), had_trailing);
        let was_reduced = filtered.len() < cleaned.len();
        FilterResult { filtered, was_reduced }
    }
}

// ---------------------------------------------------------------------------
// CargoBuildStrategy
// ---------------------------------------------------------------------------

/// Keeps only rustc diagnostics from failing `cargo build`/`check`/`clippy` runs.
pub struct CargoBuildStrategy;

static CARGO_BUILD_ERROR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^error\[|^error:").unwrap());
static CARGO_BUILD_WARNING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^warning\[|^warning:").unwrap());
static CARGO_BUILD_ARROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*-->").unwrap());
static CARGO_BUILD_ABORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^aborting due to").unwrap());
static CARGO_BUILD_MORE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^For more information").unwrap());
static CARGO_BUILD_NOTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^= ").unwrap());
static CARGO_BUILD_PIPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d*\s*\|").unwrap());

impl Strategy for CargoBuildStrategy {
    fn name(&self) -> &'static str {
        "cargo-build"
    }

    fn can_handle(&self, command: &str, args: &[String]) -> bool {
        if command != "cargo" {
            return false;
        }
        is_subcommand(args, "build", CARGO_VALUE_FLAGS)
            || is_subcommand(args, "check", CARGO_VALUE_FLAGS)
            || is_subcommand(args, "clippy", CARGO_VALUE_FLAGS)
    }

    fn reduce(&self, raw: &[u8], _command: &str, _args: &[String], exit_code: i32) -> FilterResult {
        let cleaned = strip_ansi(&String::from_utf8_lossy(raw)).into_owned();

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

            if CARGO_BUILD_ERROR_RE.is_match(line)
                || CARGO_BUILD_WARNING_RE.is_match(line)
                || CARGO_BUILD_ARROW_RE.is_match(line)
                || CARGO_BUILD_ABORT_RE.is_match(line)
                || CARGO_BUILD_MORE_RE.is_match(line)
                || CARGO_BUILD_NOTE_RE.is_match(line)
                || CARGO_BUILD_PIPE_RE.is_match(line)
            {
                kept.push(line);
            }
        }

        if kept.len() >= total_non_empty {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        let filtered = ensure_trailing_newline(kept.join("\n"), had_trailing);
        FilterResult { filtered, was_reduced: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svec(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    // -- CargoTestStrategy --------------------------------------------------

    #[test]
    fn cargo_test_can_handle() {
        let s = CargoTestStrategy;
        assert!(s.can_handle("cargo", &svec(&["test"])));
        assert!(s.can_handle("cargo", &svec(&["--manifest-path", "Cargo.toml", "test"])));
        assert!(!s.can_handle("cargo", &svec(&["build"])));
        assert!(!s.can_handle("rustc", &svec(&["test"])));
    }

    #[test]
    fn cargo_test_all_passing_summarizes() {
        let input = "   Compiling myproject v0.1.0 (/home/user/myproject)\n\
            \x20   Finished test [unoptimized + debuginfo] target(s) in 2.34s\n\
            \x20    Running unittests src/lib.rs (target/debug/deps/myproject-abc123)\n\
            \n\
            running 6 tests\n\
            test tests::test_add ... ok\n\
            test tests::test_subtract ... ok\n\
            test tests::test_multiply ... ok\n\
            test tests::test_divide ... ok\n\
            test tests::test_modulo ... ok\n\
            test tests::test_power ... ok\n\
            \n\
            test result: ok. 6 passed; 0 failed; 0 ignored; 0 measured; 0 filtered out; finished in 0.03s\n";

        let result = CargoTestStrategy.filter(input.as_bytes(), "cargo", &svec(&["test"]), 0);

        assert!(result.filtered.contains("running 6 tests"));
        assert!(result.filtered.contains("test result: ok. 6 passed"));
        assert!(result.filtered.contains("all tests passed (6 total)"));
        assert!(!result.filtered.contains("test tests::test_add ... ok"));
        assert!(!result.filtered.contains("test tests::test_multiply ... ok"));
        assert!(result.was_reduced);
    }

    #[test]
    fn cargo_test_failure_keeps_failures_section() {
        let input = "   Compiling myproject v0.1.0 (/home/user/myproject)\n\
            \x20   Finished test [unoptimized + debuginfo] target(s) in 1.50s\n\
            \x20    Running unittests src/lib.rs (target/debug/deps/myproject-abc123)\n\
            \n\
            running 4 tests\n\
            test tests::test_add ... ok\n\
            test tests::test_subtract ... ok\n\
            test tests::test_divide ... FAILED\n\
            test tests::test_multiply ... ok\n\
            \n\
            failures:\n\
            \n\
            ---- tests::test_divide stdout ----\n\
            thread 'tests::test_divide' panicked at 'assertion failed: `(left == right)`\n\
            \x20 left: `0`,\n\
            \x20right: `1`', src/lib.rs:42:9\n\
            \n\
            failures:\n\
            \x20   tests::test_divide\n\
            \n\
            test result: FAILED. 3 passed; 1 failed; 0 ignored; 0 measured; 0 filtered out; finished in 0.02s\n";

        let result = CargoTestStrategy.filter(input.as_bytes(), "cargo", &svec(&["test"]), 101);

        assert!(result.filtered.contains("running 4 tests"));
        assert!(result.filtered.contains("failures:"));
        assert!(result.filtered.contains("tests::test_divide stdout"));
        assert!(result.filtered.contains("assertion failed"));
        assert!(result.filtered.contains("test result: FAILED. 3 passed; 1 failed"));
        assert!(result.filtered.contains("test tests::test_divide ... FAILED"));
        assert!(!result.filtered.contains("test tests::test_add ... ok"));
        assert!(!result.filtered.contains("test tests::test_subtract ... ok"));
        assert!(!result.filtered.contains("Compiling myproject"));
    }

    #[test]
    fn cargo_test_small_output_passes_through() {
        let input = "running 1 test\n\
            test tests::test_add ... ok\n\
            \n\
            test result: ok. 1 passed; 0 failed; 0 ignored; 0 measured; 0 filtered out; finished in 0.01s\n";

        let result = CargoTestStrategy.filter(input.as_bytes(), "cargo", &svec(&["test"]), 0);
        assert!(!result.was_reduced);
        assert_eq!(result.filtered, input);
    }

    #[test]
    fn cargo_test_empty_input() {
        let result = CargoTestStrategy.filter(b"", "cargo", &svec(&["test"]), 0);
        assert!(!result.was_reduced);
        assert_eq!(result.filtered, "");
    }

    // -- CargoBuildStrategy -------------------------------------------------

    #[test]
    fn cargo_build_can_handle() {
        let s = CargoBuildStrategy;
        assert!(s.can_handle("cargo", &svec(&["build"])));
        assert!(s.can_handle("cargo", &svec(&["check"])));
        assert!(s.can_handle("cargo", &svec(&["clippy"])));
        assert!(!s.can_handle("cargo", &svec(&["test"])));
        assert!(!s.can_handle("cargo", &svec(&["run"])));
        assert!(!s.can_handle("gcc", &svec(&["build"])));
    }

    #[test]
    fn cargo_build_success_passes_through() {
        let input = "   Compiling libc v0.2.150\n\
            \x20  Compiling cfg-if v1.0.0\n\
            \x20  Compiling myproject v0.1.0 (/home/user/myproject)\n\
            \x20   Finished dev [unoptimized + debuginfo] target(s) in 5.23s\n";

        let result = CargoBuildStrategy.filter(input.as_bytes(), "cargo", &svec(&["build"]), 0);
        assert!(!result.was_reduced);
        assert_eq!(result.filtered, input);
    }

    #[test]
    fn cargo_build_failure_keeps_diagnostics() {
        let input = "   Compiling myproject v0.1.0 (/home/user/myproject)\n\
            error[E0308]: mismatched types\n\
            \x20 --> src/main.rs:10:5\n\
            \x20  |\n\
            10 |     let x: u32 = \"hello\";\n\
            \x20  |                  ^^^^^^^ expected `u32`, found `&str`\n\
            \x20  |\n\
            = note: expected type `u32`\n\
            \x20          found type `&str`\n\
            \n\
            For more information about this error, try `rustc --explain E0308`.\n\
            error: could not compile `myproject` due to previous error\n\
            aborting due to previous error\n";

        let result = CargoBuildStrategy.filter(input.as_bytes(), "cargo", &svec(&["build"]), 101);

        assert!(result.was_reduced);
        assert!(result.filtered.contains("error[E0308]: mismatched types"));
        assert!(result.filtered.contains("--> src/main.rs:10:5"));
        assert!(result.filtered.contains("aborting due to previous error"));
        assert!(result.filtered.contains("For more information about this error"));
        assert!(result.filtered.contains("error: could not compile"));
        assert!(result.filtered.contains("= note: expected type"));
        assert!(result.filtered.contains("let x: u32"));
        assert!(result.filtered.contains("expected `u32`, found `&str`"));
        assert!(!result.filtered.contains("Compiling myproject"));
    }

    #[test]
    fn cargo_build_warnings_on_success_pass_through() {
        let input = "   Compiling myproject v0.1.0 (/home/user/myproject)\n\
            warning: unused variable: `x`\n\
            \x20 --> src/main.rs:5:9\n\
            \x20  |\n\
            5  |     let x = 42;\n\
            \x20  |         ^ help: prefix it with an underscore: `_x`\n\
            \x20  |\n\
            = note: `#[warn(unused_variables)]` on by default\n\
            \n\
            warning: `myproject` (bin \"myproject\") generated 1 warning\n\
            \x20   Finished dev [unoptimized + debuginfo] target(s) in 0.50s\n";

        let result = CargoBuildStrategy.filter(input.as_bytes(), "cargo", &svec(&["check"]), 0);
        assert!(!result.was_reduced);
        assert_eq!(result.filtered, input);
    }

    #[test]
    fn cargo_build_empty_input() {
        let result = CargoBuildStrategy.filter(b"", "cargo", &svec(&["build"]), 0);
        assert!(!result.was_reduced);
        assert_eq!(result.filtered, "");
    }
}
