//! Filters for `git status`, `git diff`, and `git log`.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ends_with_newline, ensure_trailing_newline, is_subcommand, strip_ansi};
use super::{FilterResult, Strategy};

/// Git global flags that consume the next argument as a value.
const GIT_VALUE_FLAGS: &[&str] = &["-c", "-C", "--git-dir", "--work-tree"];

// ---------------------------------------------------------------------------
// GitStatusStrategy
// ---------------------------------------------------------------------------

/// Condenses `git status` output into a compact summary.
pub struct GitStatusStrategy;

/// Verbose status markers and their short forms, checked in priority order.
const STATUS_REPLACEMENTS: &[(&str, &str)] = &[
    ("modified:", "M"),
    ("new file:", "A"),
    ("deleted:", "D"),
    ("renamed:", "R"),
    ("copied:", "C"),
    ("typechange:", "T"),
];

impl Strategy for GitStatusStrategy {
    fn name(&self) -> &'static str {
        "git-status"
    }

    fn can_handle(&self, command: &str, args: &[String]) -> bool {
        command == "git" && is_subcommand(args, "status", GIT_VALUE_FLAGS)
    }

    fn reduce(&self, raw: &[u8], _command: &str, _args: &[String], _exit_code: i32) -> FilterResult {
        let cleaned = strip_ansi(&String::from_utf8_lossy(raw)).into_owned();
        let had_trailing = ends_with_newline(&cleaned);

        // Clean tree passes through unchanged.
        if cleaned.contains("nothing to commit, working tree clean") {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        let lines: Vec<&str> = cleaned.split('\n').collect();

        // Small output is not worth filtering.
        if lines.len() < 5 {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        let mut out: Vec<String> = Vec::new();
        let mut staged = 0usize;
        let mut unstaged = 0usize;
        let mut untracked = 0usize;
        let mut section = "";

        for line in &lines {
            // Keep the branch / detached-HEAD line.
            if line.starts_with("On branch ")
                || line.starts_with("HEAD detached at ")
                || line.starts_with("HEAD detached from ")
            {
                out.push(line.to_string());
                continue;
            }

            // Section headers.
            if line.starts_with("Changes to be committed:") {
                section = "staged";
                out.push(line.to_string());
                continue;
            }
            if line.starts_with("Changes not staged for commit:") {
                section = "unstaged";
                out.push(line.to_string());
                continue;
            }
            if line.starts_with("Untracked files:") {
                section = "untracked";
                out.push(line.to_string());
                continue;
            }

            // Drop hint lines.
            if line.starts_with("  (use \"git") {
                continue;
            }

            // File listing lines start with a tab.
            if line.starts_with('\t') {
                let mut converted = line.to_string();
                for &(from, to) in STATUS_REPLACEMENTS {
                    if converted.contains(from) {
                        converted = converted.replacen(from, to, 1);
                        break;
                    }
                }
                out.push(converted);

                match section {
                    "staged" => staged += 1,
                    "unstaged" => unstaged += 1,
                    "untracked" => untracked += 1,
                    _ => {}
                }
                continue;
            }

            // Keep empty lines between sections for readability.
            if line.trim().is_empty() {
                out.push(line.to_string());
                continue;
            }

            // Drop everything else (other hint lines, ahead/behind chatter).
        }

        out.push(format!("{staged} staged, {unstaged} unstaged, {untracked} untracked"));

        let filtered = ensure_trailing_newline(out.join("\n"), had_trailing);
        FilterResult { filtered, was_reduced: true }
    }
}

// ---------------------------------------------------------------------------
// GitDiffStrategy
// ---------------------------------------------------------------------------

/// Strips noise from `git diff` output and prefixes a per-file summary.
pub struct GitDiffStrategy;

/// Matches `index <hash>..<hash>` lines in diff output.
static INDEX_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^index [0-9a-f]+\.\.[0-9a-f]+").unwrap());

/// Matches binary file lines like `Binary files a/foo.png and b/foo.png differ`.
static BINARY_FILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Binary files .* differ$").unwrap());

/// Extracts the filename from a binary file line, preferring the `b/` side.
static BINARY_FILE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Binary files (?:a/\S+ and )?b/(\S+) differ$").unwrap());

/// Extracts the `a/` side filename when the `b/` side is `/dev/null`.
static BINARY_FILE_NAME_FALLBACK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Binary files a/(\S+) and /dev/null differ$").unwrap());

#[derive(Default)]
struct FileStat {
    name: String,
    insertions: usize,
    deletions: usize,
    binary: bool,
}

impl Strategy for GitDiffStrategy {
    fn name(&self) -> &'static str {
        "git-diff"
    }

    fn can_handle(&self, command: &str, args: &[String]) -> bool {
        command == "git" && is_subcommand(args, "diff", GIT_VALUE_FLAGS)
    }

    fn reduce(&self, raw: &[u8], _command: &str, _args: &[String], _exit_code: i32) -> FilterResult {
        let cleaned = strip_ansi(&String::from_utf8_lossy(raw)).into_owned();
        let had_trailing = ends_with_newline(&cleaned);

        let lines: Vec<&str> = cleaned.split('\n').collect();

        // Short diffs pass through unchanged.
        if lines.len() < 20 {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        let mut file_stats: Vec<FileStat> = Vec::new();
        let mut current: Option<usize> = None;
        let mut kept: Vec<&str> = Vec::new();
        let mut last_minus_file = String::new();

        for line in &lines {
            if line.starts_with("diff --git ") {
                continue;
            }
            if INDEX_LINE_RE.is_match(line) {
                continue;
            }

            if BINARY_FILE_RE.is_match(line) {
                let name = BINARY_FILE_NAME_RE
                    .captures(line)
                    .or_else(|| BINARY_FILE_NAME_FALLBACK_RE.captures(line))
                    .map(|caps| caps[1].to_string())
                    .unwrap_or_default();
                if !name.is_empty() {
                    file_stats.push(FileStat { name, binary: true, ..Default::default() });
                }
                kept.push(line);
                continue;
            }

            // Track `--- a/NAME` for the `+++ /dev/null` deletion case.
            if let Some(name) = line.strip_prefix("--- a/") {
                last_minus_file = name.to_string();
                kept.push(line);
                continue;
            }

            // A `+++ b/NAME` line starts a new file record.
            if let Some(name) = line.strip_prefix("+++ b/") {
                file_stats.push(FileStat { name: name.to_string(), ..Default::default() });
                current = Some(file_stats.len() - 1);
                kept.push(line);
                continue;
            }

            // `+++ /dev/null` and other non-`b/` forms: the record is named
            // after the last `--- a/` line. Must come before `+` counting.
            if line.starts_with("+++ ") {
                if !last_minus_file.is_empty() {
                    file_stats.push(FileStat { name: last_minus_file.clone(), ..Default::default() });
                    current = Some(file_stats.len() - 1);
                }
                kept.push(line);
                continue;
            }

            // `--- /dev/null` and other non-`a/` forms reset the tracker.
            if line.starts_with("--- ") {
                last_minus_file.clear();
                kept.push(line);
                continue;
            }

            if line.starts_with("@@ ") {
                kept.push(line);
                continue;
            }

            if line.starts_with('+') {
                if let Some(idx) = current {
                    file_stats[idx].insertions += 1;
                }
                kept.push(line);
                continue;
            }
            if line.starts_with('-') {
                if let Some(idx) = current {
                    file_stats[idx].deletions += 1;
                }
                kept.push(line);
                continue;
            }

            // Context lines and blanks pass through.
            kept.push(line);
        }

        let mut out: Vec<String> = vec!["Files changed:".to_string()];
        for fs in &file_stats {
            if fs.binary {
                out.push(format!("  {} (binary)", fs.name));
            } else {
                out.push(format!("  {} (+{} -{})", fs.name, fs.insertions, fs.deletions));
            }
        }
        out.push(String::new());
        out.extend(kept.iter().map(|line| line.to_string()));

        let filtered = ensure_trailing_newline(out.join("\n"), had_trailing);
        FilterResult { filtered, was_reduced: true }
    }
}

// ---------------------------------------------------------------------------
// GitLogStrategy
// ---------------------------------------------------------------------------

/// Condenses verbose `git log` output into one line per commit.
pub struct GitLogStrategy;

/// Matches full commit hash lines like `commit abc123...`.
static COMMIT_HASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^commit ([0-9a-f]{40})").unwrap());

#[derive(Default)]
struct CommitInfo {
    short_hash: String,
    author: String,
    date: String,
    message: String,
}

impl Strategy for GitLogStrategy {
    fn name(&self) -> &'static str {
        "git-log"
    }

    fn can_handle(&self, command: &str, args: &[String]) -> bool {
        command == "git" && is_subcommand(args, "log", GIT_VALUE_FLAGS)
    }

    fn reduce(&self, raw: &[u8], _command: &str, _args: &[String], _exit_code: i32) -> FilterResult {
        let cleaned = strip_ansi(&String::from_utf8_lossy(raw)).into_owned();
        let had_trailing = ends_with_newline(&cleaned);

        let lines: Vec<&str> = cleaned.split('\n').collect();

        // Already condensed (e.g. --oneline) output has no full hash lines.
        if !lines.iter().any(|line| COMMIT_HASH_RE.is_match(line)) {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        let mut commits: Vec<CommitInfo> = Vec::new();
        let mut current: Option<CommitInfo> = None;

        for line in &lines {
            if let Some(caps) = COMMIT_HASH_RE.captures(line) {
                if let Some(done) = current.take() {
                    commits.push(done);
                }
                current = Some(CommitInfo {
                    short_hash: caps[1][..7].to_string(),
                    ..Default::default()
                });
                continue;
            }

            let Some(commit) = current.as_mut() else {
                continue;
            };

            if let Some(rest) = line.strip_prefix("Author:") {
                // Keep just the name, dropping the `<email>` part.
                let mut author = rest.trim();
                if let Some(idx) = author.find(" <") {
                    author = &author[..idx];
                }
                commit.author = author.to_string();
                continue;
            }

            if let Some(rest) = line.strip_prefix("Date:") {
                commit.date = rest.trim().to_string();
                continue;
            }

            // The first non-empty indented line is the subject.
            let trimmed = line.trim();
            if !trimmed.is_empty() && commit.message.is_empty() {
                commit.message = trimmed.to_string();
            }
        }
        if let Some(done) = current.take() {
            commits.push(done);
        }

        // Few commits pass through unchanged.
        if commits.len() <= 5 {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        let out: Vec<String> = commits
            .iter()
            .map(|c| format!("{} {} {}: {}", c.short_hash, c.date, c.author, c.message))
            .collect();

        let filtered = ensure_trailing_newline(out.join("\n"), had_trailing);
        FilterResult { filtered, was_reduced: true }
    }
}
