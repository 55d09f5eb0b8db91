//! Filter that groups grep/ripgrep matches by file.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ends_with_newline, ensure_trailing_newline, strip_ansi};
use super::{FilterResult, Strategy};

/// Groups grep and rg output by file with a per-file count and a summary.
pub struct GrepGroupStrategy;

/// Matches grep/rg output lines: `filename:linenum:content` or `filename:content`.
/// Limitation: filenames containing colons are misparsed (the lazy quantifier
/// stops at the first colon). This ambiguity is inherent to grep's output format.
static GREP_FILE_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+?):(\d+:)?(.*)$").unwrap());

/// Matches `Binary file X matches` notices.
static GREP_BINARY_FILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Binary file .+ matches").unwrap());

const GREP_MAX_LINES_PER_FILE: usize = 8;
const GREP_HEAD_TAIL: usize = 3;

struct FileGroup<'a> {
    name: &'a str,
    lines: Vec<&'a str>,
}

impl Strategy for GrepGroupStrategy {
    fn name(&self) -> &'static str {
        "grep-group"
    }

    fn can_handle(&self, command: &str, _args: &[String]) -> bool {
        command == "grep" || command == "rg"
    }

    fn reduce(&self, raw: &[u8], _command: &str, _args: &[String], exit_code: i32) -> FilterResult {
        let cleaned = strip_ansi(&String::from_utf8_lossy(raw)).into_owned();
        let had_trailing = ends_with_newline(&cleaned);

        let lines: Vec<&str> = cleaned.split('\n').collect();

        // Small output passes through.
        if lines.len() < 10 {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        // Exit 1 is grep's "no matches"; >= 2 is an actual error. Either way
        // there is nothing worth grouping.
        if exit_code != 0 {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        let (groups, binary_notices) = parse_groups(&lines);

        if groups.is_empty() {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        let mut output: Vec<String> = Vec::new();
        let mut total_matches = 0usize;

        for group in &groups {
            let count = group.lines.len();
            total_matches += count;

            let match_word = if count == 1 { "match" } else { "matches" };
            output.push(format!("{} ({count} {match_word}):", group.name));

            if count <= GREP_MAX_LINES_PER_FILE {
                for line in &group.lines {
                    output.push(format!("  {line}"));
                }
            } else {
                for line in &group.lines[..GREP_HEAD_TAIL] {
                    output.push(format!("  {line}"));
                }
                output.push(format!("  ... {} more", count - GREP_HEAD_TAIL * 2));
                for line in &group.lines[count - GREP_HEAD_TAIL..] {
                    output.push(format!("  {line}"));
                }
            }
        }

        output.extend(binary_notices.iter().map(|line| line.to_string()));
        output.push(String::new());

        let file_count = groups.len();
        let match_word = if total_matches == 1 { "match" } else { "matches" };
        let file_word = if file_count == 1 { "file" } else { "files" };
        output.push(format!("{total_matches} {match_word} across {file_count} {file_word}"));

        let filtered = ensure_trailing_newline(output.join("\n"), had_trailing);
        let was_reduced = filtered.len() < cleaned.len();
        FilterResult { filtered, was_reduced }
    }
}

/// Parses output lines into file groups (first-seen order) and binary notices.
/// Lines that match neither shape are skipped.
fn parse_groups<'a>(lines: &[&'a str]) -> (Vec<FileGroup<'a>>, Vec<&'a str>) {
    let mut groups: Vec<FileGroup<'a>> = Vec::new();
    let mut binary_notices: Vec<&'a str> = Vec::new();

    for &line in lines {
        if line.trim().is_empty() {
            continue;
        }
        // Context separator emitted by grep -A/-B.
        if line == "--" {
            continue;
        }
        if GREP_BINARY_FILE_RE.is_match(line) {
            binary_notices.push(line);
            continue;
        }

        let Some(caps) = GREP_FILE_LINE_RE.captures(line) else {
            continue;
        };
        let filename = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

        match groups.iter_mut().find(|g| g.name == filename) {
            Some(group) => group.lines.push(line),
            None => groups.push(FileGroup { name: filename, lines: vec![line] }),
        }
    }

    (groups, binary_notices)
}
