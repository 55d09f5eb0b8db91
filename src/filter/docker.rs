//! Filter for `docker build`, `docker buildx build`, and `docker compose build`.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ends_with_newline, ensure_trailing_newline, is_subcommand, strip_ansi};
use super::{FilterResult, Strategy};

/// Docker global flags that consume the next argument as a value.
const DOCKER_VALUE_FLAGS: &[&str] = &["-H", "--host", "--config", "--context", "-l", "--log-level"];

/// Subcommand-specific flags that consume a following value argument.
fn docker_subcmd_value_flags(subcmd: &str) -> &'static [&'static str] {
    match subcmd {
        "buildx" => &["--builder", "--platform"],
        "compose" => &["-f", "--file", "-p", "--project-name", "--profile"],
        _ => &[],
    }
}

/// Returns the first two non-flag positional args, skipping flags and their
/// values. After the first positional, its subcommand-specific value flags
/// are recognized too.
fn docker_subcommands(args: &[String]) -> (Option<&str>, Option<&str>) {
    let mut positional: Vec<&str> = Vec::new();
    let mut skip = false;
    let mut subcmd_flags: &[&str] = &[];

    for arg in args {
        if skip {
            skip = false;
            continue;
        }
        if DOCKER_VALUE_FLAGS.contains(&arg.as_str()) || subcmd_flags.contains(&arg.as_str()) {
            skip = true;
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        positional.push(arg);
        if positional.len() == 1 {
            subcmd_flags = docker_subcmd_value_flags(arg);
        }
        if positional.len() == 2 {
            break;
        }
    }

    (positional.first().copied(), positional.get(1).copied())
}

/// Strips builder noise from docker build output; on failure surfaces the
/// error lines plus the tail of the output.
pub struct DockerBuildStrategy;

static DOCKER_LEGACY_HASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*---> [0-9a-f]").unwrap());
static DOCKER_REMOVE_CONTAINER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Removing intermediate container").unwrap());
static DOCKER_SEND_CONTEXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Sending build context").unwrap());
static DOCKER_USING_CACHE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"---> Using cache").unwrap());
static DOCKER_STEP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Step \d+/\d+").unwrap());
static DOCKER_SUCCESS_BUILT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Successfully built").unwrap());
static DOCKER_SUCCESS_TAGGED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Successfully tagged").unwrap());
static DOCKER_COPY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^COPY").unwrap());
static DOCKER_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^RUN").unwrap());
static DOCKER_FROM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^FROM").unwrap());
static DOCKER_BUILDKIT_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#\d+").unwrap());
static DOCKER_BUILDKIT_DONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"DONE").unwrap());
static DOCKER_BUILDKIT_ERROR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"ERROR").unwrap());
static DOCKER_BUILDKIT_CACHED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"CACHED").unwrap());
static DOCKER_BUILDKIT_SHA256_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#\d+\s+sha256:").unwrap());
static DOCKER_BUILDKIT_TRANSFER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(\.\d+)?\s*(MB|KB|GB|B)\b").unwrap());
static DOCKER_ERROR_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(error|failed)\b").unwrap());
static DOCKER_ARROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*-->").unwrap());

impl Strategy for DockerBuildStrategy {
    fn name(&self) -> &'static str {
        "docker-build"
    }

    fn can_handle(&self, command: &str, args: &[String]) -> bool {
        if command != "docker" {
            return false;
        }
        if is_subcommand(args, "build", DOCKER_VALUE_FLAGS) {
            return true;
        }
        // Two-word forms: `docker buildx build`, `docker compose build`.
        matches!(
            docker_subcommands(args),
            (Some("buildx"), Some("build")) | (Some("compose"), Some("build"))
        )
    }

    fn reduce(&self, raw: &[u8], _command: &str, _args: &[String], exit_code: i32) -> FilterResult {
        let cleaned = strip_ansi(&String::from_utf8_lossy(raw)).into_owned();
        let had_trailing = ends_with_newline(&cleaned);

        let lines: Vec<&str> = cleaned.split('\n').collect();

        // Small output passes through.
        if lines.len() < 15 {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        if exit_code == 0 {
            filter_success(&lines, &cleaned, had_trailing)
        } else {
            filter_failure(&lines, &cleaned, had_trailing)
        }
    }
}

fn filter_success(lines: &[&str], cleaned: &str, had_trailing: bool) -> FilterResult {
    let mut kept: Vec<&str> = Vec::new();

    for line in lines {
        // Legacy builder noise.
        if DOCKER_LEGACY_HASH_RE.is_match(line)
            || DOCKER_REMOVE_CONTAINER_RE.is_match(line)
            || DOCKER_SEND_CONTEXT_RE.is_match(line)
            || DOCKER_USING_CACHE_RE.is_match(line)
        {
            continue;
        }

        // Dockerfile instruction lines.
        if DOCKER_STEP_RE.is_match(line)
            || DOCKER_SUCCESS_BUILT_RE.is_match(line)
            || DOCKER_SUCCESS_TAGGED_RE.is_match(line)
            || DOCKER_COPY_RE.is_match(line)
            || DOCKER_RUN_RE.is_match(line)
            || DOCKER_FROM_RE.is_match(line)
        {
            kept.push(line);
            continue;
        }

        // BuildKit output.
        if DOCKER_BUILDKIT_LINE_RE.is_match(line) {
            if DOCKER_BUILDKIT_SHA256_RE.is_match(line) {
                continue;
            }
            let is_status = DOCKER_BUILDKIT_DONE_RE.is_match(line)
                || DOCKER_BUILDKIT_ERROR_RE.is_match(line)
                || DOCKER_BUILDKIT_CACHED_RE.is_match(line);
            // Pure byte-transfer chatter.
            if DOCKER_BUILDKIT_TRANSFER_RE.is_match(line) && !is_status {
                continue;
            }
            if is_status {
                kept.push(line);
            }
            continue;
        }

        kept.push(line);
    }

    if kept.len() >= lines.len() {
        return FilterResult { filtered: cleaned.to_string(), was_reduced: false };
    }

    let filtered = ensure_trailing_newline(kept.join("\n"), had_trailing);
    let was_reduced = filtered.len() < cleaned.len();
    FilterResult { filtered, was_reduced }
}

fn filter_failure(lines: &[&str], cleaned: &str, had_trailing: bool) -> FilterResult {
    let mut included = vec![false; lines.len()];

    // Error-pattern lines.
    for (i, line) in lines.iter().enumerate() {
        if DOCKER_ERROR_LINE_RE.is_match(line)
            || (DOCKER_BUILDKIT_LINE_RE.is_match(line) && DOCKER_BUILDKIT_ERROR_RE.is_match(line))
            || DOCKER_ARROW_RE.is_match(line)
        {
            included[i] = true;
        }
    }

    // The last 10 non-empty lines.
    let non_empty: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, _)| i)
        .collect();
    let tail_start = non_empty.len().saturating_sub(10);
    for &idx in &non_empty[tail_start..] {
        included[idx] = true;
    }

    let kept: Vec<&str> = lines
        .iter()
        .enumerate()
        .filter(|(i, _)| included[*i])
        .map(|(_, line)| *line)
        .collect();

    if kept.len() >= lines.len() || kept.is_empty() {
        return FilterResult { filtered: cleaned.to_string(), was_reduced: false };
    }

    let filtered = ensure_trailing_newline(kept.join("\n"), had_trailing);
    let was_reduced = filtered.len() < cleaned.len();
    FilterResult { filtered, was_reduced }
}
