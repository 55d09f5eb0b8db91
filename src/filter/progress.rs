//! Filter that strips progress bars and spinners from package managers and
//! download commands.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ends_with_newline, ensure_trailing_newline, is_subcommand, strip_ansi};
use super::{FilterResult, Strategy};

/// Commands and the subcommands of theirs that produce progress output.
const PROGRESS_COMMANDS: &[(&str, &[&str])] = &[
    ("npm", &["install", "ci", "update"]),
    ("yarn", &["install", "add"]),
    ("pip", &["install"]),
    ("pip3", &["install"]),
    ("docker", &["pull", "push"]),
];

/// Per-command flags that consume a following value argument.
fn progress_value_flags(command: &str) -> &'static [&'static str] {
    match command {
        "docker" => &["--host", "-H", "--config", "--context", "-l", "--log-level"],
        "npm" => &["--prefix", "--registry", "--cache"],
        "pip" | "pip3" => &["--target", "-t", "--prefix", "--root", "-i", "--index-url"],
        "yarn" => &["--cwd", "--modules-folder", "--cache-folder"],
        _ => &[],
    }
}

/// Strips progress bar / spinner output, dedupes repeated lines, and keeps
/// the informational remainder.
pub struct ProgressStripStrategy;

static PROGRESS_BAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[#+[=> ]*\]").unwrap());
static PROGRESS_PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+%").unwrap());
static PROGRESS_SPEED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(\.\d+)?\s*(MB|KB|GB|B)/s").unwrap());
static PROGRESS_ETA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\beta\b").unwrap());
static DOCKER_LAYER_PROGRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-f0-9]+: (Downloading|Extracting|Pulling fs layer|Waiting|Verifying)").unwrap());
static DOCKER_LAYER_COMPLETE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-f0-9]+: (Pull complete|Already exists)").unwrap());
static NPM_WARN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^npm WARN").unwrap());
static NPM_ERR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^npm ERR!").unwrap());
static NPM_ADDED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^added \d+ packages").unwrap());
static NPM_SPINNER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏|/\\-]").unwrap());

impl Strategy for ProgressStripStrategy {
    fn name(&self) -> &'static str {
        "progress-strip"
    }

    fn can_handle(&self, command: &str, args: &[String]) -> bool {
        let Some((_, subs)) = PROGRESS_COMMANDS.iter().find(|(cmd, _)| *cmd == command) else {
            return false;
        };
        let value_flags = progress_value_flags(command);
        subs.iter().any(|sub| is_subcommand(args, sub, value_flags))
    }

    fn reduce(&self, raw: &[u8], _command: &str, _args: &[String], _exit_code: i32) -> FilterResult {
        let cleaned = strip_ansi(&String::from_utf8_lossy(raw)).into_owned();
        let had_trailing = ends_with_newline(&cleaned);

        let lines: Vec<&str> = cleaned.split('\n').collect();

        // Small output passes through.
        if lines.len() < 10 {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        let mut kept: Vec<&str> = Vec::new();
        let mut prev: &str = "";
        let mut cr_cleaned = false;

        for &line in &lines {
            // Carriage-return redraws: only the content after the last \r is
            // what ended up on screen.
            let line = match line.rfind('\r') {
                Some(idx) => {
                    cr_cleaned = true;
                    &line[idx + 1..]
                }
                None => line,
            };

            // Docker pull layer lines: drop progress, keep completion.
            if DOCKER_LAYER_PROGRESS_RE.is_match(line) {
                continue;
            }
            if DOCKER_LAYER_COMPLETE_RE.is_match(line) {
                if line != prev {
                    kept.push(line);
                    prev = line;
                }
                continue;
            }

            if NPM_SPINNER_RE.is_match(line) {
                continue;
            }

            // npm informational lines always survive.
            if NPM_WARN_RE.is_match(line) || NPM_ERR_RE.is_match(line) || NPM_ADDED_RE.is_match(line) {
                if line != prev {
                    kept.push(line);
                    prev = line;
                }
                continue;
            }

            if PROGRESS_BAR_RE.is_match(line) {
                continue;
            }
            if PROGRESS_PERCENT_RE.is_match(line)
                && (PROGRESS_SPEED_RE.is_match(line) || PROGRESS_ETA_RE.is_match(line))
            {
                continue;
            }

            // Deduplicate consecutive identical lines.
            if line == prev {
                continue;
            }

            kept.push(line);
            prev = line;
        }

        let lines_removed = lines.len().saturating_sub(kept.len());
        if lines_removed == 0 && !cr_cleaned {
            return FilterResult { filtered: cleaned, was_reduced: false };
        }

        // Only CR cleanup happened: rebuild without the header.
        if lines_removed == 0 {
            let filtered = ensure_trailing_newline(kept.join("\n"), had_trailing);
            let was_reduced = filtered.len() < cleaned.len();
            return FilterResult { filtered, was_reduced };
        }

        let mut out: Vec<String> = vec![format!("Progress output stripped ({lines_removed} lines removed):")];
        out.extend(kept.iter().map(|line| line.to_string()));

        let filtered = ensure_trailing_newline(out.join("\n"), had_trailing);
        FilterResult { filtered, was_reduced: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svec(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn can_handle_progress_producing_subcommands() {
        let s = ProgressStripStrategy;
        assert!(s.can_handle("npm", &svec(&["install"])));
        assert!(s.can_handle("npm", &svec(&["ci"])));
        assert!(s.can_handle("docker", &svec(&["pull", "alpine"])));
        assert!(s.can_handle("docker", &svec(&["push", "myimage"])));
        assert!(s.can_handle("pip", &svec(&["install", "requests"])));
        assert!(s.can_handle("pip3", &svec(&["install", "flask"])));
        assert!(s.can_handle("yarn", &svec(&["add", "lodash"])));
        assert!(s.can_handle("yarn", &svec(&["install"])));
        assert!(s.can_handle("docker", &svec(&["-H", "tcp://host:2375", "pull", "alpine"])));
        assert!(s.can_handle("npm", &svec(&["--prefix", "/some/path", "install"])));
        assert!(s.can_handle("pip", &svec(&["--target", "/some/dir", "install", "requests"])));
        assert!(s.can_handle("yarn", &svec(&["--cwd", "/some/dir", "add", "lodash"])));
        assert!(!s.can_handle("npm", &svec(&["test"])));
        assert!(!s.can_handle("npm", &svec(&["run", "dev"])));
        assert!(!s.can_handle("go", &svec(&["install"])));
        assert!(!s.can_handle("docker", &svec(&["build", "."])));
    }

    #[test]
    fn npm_install_spinners_are_stripped() {
        let input = "npm WARN deprecated mkdirp@0.5.1: Legacy versions\n\
            npm WARN deprecated request@2.88.2: request has been deprecated\n\
            ⠋ reify:lodash: timing reifyNode\n\
            ⠙ reify:express: timing reifyNode\n\
            ⠹ reify:body-parser: timing reifyNode\n\
            ⠸ reify:cookie: timing reifyNode\n\
            ⠼ reify:debug: timing reifyNode\n\
            ⠴ reify:ms: timing reifyNode\n\
            added 50 packages in 3.456s\n\
            some final line\n\
            another final line\n";

        let result = ProgressStripStrategy.filter(input.as_bytes(), "npm", &svec(&["install"]), 0);

        assert!(result.was_reduced);
        assert!(result.filtered.contains("npm WARN deprecated mkdirp"));
        assert!(result.filtered.contains("npm WARN deprecated request"));
        assert!(result.filtered.contains("added 50 packages"));
        assert!(!result.filtered.contains("reify:lodash"));
        assert!(!result.filtered.contains("reify:express"));
        assert!(result.filtered.contains("Progress output stripped"));
    }

    #[test]
    fn docker_pull_layer_progress_is_stripped() {
        let input = "Using default tag: latest\n\
            latest: Pulling from library/alpine\n\
            abc123: Pulling fs layer\n\
            def456: Pulling fs layer\n\
            abc123: Downloading [==>                  ] 5MB/50MB\n\
            abc123: Downloading [========>            ] 20MB/50MB\n\
            def456: Waiting\n\
            abc123: Pull complete\n\
            def456: Extracting [=>                   ] 1MB/25MB\n\
            def456: Pull complete\n\
            ghi789: Already exists\n\
            Digest: sha256:abcdef123456\n\
            Status: Downloaded newer image\n";

        let result = ProgressStripStrategy.filter(input.as_bytes(), "docker", &svec(&["pull", "alpine"]), 0);

        assert!(result.was_reduced);
        assert!(result.filtered.contains("abc123: Pull complete"));
        assert!(result.filtered.contains("def456: Pull complete"));
        assert!(result.filtered.contains("ghi789: Already exists"));
        assert!(!result.filtered.contains("Pulling fs layer"));
        assert!(!result.filtered.contains("Downloading"));
        assert!(!result.filtered.contains("Extracting"));
        assert!(!result.filtered.contains("Waiting"));
    }

    #[test]
    fn carriage_return_redraws_keep_final_content() {
        let input = "Downloading package 1...\rDownloading package 1... 50%\rDownloading package 1... done\n\
            Downloading package 2...\rDownloading package 2... 50%\rDownloading package 2... done\n\
            Downloading package 3...\rDownloading package 3... done\n\
            Downloading package 4...\rDownloading package 4... done\n\
            Downloading package 5...\rDownloading package 5... done\n\
            Downloading package 6...\rDownloading package 6... done\n\
            Downloading package 7...\rDownloading package 7... done\n\
            Downloading package 8...\rDownloading package 8... done\n\
            Installation complete\n\
            Summary: 8 packages installed\n";

        let result = ProgressStripStrategy.filter(input.as_bytes(), "pip", &svec(&["install", "requests"]), 0);

        assert!(!result.filtered.contains("50%"));
        assert!(result.filtered.contains("done"));
        assert!(result.filtered.contains("Installation complete"));
    }

    #[test]
    fn small_output_passes_through() {
        let input = "npm WARN deprecated pkg@1.0.0: old\nadded 5 packages in 1.2s\n";
        let result = ProgressStripStrategy.filter(input.as_bytes(), "npm", &svec(&["install"]), 0);
        assert!(!result.was_reduced);
        assert_eq!(result.filtered, input);
    }

    #[test]
    fn empty_input() {
        let result = ProgressStripStrategy.filter(b"", "npm", &svec(&["install"]), 0);
        assert!(!result.was_reduced);
        assert_eq!(result.filtered, "");
    }
}
