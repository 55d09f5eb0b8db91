//! Deterministic log file path derivation.
//!
//! Every proxied invocation gets its own log file at
//! `<base>/<slug>/<session>.log`, where the base directory comes from the
//! `--log-dir` flag, the `COC_LOG_DIR` environment variable, or the system
//! temp directory; the slug is derived from the wrapped command; and the
//! session id is a wall-clock timestamp with a random suffix.

use std::fs::{DirBuilder, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;

/// Returns the full log file path for a given command and args.
/// Priority: `flag_dir` > `COC_LOG_DIR` > default (temp dir + `coc`).
pub fn resolve(flag_dir: &str, command: &str, args: &[String]) -> PathBuf {
    let dir = base_dir(flag_dir);
    let slug = slug(command, args);
    dir.join(slug).join(format!("{}.log", session_id()))
}

/// Determines the log base directory from flag, env, or default.
fn base_dir(flag_dir: &str) -> PathBuf {
    if !flag_dir.is_empty() {
        return PathBuf::from(flag_dir);
    }
    if let Ok(env_dir) = std::env::var("COC_LOG_DIR") {
        if !env_dir.is_empty() {
            return PathBuf::from(env_dir);
        }
    }
    std::env::temp_dir().join("coc")
}

/// Matches any run of characters outside the safe set for slug parts.
static SLUG_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9._-]+").unwrap());

/// Collapses consecutive dashes into a single dash.
static SLUG_DASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").unwrap());

/// Lowercases and sanitizes a single slug component.
fn sanitize_slug_part(part: &str) -> String {
    let lowered = part.to_lowercase();
    let replaced = SLUG_UNSAFE.replace_all(&lowered, "-");
    let collapsed = SLUG_DASHES.replace_all(&replaced, "-");
    collapsed.trim_matches('-').to_string()
}

/// Returns the final path component the way `filepath.Base` does: `"."` for
/// the empty string, `"/"` for all-slash input, trailing slashes stripped.
pub(crate) fn base_name(path: &str) -> &str {
    if path.is_empty() {
        return ".";
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Generates a directory name from the command and its first non-flag argument.
/// Examples: `("git", ["status"])` -> `"git-status"`,
/// `("go", ["test", "./..."])` -> `"go-test"`.
pub fn slug(command: &str, args: &[String]) -> String {
    let mut parts = vec![sanitize_slug_part(base_name(command))];
    for arg in args {
        if arg.starts_with('-') {
            continue;
        }
        parts.push(sanitize_slug_part(base_name(arg)));
        break;
    }
    let mut slug = parts.join("-");
    slug.truncate(64);
    slug
}

/// Generates a timestamp-based session id with a random suffix.
/// Format: `YYYYMMDD-HHMMSS-XXXX` where `XXXX` is 4 random hex chars.
pub fn session_id() -> String {
    let now = Local::now();
    let mut bytes = [0u8; 2];
    let suffix = match OsRng.try_fill_bytes(&mut bytes) {
        Ok(()) => format!("{:02x}{:02x}", bytes[0], bytes[1]),
        Err(_) => "0000".to_string(),
    };
    format!("{}-{}", now.format("%Y%m%d-%H%M%S"), suffix)
}

/// Creates the log file at the given path, including parent directories.
pub fn create_log_file(path: &Path) -> io::Result<File> {
    if let Some(dir) = path.parent() {
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o755);
        }
        builder.create(dir)?;
    }
    File::create(path)
}
