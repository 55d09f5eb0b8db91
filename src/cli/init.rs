//! Installs or removes the coc PreToolUse hook in Claude Code settings.
//!
//! Settings live at `$HOME/.claude/settings.json`. Both directions are
//! idempotent, preserve unknown keys, and write the file atomically via
//! temp-file + rename.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_json::{json, Map, Value};

/// The hook command entry installed under `hooks.PreToolUse`.
const HOOK_COMMAND: &str = "coc hook";

/// Runs `coc init` or `coc init --uninstall`.
pub fn run(uninstall: bool) -> Result<()> {
    let settings_path = settings_path()?;
    if uninstall {
        uninstall_hook(&settings_path)
    } else {
        install_hook(&settings_path)
    }
}

fn settings_path() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").context("failed to find home directory")?;
    Ok(PathBuf::from(home).join(".claude").join("settings.json"))
}

fn install_hook(settings_path: &Path) -> Result<()> {
    let data = match std::fs::read(settings_path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => b"{}".to_vec(),
        Err(err) => return Err(err).context("failed to read settings.json"),
    };

    let result = add_hook_to_settings(&data)?;

    // Idempotency check: normalize the input through the same pretty-printer
    // and compare canonical forms.
    if let Ok(normalized) = normalize_json(&data) {
        if normalized == result {
            println!("coc hook already installed in ~/.claude/settings.json");
            return Ok(());
        }
    }

    write_settings(settings_path, &result)?;
    println!("coc hook installed in ~/.claude/settings.json");
    Ok(())
}

fn uninstall_hook(settings_path: &Path) -> Result<()> {
    let data = match std::fs::read(settings_path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            println!("coc hook not found, nothing to remove");
            return Ok(());
        }
        Err(err) => return Err(err).context("failed to read settings.json"),
    };

    let (result, removed) = remove_hook_from_settings(&data)?;

    if !removed {
        println!("coc hook not found, nothing to remove");
        return Ok(());
    }

    write_settings(settings_path, &result)?;
    println!("coc hook removed from ~/.claude/settings.json");
    Ok(())
}

/// Re-serializes JSON into the canonical pretty-printed form used by
/// [`add_hook_to_settings`], for byte-for-byte comparison.
fn normalize_json(data: &[u8]) -> Result<String> {
    let value: Value = serde_json::from_slice(data)?;
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Atomically writes settings via temp-file + rename, with a trailing newline.
fn write_settings(path: &Path, data: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).context("failed to create directory")?;
    }

    let mut contents = data.to_string();
    if !contents.ends_with('\n') {
        contents.push('\n');
    }

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &contents).context("failed to write temp settings")?;
    if let Err(err) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(err).context("failed to update settings");
    }
    Ok(())
}

/// Returns true when the entry is a `{"type": "command", "command": "coc hook"}` hook.
fn is_coc_hook(entry: &Value) -> bool {
    entry.get("type").and_then(Value::as_str) == Some("command")
        && entry.get("command").and_then(Value::as_str) == Some(HOOK_COMMAND)
}

/// Adds the coc hook to the settings JSON if not already present. Pure, for
/// testability; unknown top-level keys pass through untouched.
pub(crate) fn add_hook_to_settings(input: &[u8]) -> Result<String> {
    if input.is_empty() {
        bail!("empty input");
    }

    let mut settings: Map<String, Value> =
        serde_json::from_slice(input).context("failed to parse JSON")?;

    let hooks = settings
        .entry("hooks".to_string())
        .or_insert_with(|| json!({}));
    let Some(hooks_map) = hooks.as_object_mut() else {
        bail!("hooks is not an object");
    };

    let pre_tool_use = hooks_map
        .entry("PreToolUse".to_string())
        .or_insert_with(|| json!([]));
    let Some(entries) = pre_tool_use.as_array_mut() else {
        bail!("hooks.PreToolUse is not an array");
    };

    let already_installed = entries.iter().any(|entry| {
        entry.get("matcher").and_then(Value::as_str) == Some("Bash")
            && entry
                .get("hooks")
                .and_then(Value::as_array)
                .is_some_and(|hooks| hooks.iter().any(is_coc_hook))
    });

    if !already_installed {
        entries.push(json!({
            "matcher": "Bash",
            "hooks": [{ "type": "command", "command": HOOK_COMMAND }],
        }));
    }

    Ok(serde_json::to_string_pretty(&Value::Object(settings))?)
}

/// Removes the coc hook from the settings JSON if present. Returns the
/// updated JSON and whether anything was removed. Pure, for testability.
pub(crate) fn remove_hook_from_settings(input: &[u8]) -> Result<(String, bool)> {
    if input.is_empty() {
        bail!("empty input");
    }

    let mut settings: Map<String, Value> =
        serde_json::from_slice(input).context("failed to parse JSON")?;

    let has_entries = settings
        .get("hooks")
        .and_then(|hooks| hooks.get("PreToolUse"))
        .and_then(Value::as_array)
        .is_some();
    if !has_entries {
        return Ok((serde_json::to_string_pretty(&Value::Object(settings))?, false));
    }

    let mut found = false;

    if let Some(entries) = settings
        .get_mut("hooks")
        .and_then(|hooks| hooks.get_mut("PreToolUse"))
        .and_then(Value::as_array_mut)
    {
        let mut new_entries: Vec<Value> = Vec::new();

        for mut entry in entries.drain(..) {
            let is_bash = entry.get("matcher").and_then(Value::as_str) == Some("Bash");
            if is_bash {
                if let Some(hooks) = entry.get_mut("hooks").and_then(Value::as_array_mut) {
                    let before = hooks.len();
                    hooks.retain(|hook| !is_coc_hook(hook));
                    if hooks.len() < before {
                        found = true;
                    }
                    // Drop the matcher entry once its hooks array empties.
                    if hooks.is_empty() {
                        continue;
                    }
                }
            }
            new_entries.push(entry);
        }

        *entries = new_entries;
    }

    Ok((serde_json::to_string_pretty(&Value::Object(settings))?, found))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(json: &str) -> Value {
        serde_json::from_str(json).unwrap()
    }

    fn has_coc_hook(settings: &Value) -> bool {
        settings["hooks"]["PreToolUse"]
            .as_array()
            .is_some_and(|entries| {
                entries.iter().any(|entry| {
                    entry["matcher"] == "Bash"
                        && entry["hooks"]
                            .as_array()
                            .is_some_and(|hooks| hooks.iter().any(is_coc_hook))
                })
            })
    }

    #[test]
    fn add_to_empty_settings() {
        let result = add_hook_to_settings(b"{}").unwrap();
        let settings = parsed(&result);
        assert!(has_coc_hook(&settings));
    }

    #[test]
    fn add_preserves_unknown_keys() {
        let input = br#"{"model": "opus", "env": {"FOO": "bar"}, "hooks": {"PostToolUse": []}}"#;
        let result = add_hook_to_settings(input).unwrap();
        let settings = parsed(&result);

        assert!(has_coc_hook(&settings));
        assert_eq!(settings["model"], "opus");
        assert_eq!(settings["env"]["FOO"], "bar");
        assert!(settings["hooks"]["PostToolUse"].is_array());
    }

    #[test]
    fn add_is_idempotent() {
        let once = add_hook_to_settings(b"{}").unwrap();
        let twice = add_hook_to_settings(once.as_bytes()).unwrap();
        assert_eq!(once, twice);

        let settings = parsed(&twice);
        assert_eq!(settings["hooks"]["PreToolUse"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn add_keeps_other_bash_hooks() {
        let input = br#"{
            "hooks": {
                "PreToolUse": [
                    {"matcher": "Bash", "hooks": [{"type": "command", "command": "other hook"}]}
                ]
            }
        }"#;
        let result = add_hook_to_settings(input).unwrap();
        let settings = parsed(&result);

        assert!(has_coc_hook(&settings));
        assert!(result.contains("other hook"));
    }

    #[test]
    fn add_rejects_bad_input() {
        assert!(add_hook_to_settings(b"").is_err());
        assert!(add_hook_to_settings(b"not json").is_err());
    }

    #[test]
    fn remove_round_trip() {
        let installed = add_hook_to_settings(b"{}").unwrap();
        let (removed, found) = remove_hook_from_settings(installed.as_bytes()).unwrap();

        assert!(found);
        let settings = parsed(&removed);
        assert!(!has_coc_hook(&settings));
        // The emptied matcher entry disappears entirely.
        assert_eq!(settings["hooks"]["PreToolUse"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn remove_when_absent_reports_not_found() {
        let (_, found) = remove_hook_from_settings(b"{}").unwrap();
        assert!(!found);

        let (_, found) =
            remove_hook_from_settings(br#"{"hooks": {"PreToolUse": []}}"#).unwrap();
        assert!(!found);
    }

    #[test]
    fn remove_keeps_other_hooks_in_the_same_matcher() {
        let input = br#"{
            "hooks": {
                "PreToolUse": [
                    {"matcher": "Bash", "hooks": [
                        {"type": "command", "command": "coc hook"},
                        {"type": "command", "command": "other hook"}
                    ]}
                ]
            }
        }"#;
        let (result, found) = remove_hook_from_settings(input).unwrap();

        assert!(found);
        assert!(result.contains("other hook"));
        let settings = parsed(&result);
        assert_eq!(settings["hooks"]["PreToolUse"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn remove_preserves_unknown_keys() {
        let installed =
            add_hook_to_settings(br#"{"model": "opus", "permissions": {"allow": ["Bash"]}}"#)
                .unwrap();
        let (result, found) = remove_hook_from_settings(installed.as_bytes()).unwrap();

        assert!(found);
        let settings = parsed(&result);
        assert_eq!(settings["model"], "opus");
        assert_eq!(settings["permissions"]["allow"][0], "Bash");
    }

    #[test]
    fn write_settings_is_atomic_and_newline_terminated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".claude").join("settings.json");

        write_settings(&path, "{\n  \"a\": 1\n}").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with("}\n"));
        assert!(!path.with_extension("json.tmp").exists());
    }
}
