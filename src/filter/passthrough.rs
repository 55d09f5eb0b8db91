//! The do-nothing strategy and registry fallback.

use super::{FilterResult, Strategy};

/// Returns output unchanged.
pub struct PassthroughStrategy;

impl Strategy for PassthroughStrategy {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn can_handle(&self, _command: &str, _args: &[String]) -> bool {
        true
    }

    fn reduce(&self, raw: &[u8], _command: &str, _args: &[String], _exit_code: i32) -> FilterResult {
        FilterResult {
            filtered: String::from_utf8_lossy(raw).into_owned(),
            was_reduced: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_and_match() {
        let p = PassthroughStrategy;
        assert_eq!(p.name(), "passthrough");
        assert!(p.can_handle("anything", &[]));
        assert!(p.can_handle("", &[]));
    }

    #[test]
    fn returns_input_unchanged() {
        let p = PassthroughStrategy;

        let result = p.filter(b"hello world\n", "echo", &[], 0);
        assert_eq!(result.filtered, "hello world\n");
        assert!(!result.was_reduced);

        let result = p.filter(b"", "cmd", &[], 0);
        assert_eq!(result.filtered, "");
        assert!(!result.was_reduced);

        // Exit code has no effect.
        let result = p.filter(b"error output", "cmd", &[], 1);
        assert_eq!(result.filtered, "error output");
        assert!(!result.was_reduced);

        let result = p.filter(b"line1\nline2\nline3\n", "cmd", &[], 0);
        assert_eq!(result.filtered, "line1\nline2\nline3\n");
    }
}
