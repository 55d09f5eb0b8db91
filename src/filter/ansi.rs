//! ANSI escape sequence removal.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches ANSI escape sequences: CSI, OSC (BEL or ST terminated), charset
/// designation, and keypad mode toggles.
static ANSI_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-9;:?]*[a-zA-Z]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[()][AB012]|\x1b[=>]")
        .unwrap()
});

/// Removes ANSI escape sequences from a string. Pure and total; all other
/// bytes pass through untouched.
pub fn strip_ansi(s: &str) -> Cow<'_, str> {
    ANSI_PATTERN.replace_all(s, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_sequences() {
        let cases = &[
            ("hello world", "hello world"),
            ("\x1b[1mhello\x1b[0m", "hello"),
            ("\x1b[31mred\x1b[0m", "red"),
            ("\x1b[38;5;123mcolored\x1b[0m", "colored"),
            ("\x1b[38;2;255;128;0mtrue\x1b[0m", "true"),
            ("\x1b[?25h", ""),
            ("\x1b[?25l", ""),
            ("\x1b[?1049h", ""),
            ("\x1b[?2004l", ""),
            ("\x1b]0;title\x07text", "text"),
            ("\x1b]0;title\x1b\\text", "text"),
            ("\x1b(B", ""),
            ("\x1b(0", ""),
            ("\x1b)A", ""),
            ("\x1b=", ""),
            ("\x1b>", ""),
            ("line1\n\x1b[32mgreen\x1b[0m\nline3", "line1\ngreen\nline3"),
            ("", ""),
            ("\x1b[1m\x1b[31m\x1b[0m", ""),
            ("\x1b[10;20H", ""),
            ("\x1b[2K", ""),
            ("\x1b[3S", ""),
            ("\x1b[m", ""),
            ("\x1b[1;31;42mbold red on green\x1b[0m", "bold red on green"),
        ];
        for (input, want) in cases {
            assert_eq!(strip_ansi(input), *want, "strip_ansi({input:?})");
        }
    }

    #[test]
    fn preserves_plain_text() {
        let inputs = &[
            "hello world",
            "path/to/file.rs:42",
            "fn main() { println!(\"hi\") }",
            "error: something went wrong!",
            "tab\there",
            "newline\nhere",
            "   indented   ",
            "special chars: @#$%^&*()",
        ];
        for input in inputs {
            assert_eq!(strip_ansi(input), *input);
        }
    }

    #[test]
    fn idempotent() {
        let input = "\x1b[31mred\x1b[0m plain \x1b]0;t\x07tail";
        let once = strip_ansi(input).into_owned();
        let twice = strip_ansi(&once).into_owned();
        assert_eq!(once, twice);
    }
}
