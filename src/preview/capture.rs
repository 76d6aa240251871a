use std::sync::OnceLock;

use regex::Regex;

use crate::error::Result;
use crate::tmux::TmuxManager;

/// Shown when a capture has no visible text.
pub const EMPTY_PREVIEW: &str = "(no output yet)";

fn ansi_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // CSI, OSC ended by BEL or ST, charset selection, keypad mode and
        // cursor save/restore.
        Regex::new(
            r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[()][0-9A-Za-z]|\x1b[=>78]",
        )
        .expect("valid ANSI regex")
    })
}

/// Strip ANSI escape codes from text
pub fn strip_ansi(text: &str) -> String {
    ansi_regex().replace_all(text, "").into_owned()
}

/// Drop carriage returns and escape codes, then surrounding blank lines.
pub fn clean_preview(raw: &str) -> String {
    let text = strip_ansi(&raw.replace('\r', ""));
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end]
            .iter()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => EMPTY_PREVIEW.to_string(),
    }
}

/// Point-in-time text of `session`, ready to display.
pub async fn capture_preview(tmux: &TmuxManager, session: &str) -> Result<String> {
    let raw = tmux.capture_pane(session).await?;
    Ok(clean_preview(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1;32mok\x1b[0m done"), "ok done");
        assert_eq!(strip_ansi("\x1b[?25lhidden\x1b[?25h"), "hidden");
        assert_eq!(strip_ansi("\x1b]0;title\x07prompt$"), "prompt$");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn test_strip_ansi_two_byte_escapes() {
        assert_eq!(strip_ansi("\x1b(Bok\x1b)0"), "ok");
        assert_eq!(strip_ansi("\x1b=vim\x1b>"), "vim");
        assert_eq!(strip_ansi("\x1b7saved\x1b8"), "saved");
        assert_eq!(
            clean_preview("\x1b(B\x1b[m$ ls\r\n\x1b7src\x1b8\n"),
            "$ ls\nsrc"
        );
    }

    #[test]
    fn test_clean_preview_trims_blank_edges() {
        let raw = "\n\r\n  \n$ cargo test\r\n\x1b[32mok\x1b[0m   \n\n\n";
        assert_eq!(clean_preview(raw), "$ cargo test\nok");
    }

    #[test]
    fn test_clean_preview_keeps_inner_blank_lines() {
        assert_eq!(clean_preview("a\n\nb\n"), "a\n\nb");
    }

    #[test]
    fn test_clean_preview_empty() {
        assert_eq!(clean_preview(""), EMPTY_PREVIEW);
        assert_eq!(clean_preview("\n \r\n\x1b[0m\n"), EMPTY_PREVIEW);
    }
}
