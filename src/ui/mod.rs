pub mod app;

use crate::input::hotkey::HOTKEY_LABEL;

/// Cross-thread updates for the settings window. Producers live on the
/// hotkey, session and worker threads; the egui update loop is the only
/// consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiMessage {
    /// Replace the status line.
    Status(String),
    /// Usage counters changed on disk.
    StatsChanged { daily_calls: u64, total_calls: u64 },
    /// Recording started or stopped (drives the window indicator).
    Recording(bool),
}

/// The idle status line, naming the binding so the user knows what to press.
#[must_use]
pub fn ready_status() -> String {
    format!("Ready ({HOTKEY_LABEL})")
}

/// Truncate to at most `max` characters on a char boundary, appending an
/// ellipsis when anything was cut.
#[must_use]
pub fn truncate_status(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_status_names_hotkey() {
        assert!(ready_status().contains("Ctrl+Alt+D"));
    }

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate_status("ok", 10), "ok");
    }

    #[test]
    fn test_truncate_long_text() {
        let out = truncate_status("abcdefghij", 5);
        assert_eq!(out, "abcde…");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let out = truncate_status("héllo wörld", 6);
        assert_eq!(out, "héllo …");
    }
}
