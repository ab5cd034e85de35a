//! Message sanitation applied at the event-log write boundary.

use regex::{Captures, Regex};
use std::sync::{Arc, OnceLock};

/// Pure transform applied to every event `message` before it is stored.
pub type Sanitizer = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// A run of emoji, emoji modifiers or box-drawing rules, with the spaces
/// around it. Group 1 is the leading run of spaces.
fn decoration_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"([ \t]*)[\p{Extended_Pictographic}\x{FE0F}\x{200D}\x{20E3}\x{2500}-\x{257F}]+[ \t]*",
            )
            .ok()
        })
        .as_ref()
}

/// Remove decorative glyphs.
///
/// Only the spaces next to a removed glyph are touched: a glyph between
/// words leaves one space, one at the start of a line keeps the line's
/// indentation, one at the end of a line leaves nothing. Newlines and all
/// other whitespace are kept as written.
pub fn strip_decorations(message: &str) -> String {
    let Some(re) = decoration_pattern() else {
        return message.to_string();
    };
    re.replace_all(message, |caps: &Captures<'_>| {
        let (start, end) = caps.get(0).map_or((0, 0), |m| (m.start(), m.end()));
        let line_start = start == 0 || message[..start].ends_with('\n');
        let line_end = end == message.len() || message[end..].starts_with(|c| c == '\n' || c == '\r');
        if line_start {
            caps.get(1).map_or("", |m| m.as_str()).to_string()
        } else if line_end {
            String::new()
        } else {
            " ".to_string()
        }
    })
    .into_owned()
}

/// The stock sanitizer wrapped for [`super::EventStore::with_sanitizer`].
pub fn default_sanitizer() -> Sanitizer {
    Arc::new(strip_decorations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_emoji_prefix() {
        assert_eq!(
            strip_decorations("🚨 CRITICAL - High CPU: 95.0%"),
            "CRITICAL - High CPU: 95.0%"
        );
        assert_eq!(strip_decorations("✅ Service cron restarted"), "Service cron restarted");
    }

    #[test]
    fn test_strips_variation_selectors_and_rules() {
        assert_eq!(strip_decorations("⚠️ disk ━━━ low"), "disk low");
    }

    #[test]
    fn test_plain_text_unchanged() {
        let msg = "Service ssh restarted (attempt 2/3), 15.5% memory";
        assert_eq!(strip_decorations(msg), msg);
    }

    #[test]
    fn test_keeps_digits_and_accents() {
        assert_eq!(strip_decorations("Arrêté #3 *"), "Arrêté #3 *");
    }

    #[test]
    fn test_keeps_line_structure() {
        let msg = "Cycle summary:\n  ✅ nginx active\n  ❌ redis  inactive ⚠️\n\tdisk 🔥 91%";
        assert_eq!(
            strip_decorations(msg),
            "Cycle summary:\n  nginx active\n  redis  inactive\n\tdisk 91%"
        );
    }

    #[test]
    fn test_glyph_only_message_becomes_empty() {
        assert_eq!(strip_decorations("🔄 ━━━"), "");
    }
}
