//! Utility functions for reply text: Telegram-safe HTML, splitting and truncation.
//!
//! Patterns are declared with `lazy-regex`, so they are validated at compile time
//! and built on first use.

#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;
use unicode_segmentation::UnicodeSegmentation;

/// Escaped opening tag from the Telegram whitelist, optionally with attributes.
static RE_ESCAPED_OPEN_TAG: lazy_regex::Lazy<lazy_regex::Regex> =
    lazy_regex!(r"(?i)&lt;(b|i|code|pre|u|s|a)(\s[^&]*?)?&gt;");

/// Escaped closing tag from the Telegram whitelist.
static RE_ESCAPED_CLOSE_TAG: lazy_regex::Lazy<lazy_regex::Regex> =
    lazy_regex!(r"(?i)&lt;/(b|i|code|pre|u|s|a)&gt;");

/// Escapes all HTML in `text` and then restores the tags Telegram understands
/// (`b`, `i`, `code`, `pre`, `u`, `s`, `a`).
///
/// # Examples
///
/// ```
/// use opensloth_core::utils::sanitize_html;
/// let input = "Total <b>3 < 5</b> & <script>x</script>";
/// assert_eq!(
///     sanitize_html(input),
///     "Total <b>3 &lt; 5</b> &amp; &lt;script&gt;x&lt;/script&gt;"
/// );
/// ```
#[must_use]
pub fn sanitize_html(text: &str) -> String {
    let escaped = html_escape::encode_text(text);
    let opened = RE_ESCAPED_OPEN_TAG.replace_all(&escaped, "<${1}${2}>");
    RE_ESCAPED_CLOSE_TAG
        .replace_all(&opened, "</${1}>")
        .into_owned()
}

/// Splits a long message into parts no longer than `max_length` bytes.
///
/// Lines are kept whole where possible. An unterminated `<pre>` block is closed
/// at the end of a part and reopened at the start of the next one, so each part
/// stays valid Telegram HTML.
///
/// # Examples
///
/// ```
/// use opensloth_core::utils::split_long_message;
/// let long_msg = "A very long message...\n".repeat(300);
/// let parts = split_long_message(&long_msg, 4000);
/// assert!(parts.len() > 1);
/// ```
#[must_use]
pub fn split_long_message(message: &str, max_length: usize) -> Vec<String> {
    const PRE_OPEN: &str = "<pre>";
    const PRE_CLOSE: &str = "</pre>";

    if message.is_empty() {
        return Vec::new();
    }

    if message.len() <= max_length {
        return vec![message.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_pre = false;

    let flush = |current: &mut String, parts: &mut Vec<String>, in_pre: bool| {
        if current.is_empty() {
            return;
        }
        if in_pre {
            current.push_str(PRE_CLOSE);
        }
        parts.push(current.trim_end().to_string());
        current.clear();
        if in_pre {
            current.push_str(PRE_OPEN);
        }
    };

    for line in message.lines() {
        if line.len() > max_length {
            flush(&mut current, &mut parts, in_pre);

            let mut chunk = String::new();
            for grapheme in line.graphemes(true) {
                if chunk.len() + grapheme.len() > max_length {
                    parts.push(chunk.trim_end().to_string());
                    chunk.clear();
                }
                chunk.push_str(grapheme);
            }
            if !chunk.is_empty() {
                current.push_str(&chunk);
                current.push('\n');
            }
            continue;
        }

        // +1 for newline, plus room for a closing tag when inside <pre>
        let reserve = if in_pre && !line.contains(PRE_CLOSE) {
            PRE_CLOSE.len()
        } else {
            0
        };
        if current.len() + line.len() + 1 + reserve > max_length {
            flush(&mut current, &mut parts, in_pre);
        }

        let opens = line.matches(PRE_OPEN).count();
        let closes = line.matches(PRE_CLOSE).count();
        if opens != closes {
            in_pre = opens > closes;
        }

        current.push_str(line);
        current.push('\n');
    }

    if !current.trim().is_empty() && current.trim() != PRE_OPEN {
        if in_pre {
            current.push_str(PRE_CLOSE);
        }
        parts.push(current.trim_end().to_string());
    }

    parts
}

/// Safely truncates a string to a maximum character length (not bytes).
///
/// # Examples
///
/// ```
/// use opensloth_core::utils::truncate_str;
/// let s = "Привет, мир!";
/// assert_eq!(truncate_str(s, 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_unicode() {
        let s = "Привет, мир!";
        assert_eq!(truncate_str(s, 6), "Привет");
        assert_eq!(truncate_str(s, 50), "Привет, мир!");
    }

    #[test]
    fn test_sanitize_keeps_whitelisted_tags() {
        let input = "<b>Name</b>: <i>x</i> <code>id</code> <u>u</u> <s>s</s>";
        assert_eq!(sanitize_html(input), input);
    }

    #[test]
    fn test_sanitize_keeps_link_attributes() {
        let input = r#"<a href="https://docs.google.com/spreadsheets/d/abc">Sheet</a>"#;
        assert_eq!(sanitize_html(input), input);
    }

    #[test]
    fn test_sanitize_escapes_unknown_tags() {
        assert_eq!(
            sanitize_html("<br> and <div>block</div>"),
            "&lt;br&gt; and &lt;div&gt;block&lt;/div&gt;"
        );
    }

    #[test]
    fn test_sanitize_is_case_insensitive() {
        assert_eq!(sanitize_html("<B>loud</B>"), "<B>loud</B>");
    }

    #[test]
    fn test_sanitize_escapes_bare_comparisons() {
        assert_eq!(sanitize_html("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
    }

    #[test]
    fn test_split_long_message_simple() {
        let input = "Line 1\nLine 2\nLine 3";
        // "Line 1\n" is 7 bytes, two lines would need 14
        let parts = split_long_message(input, 13);
        assert_eq!(parts, vec!["Line 1", "Line 2", "Line 3"]);
    }

    #[test]
    fn test_split_reopens_pre_blocks() {
        let input = "Start\n<pre>\nrow 1\nrow 2\nrow 3\n</pre>\nEnd";
        let parts = split_long_message(input, 24);

        assert!(parts.len() > 1);
        assert!(parts[0].ends_with("</pre>"));
        assert!(parts[1].starts_with("<pre>"));
        for part in &parts {
            assert!(part.len() <= 24, "part too long: {part:?}");
        }
    }

    #[test]
    fn test_split_very_long_line() {
        let input = "a".repeat(10000);
        let parts = split_long_message(&input, 4000);

        assert!(parts.len() >= 3);
        for part in &parts {
            assert!(part.len() <= 4000);
        }
        let concatenated: String = parts.join("");
        assert_eq!(concatenated.len(), input.len());
    }

    #[test]
    fn test_split_unicode_graphemes() {
        let input = "🔥".repeat(5000);
        let parts = split_long_message(&input, 4000);

        assert!(parts.len() >= 3);
        for part in &parts {
            assert!(part.len() <= 4000);
            assert!(part.chars().all(|c| c == '🔥'));
        }
    }

    #[test]
    fn test_split_short_message_untouched() {
        assert_eq!(split_long_message("hi", 10), vec!["hi"]);
        assert!(split_long_message("", 10).is_empty());
    }
}
