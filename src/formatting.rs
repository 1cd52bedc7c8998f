//! Shared formatting utilities for page rows
//!
//! Column alignment, duration and byte-size formatting, terminal control
//! stripping and JSON pretty-printing used when pages turn API data into rows.

/// Memory size constants (in bytes)
pub mod size {
    pub const KB: u64 = 1024;
    pub const MB: u64 = KB * 1024;
    pub const GB: u64 = MB * 1024;
    pub const TB: u64 = GB * 1024;
}

/// Gap between aligned columns
const COLUMN_GAP: &str = "  ";

/// Truncate a string to a maximum length (in characters), adding "..." at the end if truncated.
///
/// This function is Unicode-safe and counts characters, not bytes.
///
/// # Examples
/// ```
/// use nomon::formatting::truncate_string;
/// assert_eq!(truncate_string("hello", 10), "hello");
/// assert_eq!(truncate_string("hello world", 8), "hello...");
/// assert_eq!(truncate_string("ab", 2), "ab");
/// ```
#[must_use]
pub fn truncate_string(s: &str, max_len: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format duration in verbose human-readable style (e.g., "2d 3h", "5h 30m").
///
/// Shows at most 2 time units for readability.
///
/// # Examples
/// ```
/// use nomon::formatting::format_duration_human;
/// assert_eq!(format_duration_human(0), "0s");
/// assert_eq!(format_duration_human(3660), "1h 1m");
/// assert_eq!(format_duration_human(90000), "1d 1h");
/// ```
#[must_use]
pub fn format_duration_human(seconds: u64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }

    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        if hours > 0 {
            format!("{}d {}h", days, hours)
        } else {
            format!("{}d", days)
        }
    } else if hours > 0 {
        if minutes > 0 {
            format!("{}h {}m", hours, minutes)
        } else {
            format!("{}h", hours)
        }
    } else if minutes > 0 {
        if secs > 0 {
            format!("{}m {}s", minutes, secs)
        } else {
            format!("{}m", minutes)
        }
    } else {
        format!("{}s", secs)
    }
}

/// Format raw bytes to human-readable size.
///
/// # Examples
/// ```
/// use nomon::formatting::format_bytes;
/// assert_eq!(format_bytes(512), "512B");
/// assert_eq!(format_bytes(1536), "1.5K");
/// assert_eq!(format_bytes(1073741824), "1.0G");
/// ```
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    use size::{GB, KB, MB, TB};

    if bytes >= TB {
        format!("{:.1}T", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.1}G", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1}M", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1}K", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// Pad cells so every column lines up, returning the header line and one line per row
///
/// Rows shorter than the header are padded with empty cells. The last column is
/// never padded, so lines carry no trailing whitespace.
#[must_use]
pub fn align_columns(header: &[&str], rows: &[Vec<String>]) -> (String, Vec<String>) {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            match widths.get_mut(i) {
                Some(w) => *w = (*w).max(len),
                None => widths.push(len),
            }
        }
    }

    let header_line = render_line(&widths, header);
    let lines = rows
        .iter()
        .map(|row| {
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            render_line(&widths, &cells)
        })
        .collect();
    (header_line, lines)
}

fn render_line(widths: &[usize], cells: &[&str]) -> String {
    let last = widths.len().saturating_sub(1);
    let mut line = String::new();
    for (i, &width) in widths.iter().enumerate() {
        let cell = cells.get(i).copied().unwrap_or("");
        if i > 0 {
            line.push_str(COLUMN_GAP);
        }
        if i == last {
            line.push_str(cell);
        } else {
            line.push_str(&format!("{cell:<width$}"));
        }
    }
    line.trim_end().to_string()
}

/// Remove ANSI/OSC escape sequences, carriage returns and other control
/// characters except newline and tab
///
/// # Examples
/// ```
/// use nomon::formatting::strip_terminal_controls;
/// assert_eq!(strip_terminal_controls("\x1b[31mred\x1b[0m\r\n"), "red\n");
/// assert_eq!(strip_terminal_controls("\x1b]0;title\x07$ "), "$ ");
/// ```
#[must_use]
pub fn strip_terminal_controls(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.peek() {
                // CSI: parameters and intermediates up to a final byte in @..~
                Some('[') => {
                    chars.next();
                    for c in chars.by_ref() {
                        if ('@'..='~').contains(&c) {
                            break;
                        }
                    }
                }
                // OSC: terminated by BEL or ESC \
                Some(']') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                Some(_) => {
                    chars.next();
                }
                None => {}
            },
            '\n' | '\t' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

/// Byte offset of an escape sequence that `s` ends in the middle of
///
/// Only the text after the last newline is considered, since
/// [`strip_terminal_controls`] is applied line by line.
///
/// # Examples
/// ```
/// use nomon::formatting::unterminated_escape_start;
/// assert_eq!(unterminated_escape_start("ok\x1b[3"), Some(2));
/// assert_eq!(unterminated_escape_start("ok\x1b[31m"), None);
/// ```
#[must_use]
pub fn unterminated_escape_start(s: &str) -> Option<usize> {
    let line_start = s.rfind('\n').map_or(0, |i| i + 1);
    let mut chars = s[line_start..].char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '\x1b' {
            continue;
        }
        let start = line_start + i;
        match chars.next() {
            None => return Some(start),
            Some((_, '[')) => {
                if !chars.by_ref().any(|(_, c)| ('@'..='~').contains(&c)) {
                    return Some(start);
                }
            }
            Some((_, ']')) => {
                let mut terminated = false;
                while let Some((_, c)) = chars.next() {
                    if c == '\x07' {
                        terminated = true;
                        break;
                    }
                    if c == '\x1b' && chars.peek().is_some_and(|&(_, n)| n == '\\') {
                        chars.next();
                        terminated = true;
                        break;
                    }
                }
                if !terminated {
                    return Some(start);
                }
            }
            Some(_) => {}
        }
    }
    None
}

/// Take the longest valid UTF-8 prefix out of `pending`
///
/// An incomplete multi-byte sequence at the end stays buffered for the next
/// chunk. Invalid bytes are replaced.
pub fn take_utf8(pending: &mut Vec<u8>) -> String {
    let valid = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => pending.len(),
    };
    let text = String::from_utf8_lossy(&pending[..valid]).into_owned();
    pending.drain(..valid);
    text
}

/// Pretty-print a JSON document, or return the input unchanged if it is not JSON
#[must_use]
pub fn pretty_json(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("abc", 3), "abc");
        assert_eq!(truncate_string("abcd", 3), "abc");
        assert_eq!(truncate_string("abcdefgh", 6), "abc...");
    }

    #[test]
    fn test_truncate_string_unicode() {
        let long_chinese = "\u{4e2d}\u{6587}\u{6d4b}\u{8bd5}\u{5b57}\u{7b26}";
        assert_eq!(truncate_string(long_chinese, 5), "\u{4e2d}\u{6587}...");
        let emoji = "\u{1F600}\u{1F601}\u{1F602}";
        assert_eq!(truncate_string(emoji, 3), emoji);
    }

    #[test]
    fn test_format_duration_human() {
        assert_eq!(format_duration_human(45), "45s");
        assert_eq!(format_duration_human(65), "1m 5s");
        assert_eq!(format_duration_human(3600), "1h");
        assert_eq!(format_duration_human(86400), "1d");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(1024), "1.0K");
        assert_eq!(format_bytes(1048576), "1.0M");
        assert_eq!(format_bytes(1099511627776), "1.0T");
    }

    #[test]
    fn test_align_columns() {
        let rows = vec![
            vec!["web".to_string(), "service".to_string(), "running".to_string()],
            vec!["batch-nightly".to_string(), "batch".to_string()],
        ];
        let (header, lines) = align_columns(&["ID", "Type", "Status"], &rows);
        assert_eq!(header, "ID             Type     Status");
        assert_eq!(lines[0], "web            service  running");
        assert_eq!(lines[1], "batch-nightly  batch");
    }

    #[test]
    fn test_strip_terminal_controls() {
        assert_eq!(strip_terminal_controls("plain"), "plain");
        assert_eq!(strip_terminal_controls("\x07"), "");
        assert_eq!(strip_terminal_controls("a\x1b[1;32mb\x1b[0mc"), "abc");
        assert_eq!(strip_terminal_controls("\x1b]2;t\x1b\\x"), "x");
        assert_eq!(strip_terminal_controls("tab\there"), "tab\there");
    }

    #[test]
    fn test_unterminated_escape_start() {
        assert_eq!(unterminated_escape_start("plain"), None);
        assert_eq!(unterminated_escape_start("a\x1b"), Some(1));
        assert_eq!(unterminated_escape_start("a\x1b[1;3"), Some(1));
        assert_eq!(unterminated_escape_start("\x1b[0ma\x1b]0;ti"), Some(5));
        assert_eq!(unterminated_escape_start("\x1b]0;t\x1b"), Some(0));
        assert_eq!(unterminated_escape_start("\x1b]0;t\x1b\\"), None);
        assert_eq!(unterminated_escape_start("\x1b]0;t\x07x"), None);
        // earlier lines are already complete
        assert_eq!(unterminated_escape_start("\x1b[3\nab"), None);
        assert_eq!(unterminated_escape_start("ab\n\x1b["), Some(3));
    }

    #[test]
    fn test_take_utf8_keeps_partial_sequence() {
        let snowman = "\u{2603}".as_bytes();
        let mut pending = vec![b'a', snowman[0], snowman[1]];
        assert_eq!(take_utf8(&mut pending), "a");
        assert_eq!(pending.len(), 2);
        pending.push(snowman[2]);
        assert_eq!(take_utf8(&mut pending), "\u{2603}");
        assert!(pending.is_empty());
    }

    #[test]
    fn test_take_utf8_replaces_invalid_bytes() {
        let mut pending = vec![b'a', 0xff, b'b'];
        assert_eq!(take_utf8(&mut pending), "a\u{fffd}b");
        assert!(pending.is_empty());
    }

    #[test]
    fn test_pretty_json() {
        assert_eq!(pretty_json(r#"{"a":1}"#), "{\n  \"a\": 1\n}");
        assert_eq!(pretty_json("not json"), "not json");
    }
}
