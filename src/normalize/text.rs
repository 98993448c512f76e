/// Default maximum number of characters kept from a log message
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 1000;

const TRUNCATION_MARKER: &str = "... (truncated)";
const EMPTY_MESSAGE: &str = "No log content available";

/// Prepare a raw log message for display
///
/// Keeps at most `max_length` characters (counted as chars, never splitting a
/// UTF-8 sequence), appends a truncation marker when anything was cut, then
/// escapes HTML metacharacters.
pub fn sanitize_log_message(content: &str, max_length: usize) -> String {
    if content.is_empty() {
        return EMPTY_MESSAGE.to_string();
    }

    let truncated = match content.char_indices().nth(max_length) {
        Some((cut, _)) => format!("{}{}", &content[..cut], TRUNCATION_MARKER),
        None => content.to_string(),
    };

    escape_html(&truncated)
}

/// Escape the characters that are significant in HTML text and attributes
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Render a byte count with a binary unit suffix, e.g. `1.50 KB`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{:.2} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.2} PB", value)
}
