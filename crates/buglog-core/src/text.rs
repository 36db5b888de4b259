//! Text safety checks shared by operation and identity validation.
//!
//! Titles, labels, names and metadata are rendered on a single line by every
//! consumer, so they must not carry line breaks or other control characters.
//! Messages may span lines but still reject the remaining control characters.

/// Maximum size of a multi-line message (comment body, create message).
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Maximum size of a single-line field (title, label, name, metadata value).
pub const MAX_LINE_BYTES: usize = 1024;

/// True if the text is empty or only made of whitespace.
#[must_use]
pub fn is_empty(s: &str) -> bool {
    s.trim().is_empty()
}

/// True if the text is safe to render as a multi-line block.
///
/// Line feeds, carriage returns and tabs are allowed; every other control
/// character is rejected.
#[must_use]
pub fn is_safe(s: &str) -> bool {
    s.len() <= MAX_MESSAGE_BYTES
        && s
            .chars()
            .all(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
}

/// True if the text is safe to render on a single line.
#[must_use]
pub fn is_safe_one_line(s: &str) -> bool {
    s.len() <= MAX_LINE_BYTES && !s.chars().any(char::is_control)
}

/// True if the text is a plausible avatar URL.
#[must_use]
pub fn is_safe_url(s: &str) -> bool {
    let rest = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"));
    rest.is_some_and(|r| !r.is_empty() && !r.chars().any(|c| c.is_whitespace()))
        && is_safe_one_line(s)
}
