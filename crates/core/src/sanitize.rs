//! Normalization and escaping of free-text checkout fields.
//!
//! Every string that ends up on an order passes through one of these
//! functions before it is handed to the order repository. They are pure and
//! never fail; garbage in produces a shorter, harmless string out.

/// Maximum stored length of a customer name, in characters.
pub const MAX_NAME_CHARS: usize = 100;

/// Maximum stored length of a shipping address, in characters.
pub const MAX_ADDRESS_CHARS: usize = 500;

/// Maximum stored length of an email address (RFC 5321).
pub const MAX_EMAIL_CHARS: usize = 254;

/// Maximum stored length of a wallet transaction ID.
pub const MAX_TRANSACTION_ID_CHARS: usize = 32;

/// Drop control characters, collapse whitespace runs to a single space,
/// and trim. This is the unescaped form of [`text`].
#[must_use]
pub fn collapse(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| word.chars().filter(|c| !c.is_control()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize free text and escape it for safe display.
///
/// The input is [`collapse`]d, cut to `max_chars` characters, and the
/// HTML-significant characters `& < > " '` are escaped.
#[must_use]
pub fn text(input: &str, max_chars: usize) -> String {
    let collapsed = collapse(input);

    let mut escaped = String::with_capacity(collapsed.len());
    for ch in collapsed.chars().take(max_chars) {
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

/// Sanitize a customer name.
#[must_use]
pub fn name(input: &str) -> String {
    text(input, MAX_NAME_CHARS)
}

/// Sanitize a shipping address.
#[must_use]
pub fn address(input: &str) -> String {
    text(input, MAX_ADDRESS_CHARS)
}

/// Keep only ASCII digits and a single leading `+`.
#[must_use]
pub fn phone(input: &str) -> String {
    let trimmed = input.trim();
    let mut out = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        out.push('+');
    }
    out.extend(trimmed.chars().filter(char::is_ascii_digit));
    out
}

/// Trim, lowercase, and strip whitespace from an email address.
#[must_use]
pub fn email(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .take(MAX_EMAIL_CHARS)
        .collect::<String>()
        .to_lowercase()
}

/// Keep only ASCII alphanumerics, uppercased.
#[must_use]
pub fn transaction_id(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(MAX_TRANSACTION_ID_CHARS)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
