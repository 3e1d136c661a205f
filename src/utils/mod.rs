//! Small parsing helpers shared by the modules.

/// Parse the leading base-10 integer of `value`, the way a lenient
/// `parseInt(value, 10)` does: leading whitespace and one sign are accepted,
/// parsing stops at the first non-digit. `None` when no digit leads.
pub fn parse_int_prefix(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return None;
    }

    let magnitude: i64 = rest[..digits_len].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Keep only the ASCII digits of `value`.
pub fn strip_non_digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// `value` without its last character; empty input stays empty.
pub fn drop_last_char(value: &str) -> &str {
    match value.char_indices().last() {
        Some((index, _)) => &value[..index],
        None => value,
    }
}
