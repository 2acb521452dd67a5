//! Ticket text layout and payload cleaning.
//!
//! Ticket text is laid out in three columns against a fixed
//! characters-per-line budget: left text first, center text centered in
//! the space that remains (clamped to non-negative), right text aligned
//! against the remaining tail. Content never wraps: a column that
//! exceeds its budget is truncated.
//!
//! Before a ticket payload is interpreted as structured text it passes
//! through [`escape_control_chars`]: raw payloads routinely carry control
//! bytes that structured text cannot, and the escape step changes only
//! encodability, never content, and every escape is reversible.

/// Lay out one line of left/center/right text within `width` characters.
pub fn compose_line(left: &str, center: &str, right: &str, width: usize) -> String {
    let mut line: Vec<char> = vec![' '; width];

    // Left column claims the line start.
    let left_chars = truncate_chars(left, width);
    line[..left_chars.len()].copy_from_slice(&left_chars);

    // Center is centered within what the left column left over; an empty
    // center claims no padding.
    let remaining = width - left_chars.len();
    let center_chars = truncate_chars(center, remaining);
    let pad = if center_chars.is_empty() {
        0
    } else {
        (remaining - center_chars.len()) / 2
    };
    let center_start = left_chars.len() + pad;
    line[center_start..center_start + center_chars.len()].copy_from_slice(&center_chars);

    // Right is aligned against the remaining tail.
    let tail = width - (center_start + center_chars.len());
    let right_chars = truncate_chars(right, tail);
    let right_start = width - right_chars.len();
    line[right_start..].copy_from_slice(&right_chars);

    line.into_iter().collect()
}

/// Lay out three text lists into lines; the line count is the longest
/// list, missing entries read as empty.
pub fn compose_lines(
    left: &[String],
    center: &[String],
    right: &[String],
    width: usize,
) -> Vec<String> {
    let count = left.len().max(center.len()).max(right.len());
    (0..count)
        .map(|i| {
            compose_line(
                left.get(i).map_or("", |s| s.as_str()),
                center.get(i).map_or("", |s| s.as_str()),
                right.get(i).map_or("", |s| s.as_str()),
                width,
            )
        })
        .collect()
}

fn truncate_chars(text: &str, budget: usize) -> Vec<char> {
    text.chars().take(budget).collect()
}

/// Escape control characters (and the escape introducer itself) so the
/// payload is valid structured text.
///
/// `&` becomes `&amp;` and every control character becomes `&#xNN;`.
/// The transformation is injective, so the original payload is always
/// recoverable; data content is untouched.
pub fn escape_control_chars(payload: &str) -> String {
    let mut escaped = String::with_capacity(payload.len());
    for c in payload.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            c if c.is_control() => {
                escaped.push_str(&format!("&#x{:02X};", c as u32));
            }
            c => escaped.push(c),
        }
    }
    escaped
}
