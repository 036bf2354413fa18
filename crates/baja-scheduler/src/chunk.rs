//! Splits a headed summary into posts that each fit the platform limit.

pub use baja_core::types::MAX_MESSAGE_LEN;

/// Prefix on every post after the first.
pub const CONTINUATION_PREFIX: &str = "Summary (continued):\n\n";

/// Build the posts for `header` + `body`, each at most `max_len` characters.
///
/// The first post is `header\n\n<part>`; later posts carry
/// [`CONTINUATION_PREFIX`]. Cuts prefer the last paragraph break, then the
/// last line break, then a hard cut. A header too long to leave room for
/// any body is returned alone, truncated to `max_len`.
pub fn build_summary_messages(header: &str, body: &str, max_len: usize) -> Vec<String> {
    let header = header.trim();
    let body = body.trim();

    let first_prefix = format!("{header}\n\n");
    let prefix_len = first_prefix.chars().count();
    if prefix_len >= max_len {
        return vec![header.chars().take(max_len).collect()];
    }

    let (first, mut remaining) = take_text_chunk(body, max_len - prefix_len);
    let mut messages = vec![format!("{first_prefix}{first}")];

    let cont_max = max_len.saturating_sub(CONTINUATION_PREFIX.chars().count());
    while !remaining.is_empty() && cont_max > 0 {
        let (chunk, rest) = take_text_chunk(remaining, cont_max);
        messages.push(format!("{CONTINUATION_PREFIX}{chunk}"));
        remaining = rest;
    }

    messages
}

/// Take at most `max_chars` characters from the front of `text`.
///
/// Returns the chunk (trailing whitespace trimmed) and the remainder
/// (leading whitespace trimmed).
fn take_text_chunk(text: &str, max_chars: usize) -> (&str, &str) {
    let limit = match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => byte_idx,
        None => return (text, ""),
    };

    let window = &text[..limit];
    let split_at = window
        .rfind("\n\n")
        .or_else(|| window.rfind('\n'))
        .filter(|&idx| idx > 0)
        .unwrap_or(limit);

    (text[..split_at].trim_end(), text[split_at..].trim_start())
}
