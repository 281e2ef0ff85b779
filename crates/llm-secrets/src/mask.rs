//! Value masking - the output that is safe to show an LLM.
//!
//! A mask reveals at most `visible_chars` characters at each end. The run of
//! asterisks in the middle is capped, so a long secret's length is not
//! recoverable from its mask.

/// Characters shown at each end unless the caller asks otherwise
pub const DEFAULT_VISIBLE_CHARS: usize = 4;

/// Upper bound on the asterisks standing in for the hidden middle
pub const MAX_MASKED_MIDDLE: usize = 8;

/// Rendered in place of an empty value
pub const EMPTY_MASK: &str = "(empty)";

/// Mask a secret value, e.g. `sk-1234567890abcdef` -> `sk-1********cdef`.
///
/// Values of `2 * visible_chars` characters or fewer are masked entirely.
/// Lengths are counted in characters, so multi-byte text is never split.
pub fn mask(value: &str, visible_chars: usize) -> String {
    if value.is_empty() {
        return EMPTY_MASK.to_string();
    }

    let len = value.chars().count();
    let shown = visible_chars.saturating_mul(2);
    if len <= shown {
        return "*".repeat(len);
    }

    let hidden = (len - shown).min(MAX_MASKED_MIDDLE);
    let mut masked = String::with_capacity(shown * 4 + hidden);
    masked.extend(value.chars().take(visible_chars));
    masked.extend(std::iter::repeat('*').take(hidden));
    masked.extend(value.chars().skip(len - visible_chars));
    masked
}
