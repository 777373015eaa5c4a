//! UTF-8 safe string preview helpers.
//!
//! Provides small helpers to take the first N Unicode scalar values (chars)
//! from a string without slicing by byte index which can panic on multibyte
//! characters. Chat posts routinely contain emoji, so log previews go
//! through here.

/// Return the first `n` characters of `s` as a `String` (no ellipsis).
pub fn prefix_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Return a preview of `s` up to `n` characters. If `s` is longer than `n`
/// characters, the returned string will include a trailing ellipsis `...`.
pub fn preview(s: &str, n: usize) -> String {
    let mut prefix = prefix_chars(s, n);
    if s.chars().count() > n {
        prefix.push_str("...");
    }
    prefix
}

/// Mask a secret for display, keeping the first four characters.
pub fn mask_secret(secret: &str) -> String {
    if secret.chars().count() <= 4 {
        return "****".to_string();
    }
    format!("{}****", prefix_chars(secret, 4))
}
