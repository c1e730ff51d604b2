//! Plate text normalization
//!
//! Raw user input is folded into the canonical form used for storage,
//! comparison and remote lookups: uppercase `[A-Z0-9]`, letter `O` written as
//! digit `0`, at most [`MAX_PLATE_LEN`] characters.

use crate::{Error, Result};

/// Longest plate text any supported jurisdiction issues
pub const MAX_PLATE_LEN: usize = 7;

/// Canonicalize raw plate text
///
/// Total and idempotent: `normalize(&normalize(s)) == normalize(s)` for every `s`.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_uppercase)
        .map(|c| if c == 'O' { '0' } else { c })
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .take(MAX_PLATE_LEN)
        .collect()
}

/// Normalize submitted plate text, rejecting input with nothing usable in it
pub fn validate_plate_text(raw: &str) -> Result<String> {
    let text = normalize(raw);
    if text.is_empty() {
        return Err(Error::Validation(format!(
            "plate text must be 1-{} letters/numbers (got {:?})",
            MAX_PLATE_LEN, raw
        )));
    }
    Ok(text)
}

/// True if `text` is already in canonical form
pub fn is_canonical(text: &str) -> bool {
    !text.is_empty() && normalize(text) == text
}
