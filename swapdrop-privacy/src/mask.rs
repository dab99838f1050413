//! Partial masking of contact values.

use swapdrop_core::constants::{MASK_CHAR, MASK_VISIBLE_CHARS};

/// Masks a contact value, keeping the first and last two characters.
///
/// Values too short to keep anything hidden are masked entirely.
///
/// ```rust,ignore
/// assert_eq!(mask_contact("+33612345678"), "+3********78");
/// ```
pub fn mask_contact(value: &str) -> String {
    let chars: Vec<char> = value.trim().chars().collect();
    let len = chars.len();

    if len <= MASK_VISIBLE_CHARS * 2 {
        return MASK_CHAR.to_string().repeat(len);
    }

    chars
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i < MASK_VISIBLE_CHARS || i >= len - MASK_VISIBLE_CHARS {
                *c
            } else {
                MASK_CHAR
            }
        })
        .collect()
}
