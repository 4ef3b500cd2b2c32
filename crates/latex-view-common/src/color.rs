//! CSS-style hex colour strings to packed ARGB values.

use crate::error::ColorError;

/// Parse `#RRGGBB`, `RRGGBB` or `#AARRGGBB` into a packed ARGB `u32`.
///
/// Six digit colours are made fully opaque.
pub fn parse_hex_color(input: &str) -> Result<u32, ColorError> {
    let clean = input.trim().trim_start_matches('#');
    let invalid = || ColorError::Invalid {
        input: input.to_owned(),
    };

    if !clean.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    match clean.len() {
        6 => u32::from_str_radix(clean, 16)
            .map(|rgb| 0xFF00_0000 | rgb)
            .map_err(|_| invalid()),
        8 => u32::from_str_radix(clean, 16).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}
