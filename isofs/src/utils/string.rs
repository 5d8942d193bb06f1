//! String handling utilities
//!
//! ISO9660 identifiers are fixed-width fields padded with spaces (or, with
//! some mastering tools, NULs).

/// Trim trailing padding (space, NUL, tab, CR, LF) from a byte slice
pub fn trim_trailing_padding(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| !matches!(b, b' ' | 0 | b'\t' | b'\r' | b'\n'))
        .map_or(0, |pos| pos + 1);
    &bytes[..end]
}

/// Convert a fixed-width a-/d-character identifier to a string
pub fn identifier_to_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(trim_trailing_padding(bytes)).into_owned()
}

/// Convert a UCS-2BE identifier (Joliet descriptors) to a string
pub fn ucs2_identifier_to_string(bytes: &[u8]) -> String {
    let decoded = decode_ucs2be(bytes);
    decoded
        .trim_end_matches(|c: char| c == ' ' || c == '\0')
        .to_string()
}

/// Decode big-endian UCS-2, dropping unpaired surrogates and a trailing odd byte
pub fn decode_ucs2be(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    char::decode_utf16(units).filter_map(|c| c.ok()).collect()
}
