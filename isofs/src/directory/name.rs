//! File identifier fixups
//!
//! Plain ISO9660 identifiers look like `README.TXT;1`; they are cut at the
//! version separator, lose a dangling `.` and are lowercased. Joliet
//! identifiers are UCS-2BE and are transliterated to UTF-8.

use crate::utils::string::decode_ucs2be;

/// Readable name for a plain ISO9660 identifier
pub fn iso_name(raw: &[u8]) -> String {
    let raw = raw.split(|&b| b == 0).next().unwrap_or_default();
    let mut name = match raw.iter().position(|&b| b == b';') {
        Some(pos) => &raw[..pos],
        None => raw,
    };
    if let Some(stripped) = name.strip_suffix(b".") {
        name = stripped;
    }

    let fixed: Vec<u8> = name
        .iter()
        .map(|&b| match b {
            b';' | b'/' => b'.',
            _ => b.to_ascii_lowercase(),
        })
        .collect();
    String::from_utf8_lossy(&fixed).into_owned()
}

/// Readable name for a Joliet identifier
///
/// Code units that do not decode are dropped.
pub fn joliet_name(raw: &[u8]) -> String {
    let mut name = decode_ucs2be(raw);
    if name.len() > 2 && name.ends_with(";1") {
        name.truncate(name.len() - 2);
    }
    if name.len() >= 2 && name.ends_with('.') {
        name.pop();
    }
    name
}

/// Decode an identifier according to the volume's Joliet level
pub fn decode_name(raw: &[u8], joliet_level: u8) -> String {
    if joliet_level > 0 {
        joliet_name(raw)
    } else {
        iso_name(raw)
    }
}

/// Can `name` be used as a single path component?
pub fn is_valid_component(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(|c: char| c == '/' || c == '\0')
}
