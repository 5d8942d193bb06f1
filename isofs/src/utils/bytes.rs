//! Bounds-checked field access
//!
//! ISO9660 stores most numbers twice, little-endian followed by big-endian.
//! Only the little-endian half is read.

/// Byte at `offset`
pub fn u8_at(data: &[u8], offset: usize) -> Option<u8> {
    data.get(offset).copied()
}

/// Little-endian 16-bit value at `offset`
pub fn le16_at(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Little-endian 32-bit value at `offset`
pub fn le32_at(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Both-endian 16-bit value (ISO9660 7.2.3) at `offset`
pub fn both16_at(data: &[u8], offset: usize) -> Option<u16> {
    // the big-endian half must at least be present
    data.get(offset..offset.checked_add(4)?)?;
    le16_at(data, offset)
}

/// Both-endian 32-bit value (ISO9660 7.3.3) at `offset`
pub fn both32_at(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset.checked_add(8)?)?;
    le32_at(data, offset)
}

/// `len` bytes starting at `offset`
pub fn slice_at(data: &[u8], offset: usize, len: usize) -> Option<&[u8]> {
    data.get(offset..offset.checked_add(len)?)
}
