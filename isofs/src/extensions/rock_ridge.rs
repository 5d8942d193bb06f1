//! Rock Ridge extension support
//!
//! Rock Ridge adds POSIX filesystem semantics (permissions, symlinks, long names).
//! Entries are decoded one system use span at a time; continuation areas and
//! relocated directories found in a span are handed back to the caller,
//! which fetches them and feeds them in as further spans.

use super::susp::{signatures, ContinuationArea, Entries, SuspEntry, SuspState, SP_MAGIC};
use crate::error::{IsoFsError, Result};
use crate::types::{NAME_MAX, PATH_MAX, VOLUME_DESCRIPTOR_START};
use crate::utils::bytes::{both32_at, slice_at, u8_at};
use crate::utils::datetime::decode_stamp;

/// TF flag bits
pub mod tf_flags {
    /// Creation time recorded
    pub const CREATE: u8 = 0x01;
    /// Modification time recorded
    pub const MODIFY: u8 = 0x02;
    /// Access time recorded
    pub const ACCESS: u8 = 0x04;
    /// Attribute change time recorded
    pub const ATTRIBUTES: u8 = 0x08;
    /// Stamps use the 17-byte form
    pub const LONG_FORM: u8 = 0x80;
}

/// SL component flag bits
mod sl_component {
    pub const CURRENT: u8 = 0x02;
    pub const PARENT: u8 = 0x04;
    pub const ROOT: u8 = 0x08;
}

/// NM flag bits
mod nm_flags {
    pub const CONTINUE: u8 = 0x01;
    pub const CURRENT: u8 = 0x02;
    pub const PARENT: u8 = 0x04;
}

/// POSIX file attributes (PX entry)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PosixAttributes {
    /// File mode, type bits included
    pub mode: u32,

    /// Number of links
    pub nlink: u32,

    /// User ID
    pub uid: u32,

    /// Group ID
    pub gid: u32,
}

impl PosixAttributes {
    fn decode(entry: &[u8]) -> Option<Self> {
        Some(Self {
            mode: both32_at(entry, 4)?,
            nlink: both32_at(entry, 12)?,
            uid: both32_at(entry, 20)?,
            gid: both32_at(entry, 28)?,
        })
    }
}

/// Timestamps (TF entry), seconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamps {
    /// Access time
    pub atime: i64,

    /// Modification time
    pub mtime: i64,

    /// Attribute change time, falling back to the creation time
    pub ctime: i64,
}

impl Timestamps {
    fn decode(entry: &[u8]) -> Option<Self> {
        let flags = u8_at(entry, 4)?;
        let stamp_len = if flags & tf_flags::LONG_FORM != 0 { 17 } else { 7 };
        let mut offset = 5;
        let mut next = |present: bool| -> Option<Option<i64>> {
            if !present {
                return Some(None);
            }
            let stamp = slice_at(entry, offset, stamp_len)?;
            offset += stamp_len;
            Some(Some(decode_stamp(stamp)))
        };

        let create = next(flags & tf_flags::CREATE != 0)?;
        let modify = next(flags & tf_flags::MODIFY != 0)?;
        let access = next(flags & tf_flags::ACCESS != 0)?;
        let attributes = next(flags & tf_flags::ATTRIBUTES != 0)?;

        Some(Self {
            atime: access.unwrap_or(0),
            mtime: modify.unwrap_or(0),
            ctime: attributes.or(create).unwrap_or(0),
        })
    }
}

/// zisofs parameters (ZF entry)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionInfo {
    /// Algorithm identifier, always "pz"
    pub algorithm: [u8; 2],

    /// Size of the file header in bytes
    pub header_size: usize,

    /// log2 of the uncompressed block size
    pub block_shift: u8,

    /// Uncompressed file size
    pub real_size: u32,
}

impl CompressionInfo {
    fn decode(entry: &[u8]) -> Option<Self> {
        Some(Self {
            algorithm: [u8_at(entry, 4)?, u8_at(entry, 5)?],
            header_size: (u8_at(entry, 6)? as usize) << 2,
            block_shift: u8_at(entry, 7)?,
            real_size: both32_at(entry, 8)?,
        })
    }
}

/// Rock Ridge attributes collected for one directory record
///
/// A payload is present only when its entry was found and well formed.
#[derive(Debug, Clone, Default)]
pub struct RockRidge {
    /// PX attributes
    pub posix: Option<PosixAttributes>,

    /// Symbolic link target assembled from SL entries
    pub symlink: Option<String>,

    /// Alternate name assembled from NM entries
    pub name: Option<String>,

    /// TF timestamps
    pub times: Option<Timestamps>,

    /// Block holding the relocated directory (CL)
    pub child_link: Option<u32>,

    /// Parent directory of a relocated directory (PL)
    pub parent_link: Option<u32>,

    /// Record is a relocated directory in its holding directory (RE)
    pub relocated: bool,

    /// ZF parameters
    pub compression: Option<CompressionInfo>,

    link_buf: Option<Vec<u8>>,
    name_buf: Vec<u8>,
}

/// Work left over after decoding one span
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SpanOutcome {
    /// First valid CE entry of the span
    pub continuation: Option<ContinuationArea>,

    /// First CL entry of the span
    pub relocation: Option<u32>,
}

impl RockRidge {
    /// Any Rock Ridge attribute present?
    pub fn is_empty(&self) -> bool {
        self.posix.is_none()
            && self.symlink.is_none()
            && self.name.is_none()
            && self.times.is_none()
            && self.compression.is_none()
            && self.child_link.is_none()
    }

    /// Decode the entries of one system use span
    ///
    /// `data_size` bounds continuation areas to a single logical block.
    pub fn parse_span(&mut self, span: &[u8], susp: &SuspState, data_size: usize) -> Result<SpanOutcome> {
        let mut outcome = SpanOutcome::default();

        for entry in Entries::new(span) {
            let signature = &entry.signature;
            if !is_known(signature) {
                log::trace!("unknown SUSP entry {:?}, stopping", String::from_utf8_lossy(signature));
                break;
            }
            if entry.declared_len < 4 {
                return Err(IsoFsError::corrupt(format!(
                    "SUSP entry {} has length {}",
                    String::from_utf8_lossy(signature),
                    entry.declared_len
                )));
            }
            if !entry.is_complete() {
                log::warn!(
                    "SUSP entry {} overruns its system use area",
                    String::from_utf8_lossy(signature)
                );
                break;
            }

            match signature {
                signatures::TERMINATOR => break,
                signatures::SUSP_INDICATOR => {
                    if !self.apply_sp(&entry, susp) {
                        break;
                    }
                }
                signatures::CONTINUATION => {
                    if outcome.continuation.is_none() {
                        outcome.continuation = decode_continuation(&entry, data_size);
                    } else {
                        log::debug!("duplicate CE entry ignored");
                    }
                }
                signatures::POSIX_ATTRS => {
                    if entry.version != 1 || !matches!(entry.declared_len, 36 | 44) {
                        warn_malformed(&entry);
                    } else {
                        self.posix = PosixAttributes::decode(entry.bytes);
                    }
                }
                signatures::SYMLINK => self.apply_sl(&entry),
                signatures::ALTERNATE_NAME => self.apply_nm(&entry),
                signatures::CHILD_LINK => {
                    if entry.version != 1 || entry.declared_len != 12 {
                        warn_malformed(&entry);
                    } else if outcome.relocation.is_none() {
                        outcome.relocation = both32_at(entry.bytes, 4);
                    }
                }
                signatures::PARENT_LINK => {
                    if entry.version != 1 || entry.declared_len != 12 {
                        warn_malformed(&entry);
                    } else {
                        self.parent_link = both32_at(entry.bytes, 4);
                    }
                }
                signatures::RELOCATED_DIR => {
                    if entry.version != 1 || entry.declared_len != 4 {
                        warn_malformed(&entry);
                    } else {
                        self.relocated = true;
                    }
                }
                signatures::TIMESTAMPS => {
                    match (entry.version, Timestamps::decode(entry.bytes)) {
                        (1, Some(times)) => self.times = Some(times),
                        _ => warn_malformed(&entry),
                    }
                }
                signatures::ZISOFS => self.apply_zf(&entry),
                // recognised, nothing to record
                _ => {}
            }
        }

        Ok(outcome)
    }

    /// Drop partially assembled names and links
    pub fn finish(&mut self) {
        self.link_buf = None;
        self.name_buf = Vec::new();
    }

    fn apply_sp(&mut self, entry: &SuspEntry<'_>, susp: &SuspState) -> bool {
        let magic = slice_at(entry.bytes, 4, 2);
        if entry.declared_len != 7 || entry.version != 1 || magic != Some(&SP_MAGIC[..]) {
            log::warn!("malformed SP entry, disabling SUSP processing");
            susp.disable();
            return false;
        }
        susp.activate(entry.bytes[6]);
        true
    }

    fn apply_sl(&mut self, entry: &SuspEntry<'_>) {
        if entry.version != 1 || entry.declared_len < 5 {
            warn_malformed(entry);
            return;
        }
        if self.symlink.is_some() {
            log::debug!("SL entry after a complete link ignored");
            return;
        }
        let bytes = entry.bytes;
        let flags = bytes[4];

        let mut target = self.link_buf.take().unwrap_or_default();
        let mut offset = 5;
        // components continue while the entry has room, whatever their flags say
        while offset < bytes.len() {
            let component = slice_at(bytes, offset, 2).and_then(|head| {
                let text = slice_at(bytes, offset + 2, head[1] as usize)?;
                Some((head[0], text))
            });
            let Some((component_flags, text)) = component else {
                log::warn!("truncated SL component, discarding link");
                return;
            };

            let separator: &[u8] = if target.is_empty() || target == b"/" { b"" } else { b"/" };
            let piece: &[u8] = if component_flags & sl_component::CURRENT != 0 {
                b"."
            } else if component_flags & sl_component::PARENT != 0 {
                b".."
            } else if component_flags & sl_component::ROOT != 0 {
                b"/"
            } else {
                text
            };
            if target.len() + separator.len() + piece.len() + 1 > PATH_MAX {
                log::warn!("symlink target longer than {PATH_MAX} bytes, discarding link");
                return;
            }
            target.extend_from_slice(separator);
            target.extend_from_slice(piece);
            offset += 2 + text.len();
        }

        if flags & 0x01 != 0 {
            self.link_buf = Some(target);
        } else if !target.is_empty() {
            self.symlink = Some(String::from_utf8_lossy(&target).into_owned());
        }
    }

    fn apply_nm(&mut self, entry: &SuspEntry<'_>) {
        if entry.version != 1 || entry.declared_len < 5 {
            warn_malformed(entry);
            return;
        }
        let flags = entry.bytes[4];
        if flags & (nm_flags::CURRENT | nm_flags::PARENT) != 0 {
            return;
        }
        let part = &entry.bytes[5..];
        if self.name.is_some() {
            log::debug!("NM entry after a complete name ignored");
        } else if self.name_buf.len() + part.len() > NAME_MAX - 1 {
            log::warn!("NM name longer than {} bytes ignored", NAME_MAX - 1);
        } else {
            self.name_buf.extend_from_slice(part);
            if flags & nm_flags::CONTINUE == 0 {
                let name = std::mem::take(&mut self.name_buf);
                self.name = Some(String::from_utf8_lossy(&name).into_owned());
            }
        }
    }

    fn apply_zf(&mut self, entry: &SuspEntry<'_>) {
        if entry.version != 1 || entry.declared_len != 16 {
            warn_malformed(entry);
            return;
        }
        match CompressionInfo::decode(entry.bytes) {
            Some(info) if &info.algorithm == b"pz" => self.compression = Some(info),
            Some(info) => log::warn!(
                "unsupported zisofs algorithm {:?}",
                String::from_utf8_lossy(&info.algorithm)
            ),
            None => warn_malformed(entry),
        }
    }
}

fn decode_continuation(entry: &SuspEntry<'_>, data_size: usize) -> Option<ContinuationArea> {
    if entry.version != 1 || entry.declared_len != 28 {
        warn_malformed(entry);
        return None;
    }
    let area = ContinuationArea {
        extent: both32_at(entry.bytes, 4)?,
        offset: both32_at(entry.bytes, 12)?,
        size: both32_at(entry.bytes, 20)?,
    };
    if area.extent < VOLUME_DESCRIPTOR_START {
        log::warn!("continuation area in system area (block {}) ignored", area.extent);
        return None;
    }
    if area.offset as u64 + area.size as u64 > data_size as u64 {
        log::warn!(
            "continuation area {}+{} exceeds block size {}",
            area.offset,
            area.size,
            data_size
        );
        return None;
    }
    Some(area)
}

fn is_known(signature: &[u8; 2]) -> bool {
    [
        signatures::SUSP_INDICATOR,
        signatures::CONTINUATION,
        signatures::PADDING,
        signatures::TERMINATOR,
        signatures::EXTENSIONS_REFERENCE,
        signatures::EXTENSION_SELECTOR,
        signatures::ROCK_RIDGE,
        signatures::POSIX_ATTRS,
        signatures::POSIX_DEV,
        signatures::SYMLINK,
        signatures::ALTERNATE_NAME,
        signatures::CHILD_LINK,
        signatures::PARENT_LINK,
        signatures::RELOCATED_DIR,
        signatures::TIMESTAMPS,
        signatures::SPARSE_FILE,
        signatures::ZISOFS,
    ]
    .contains(&signature)
}

fn warn_malformed(entry: &SuspEntry<'_>) {
    log::warn!(
        "skipping malformed {} entry (length {}, version {})",
        String::from_utf8_lossy(&entry.signature),
        entry.declared_len,
        entry.version
    );
}
