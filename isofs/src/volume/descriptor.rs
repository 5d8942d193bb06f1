//! Primary and supplementary volume descriptor decoding
//!
//! Both descriptor types share the layout of ECMA-119 8.4; the
//! supplementary one additionally carries an escape sequence at byte 88
//! that announces Joliet and its level.

use crate::directory::record::{DirectoryRecord, RecordView};
use crate::error::{IsoFsError, Result};
use crate::types::{VolumeDescriptorType, STANDARD_IDENTIFIER, VOLUME_DESCRIPTOR_SIZE};
use crate::utils::bytes::{both16_at, both32_at};
use crate::utils::datetime::decode_stamp;
use crate::utils::string::{identifier_to_string, ucs2_identifier_to_string};

const SYSTEM_ID: (usize, usize) = (8, 32);
const VOLUME_ID: (usize, usize) = (40, 32);
const VOLUME_SPACE_SIZE: usize = 80;
const ESCAPE_SEQUENCES: usize = 88;
const LOGICAL_BLOCK_SIZE: usize = 128;
const ROOT_RECORD: (usize, usize) = (156, 34);
const VOLUME_SET_ID: (usize, usize) = (190, 128);
const PUBLISHER_ID: (usize, usize) = (318, 128);
const PREPARER_ID: (usize, usize) = (446, 128);
const APPLICATION_ID: (usize, usize) = (574, 128);
const CREATION_DATE: (usize, usize) = (813, 17);
const MODIFICATION_DATE: (usize, usize) = (830, 17);

/// Does this block start with the "CD001" standard identifier?
pub fn has_identifier(data: &[u8]) -> bool {
    data.get(1..6) == Some(&STANDARD_IDENTIFIER[..])
}

/// Type code of the descriptor in `data`
pub fn descriptor_type(data: &[u8]) -> VolumeDescriptorType {
    VolumeDescriptorType::from(data.first().copied().unwrap_or(0))
}

/// Joliet level announced by a supplementary descriptor's escape sequence
///
/// Returns 0 when the sequence is not one of `%/@`, `%/C`, `%/E`.
pub fn joliet_level(data: &[u8]) -> u8 {
    match data.get(ESCAPE_SEQUENCES..ESCAPE_SEQUENCES + 3) {
        Some([0x25, 0x2F, 0x40]) => 1,
        Some([0x25, 0x2F, 0x43]) => 2,
        Some([0x25, 0x2F, 0x45]) => 3,
        _ => 0,
    }
}

/// Decoded primary or supplementary volume descriptor
#[derive(Debug, Clone)]
pub struct VolumeDescriptor {
    /// Primary or Supplementary
    pub kind: VolumeDescriptorType,
    /// Joliet level (0 for primary or non-Joliet supplementary)
    pub joliet_level: u8,
    /// System identifier
    pub system_id: String,
    /// Volume identifier
    pub volume_id: String,
    /// Volume set identifier
    pub volume_set_id: String,
    /// Publisher identifier
    pub publisher_id: String,
    /// Data preparer identifier
    pub preparer_id: String,
    /// Application identifier
    pub application_id: String,
    /// Volume creation time
    pub creation_time: i64,
    /// Volume modification time
    pub modification_time: i64,
    /// Volume space size in logical blocks
    pub volume_space_size: u32,
    /// Logical block size in bytes
    pub logical_block_size: u16,
    /// Root directory record
    pub root: DirectoryRecord,
}

impl VolumeDescriptor {
    /// Decode a descriptor block
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < VOLUME_DESCRIPTOR_SIZE || !has_identifier(data) {
            return Err(IsoFsError::corrupt("not a volume descriptor"));
        }
        let kind = descriptor_type(data);
        let joliet_level = match kind {
            VolumeDescriptorType::Supplementary => joliet_level(data),
            _ => 0,
        };

        let text = |(offset, len): (usize, usize)| {
            let field = &data[offset..offset + len];
            if joliet_level > 0 {
                ucs2_identifier_to_string(field)
            } else {
                identifier_to_string(field)
            }
        };
        let date = |(offset, len): (usize, usize)| decode_stamp(&data[offset..offset + len]);

        let (root_offset, root_len) = ROOT_RECORD;
        let root = RecordView::parse(&data[root_offset..root_offset + root_len])?.to_record();

        Ok(Self {
            kind,
            joliet_level,
            system_id: text(SYSTEM_ID),
            volume_id: text(VOLUME_ID),
            volume_set_id: text(VOLUME_SET_ID),
            publisher_id: text(PUBLISHER_ID),
            preparer_id: text(PREPARER_ID),
            application_id: text(APPLICATION_ID),
            creation_time: date(CREATION_DATE),
            modification_time: date(MODIFICATION_DATE),
            volume_space_size: both32_at(data, VOLUME_SPACE_SIZE).unwrap_or(0),
            logical_block_size: both16_at(data, LOGICAL_BLOCK_SIZE).unwrap_or(0),
            root,
        })
    }
}
