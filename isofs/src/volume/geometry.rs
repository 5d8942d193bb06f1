//! Physical layout detection
//!
//! Images come as plain 2048-byte-sector ISOs, as raw CD sector dumps
//! (2352 or 2336 bytes per sector with headers around the user data), or
//! wrapped in a Nero (NRG) container with a fixed leading header. The
//! detector probes the descriptor at logical block 16 under each layout
//! and keeps the first one that carries "CD001".

use crate::error::{IsoFsError, Result};
use crate::types::{SECTOR_SIZE, STANDARD_IDENTIFIER, VOLUME_DESCRIPTOR_SIZE, VOLUME_DESCRIPTOR_START};
use crate::volume::reader::read_full_at;
use std::fmt;
use std::io::{Read, Seek};

/// Bytes of container header in front of an NRG image
pub const NRG_HEADER_SIZE: u64 = 307_200;

/// Physical layout of the backing image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// Plain 2048-byte sectors
    Iso2048,
    /// Raw 2352-byte sectors, MODE1 (16 header bytes)
    Mode1Raw2352,
    /// Raw 2352-byte sectors, MODE2 XA (24 header bytes)
    Mode2Raw2352,
    /// 2352-byte sectors with the user data first
    Raw2352,
    /// 2336-byte MODE2 sectors
    Mode2_2336,
    /// Nero container around plain 2048-byte sectors
    Nrg,
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Iso2048 => "ISO9660",
            Self::Mode1Raw2352 => "MODE1/2352",
            Self::Mode2Raw2352 => "MODE2/2352",
            Self::Raw2352 => "RAW/2352",
            Self::Mode2_2336 => "MODE2/2336",
            Self::Nrg => "NRG",
        };
        f.write_str(name)
    }
}

/// Address translation parameters for one mount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Physical sector size
    pub block_size: u64,
    /// Header bytes skipped inside each physical sector
    pub block_offset: u64,
    /// Logical block (user data) size
    pub data_size: usize,
    /// Container bytes in front of sector 0
    pub file_offset: u64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            block_size: SECTOR_SIZE as u64,
            block_offset: 0,
            data_size: SECTOR_SIZE,
            file_offset: 0,
        }
    }
}

impl Geometry {
    /// Byte offset of logical block `lba` in the image
    pub fn block_position(&self, lba: u64) -> Option<u64> {
        lba.checked_mul(self.block_size)?
            .checked_add(self.block_offset)?
            .checked_add(self.file_offset)
    }

    /// Same translation with a different logical block size
    pub fn with_data_size(self, data_size: usize) -> Self {
        Self { data_size, ..self }
    }

    /// Classify the layout for diagnostics
    pub fn kind(&self) -> ImageKind {
        match (self.block_size, self.block_offset, self.file_offset) {
            (2048, _, 0) => ImageKind::Iso2048,
            (2048, _, _) => ImageKind::Nrg,
            (2336, _, _) => ImageKind::Mode2_2336,
            (_, 16, _) => ImageKind::Mode1Raw2352,
            (_, 24, _) => ImageKind::Mode2Raw2352,
            _ => ImageKind::Raw2352,
        }
    }
}

/// Candidate layouts, probed in order: (physical sector size, header bytes, container bytes)
const PROBES: [(u64, u64, u64); 4] = [
    (2048, 0, 0),
    (2336, 16, 0),
    (2352, 0, 0),
    (2048, 0, NRG_HEADER_SIZE),
];

/// Extra header bytes a raw sector may carry in front of the descriptor
const SECTOR_HEADERS: [u64; 3] = [0, 16, 24];

/// Find the layout under which block 16 holds a volume descriptor
pub fn detect<R: Read + Seek>(inner: &mut R) -> Result<Geometry> {
    let mut buffer = vec![0u8; VOLUME_DESCRIPTOR_SIZE];

    for (block_size, block_offset, file_offset) in PROBES {
        let probe = Geometry {
            block_size,
            block_offset,
            data_size: SECTOR_SIZE,
            file_offset,
        };
        let Some(position) = probe.block_position(VOLUME_DESCRIPTOR_START as u64) else {
            continue;
        };
        let len = read_full_at(inner, position, &mut buffer)?;
        let data = &buffer[..len];

        for header in SECTOR_HEADERS {
            // 2336-byte sectors already skip their subheader
            if header != 0 && block_size != 2352 {
                continue;
            }
            let start = 1 + header as usize;
            if data.get(start..start + STANDARD_IDENTIFIER.len()) == Some(&STANDARD_IDENTIFIER[..]) {
                let geometry = Geometry {
                    block_offset: block_offset + header,
                    ..probe
                };
                log::debug!("found volume descriptor at byte {}", position + header);
                return Ok(geometry);
            }
        }
        log::trace!("no volume descriptor at byte {position}");
    }

    Err(IsoFsError::NoVolumeDescriptor)
}
