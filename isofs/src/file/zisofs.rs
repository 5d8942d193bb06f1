//! zisofs transparent decompression
//!
//! A compressed file starts with a 16-byte header (magic, uncompressed
//! length, header size, block shift) followed by a table of `nblocks + 1`
//! little-endian offsets. Block `i` occupies `[table[i], table[i + 1])`
//! bytes from the start of the extent and inflates to one block of
//! `1 << block_shift` bytes; an empty span is a block of zeros.

use crate::directory::record::DirectoryRecord;
use crate::error::{IsoFsError, Result};
use crate::extensions::rock_ridge::CompressionInfo;
use crate::volume::Volume;
use flate2::read::ZlibDecoder;
use std::io::{Read, Seek};

/// Magic at the start of every compressed file
pub const ZISOFS_MAGIC: [u8; 8] = [0x37, 0xE4, 0x53, 0x96, 0xC9, 0xDB, 0xD6, 0x07];

/// Block shifts accepted from ZF entries (4 KiB to 1 MiB blocks)
const BLOCK_SHIFTS: std::ops::RangeInclusive<u8> = 12..=20;

/// Compression metadata of one file, loaded once and never modified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZisofsFile {
    algorithm: [u8; 2],
    header_size: usize,
    block_shift: u8,
    compressed_size: u32,
    uncompressed_size: u32,
    block_pointers: Box<[u32]>,
}

impl ZisofsFile {
    /// Load the block table of the file described by `record`
    ///
    /// Returns `Ok(None)` when the data does not start with the zisofs
    /// magic, i.e. the ZF entry is stale and the file is stored plainly.
    pub fn load<R: Read + Seek>(
        volume: &Volume<R>,
        record: &DirectoryRecord,
        info: &CompressionInfo,
    ) -> Result<Option<Self>> {
        if !BLOCK_SHIFTS.contains(&info.block_shift) {
            log::warn!("zisofs block shift {} unsupported, treating file as plain", info.block_shift);
            return Ok(None);
        }
        let compressed_size = record.data_length;
        if (compressed_size as usize) < ZISOFS_MAGIC.len() || info.header_size < ZISOFS_MAGIC.len() {
            log::debug!("ZF entry on a file too small to carry a zisofs header");
            return Ok(None);
        }

        let magic = volume.read_span(record.extent, 0, ZISOFS_MAGIC.len())?;
        if magic != ZISOFS_MAGIC {
            log::debug!("ZF entry without zisofs magic at block {}, file is not compressed", record.extent);
            return Ok(None);
        }

        let block_size = 1u64 << info.block_shift;
        let nblocks = (info.real_size as u64).div_ceil(block_size) as usize;
        let table_len = (nblocks + 1) * 4;
        if info.header_size + table_len > compressed_size as usize {
            return Err(IsoFsError::corrupt(format!(
                "zisofs block table ({} entries) exceeds compressed size {}",
                nblocks + 1,
                compressed_size
            )));
        }

        let table = volume.read_span(record.extent, info.header_size as u64, table_len)?;
        let block_pointers = table
            .chunks_exact(4)
            .map(|raw| u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            .collect();

        Ok(Some(Self {
            algorithm: info.algorithm,
            header_size: info.header_size,
            block_shift: info.block_shift,
            compressed_size,
            uncompressed_size: info.real_size,
            block_pointers,
        }))
    }

    /// Decompressed file size
    pub fn uncompressed_size(&self) -> u32 {
        self.uncompressed_size
    }

    /// Size of the data as stored on disk
    pub fn compressed_size(&self) -> u32 {
        self.compressed_size
    }

    /// Uncompressed size of one block
    pub fn block_size(&self) -> usize {
        1 << self.block_shift
    }

    /// Number of compressed blocks
    pub fn block_count(&self) -> usize {
        self.block_pointers.len() - 1
    }

    /// Algorithm identifier from the ZF entry
    pub fn algorithm(&self) -> [u8; 2] {
        self.algorithm
    }

    /// Size of the file header preceding the block table
    pub fn header_size(&self) -> usize {
        self.header_size
    }

    /// Decompress into `buffer` starting at uncompressed `offset`
    ///
    /// The request is clamped to the uncompressed size.
    ///
    /// # Returns
    /// Number of bytes produced
    pub fn read<R: Read + Seek>(
        &self,
        volume: &Volume<R>,
        extent: u32,
        buffer: &mut [u8],
        offset: u64,
    ) -> Result<usize> {
        let size = super::clamp_request(self.uncompressed_size as u64, offset, buffer.len());
        if size == 0 {
            return Ok(0);
        }

        let block_size = self.block_size();
        let first = (offset / block_size as u64) as usize;
        let last = ((offset + size as u64 - 1) / block_size as u64) as usize;
        let mut shift = (offset % block_size as u64) as usize;
        let mut total = 0;

        for index in first..=last {
            let (start, end) = match self.block_pointers.get(index..index + 2) {
                Some(&[start, end]) => (start, end),
                _ => return Err(IsoFsError::corrupt(format!("zisofs block {index} not in table"))),
            };
            let span = end
                .checked_sub(start)
                .ok_or_else(|| IsoFsError::corrupt(format!("zisofs block {index} ends before it starts")))?
                as usize;
            let wanted = (block_size - shift).min(size - total);
            let out = &mut buffer[total..total + wanted];

            if span == 0 {
                out.fill(0);
            } else if span > block_size * 2 {
                return Err(IsoFsError::corrupt(format!(
                    "zisofs block {index} compresses to {span} bytes, block size {block_size}"
                )));
            } else {
                let compressed = volume.read_span(extent, start as u64, span)?;
                let block = inflate(&compressed, block_size)?;
                let bytes = block.get(shift..shift + wanted).ok_or_else(|| {
                    IsoFsError::corrupt(format!("zisofs block {index} inflates to only {} bytes", block.len()))
                })?;
                out.copy_from_slice(bytes);
            }

            total += wanted;
            // shift is only meaningful for the first block
            shift = 0;
        }

        Ok(total)
    }
}

/// Inflate one zlib stream that must fit in `block_size` bytes
fn inflate(compressed: &[u8], block_size: usize) -> Result<Vec<u8>> {
    let mut block = Vec::with_capacity(block_size);
    ZlibDecoder::new(compressed)
        .take(block_size as u64 + 1)
        .read_to_end(&mut block)
        .map_err(|e| IsoFsError::corrupt(format!("zisofs inflate failed: {e}")))?;
    if block.len() > block_size {
        return Err(IsoFsError::corrupt("zisofs block inflates past the block size"));
    }
    Ok(block)
}
