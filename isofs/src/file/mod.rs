//! File reading and extent management

pub mod zisofs;

use crate::directory::record::DirectoryRecord;
use crate::error::{IsoFsError, Result};
use crate::volume::Volume;
use std::io::{Read, Seek};

/// Clamp a request of `len` bytes at `offset` to a file of `file_size` bytes
pub fn clamp_request(file_size: u64, offset: u64, len: usize) -> usize {
    file_size.saturating_sub(offset).min(len as u64) as usize
}

/// Read uncompressed file contents starting at `offset`
///
/// `buffer` is filled up to the end of the file. An image truncated inside
/// the file's extent yields the bytes that are present.
///
/// # Returns
/// Number of bytes read
pub fn read_extent<R: Read + Seek>(
    volume: &Volume<R>,
    record: &DirectoryRecord,
    buffer: &mut [u8],
    offset: u64,
) -> Result<usize> {
    let size = clamp_request(record.data_length as u64, offset, buffer.len());
    if size == 0 {
        return Ok(0);
    }

    let data_size = volume.data_size();
    let mut block = (offset / data_size as u64) as u32;
    let mut shift = (offset % data_size as u64) as usize;
    let mut sector = volume.block_buffer();
    let mut total = 0;

    while total < size {
        let lba = record
            .extent
            .checked_add(block)
            .ok_or_else(|| IsoFsError::corrupt("file extent beyond addressable range"))?;
        let len = volume.read_block(lba, &mut sector)?;
        if len <= shift {
            log::debug!("image ends inside file data at block {lba}");
            break;
        }

        let chunk = (len - shift).min(size - total);
        buffer[total..total + chunk].copy_from_slice(&sector[shift..shift + chunk]);
        total += chunk;
        if len < data_size {
            break;
        }

        // shift is only meaningful for the first block
        shift = 0;
        block += 1;
    }

    Ok(total)
}
