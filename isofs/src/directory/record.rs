//! Directory Record structure
//!
//! Directory records describe files and subdirectories. On disk each record
//! is laid out as (ECMA-119 9.1):
//!
//! ```text
//! 0      length of record
//! 1      extended attribute record length
//! 2..10  extent location (both-endian 32-bit)
//! 10..18 data length (both-endian 32-bit)
//! 18..25 recording date and time
//! 25     file flags
//! 26..32 interleave and volume sequence fields
//! 32     file identifier length
//! 33..   file identifier, padding byte if the length is even, system use
//! ```

use crate::error::{IsoFsError, Result};
use crate::types::FileFlags;
use crate::utils::bytes::{both32_at, u8_at};
use crate::utils::datetime::DateTime7;

/// Size of the fixed part of a record, up to the file identifier
pub const HEADER_LEN: usize = 33;

/// Validated view over one record inside a directory block
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    bytes: &'a [u8],
}

impl<'a> RecordView<'a> {
    /// Parse the record at the start of `data`
    ///
    /// The declared length must cover the fixed header and the file
    /// identifier and must fit inside `data`.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let length = u8_at(data, 0).ok_or_else(|| IsoFsError::corrupt("empty directory record"))? as usize;
        if length < HEADER_LEN {
            return Err(IsoFsError::corrupt(format!("directory record length {length} too short")));
        }
        if length > data.len() {
            return Err(IsoFsError::corrupt("directory record crosses block boundary"));
        }
        let name_len = data[32] as usize;
        if HEADER_LEN + name_len > length {
            return Err(IsoFsError::corrupt(format!(
                "file identifier length {name_len} exceeds record length {length}"
            )));
        }
        Ok(Self {
            bytes: &data[..length],
        })
    }

    /// Declared record length
    pub fn length(&self) -> usize {
        self.bytes.len()
    }

    /// First logical block of the file data
    pub fn extent(&self) -> u32 {
        both32_at(self.bytes, 2).unwrap_or(0)
    }

    /// Data length in bytes
    pub fn data_length(&self) -> u32 {
        both32_at(self.bytes, 10).unwrap_or(0)
    }

    /// Raw 7-byte recording date
    pub fn recorded(&self) -> [u8; 7] {
        let mut date = [0u8; 7];
        date.copy_from_slice(&self.bytes[18..25]);
        date
    }

    /// File flags
    pub fn flags(&self) -> FileFlags {
        FileFlags::from_bits(self.bytes[25])
    }

    /// Raw file identifier
    pub fn name(&self) -> &'a [u8] {
        let name_len = self.bytes[32] as usize;
        &self.bytes[HEADER_LEN..HEADER_LEN + name_len]
    }

    /// The "." record of a directory (identifier is a single NUL)
    pub fn is_self(&self) -> bool {
        self.name() == [0]
    }

    /// System use area following the identifier and padding
    pub fn system_use(&self) -> &'a [u8] {
        let name_len = self.bytes[32] as usize;
        let pad = usize::from(name_len % 2 == 0);
        self.bytes.get(HEADER_LEN + name_len + pad..).unwrap_or(&[])
    }

    /// Copy the fields needed after the block buffer is gone
    pub fn to_record(&self) -> DirectoryRecord {
        DirectoryRecord {
            extent: self.extent(),
            data_length: self.data_length(),
            recorded: self.recorded(),
            flags: self.flags(),
        }
    }
}

/// Owned copy of the fixed fields of a directory record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryRecord {
    /// First logical block of the data
    pub extent: u32,

    /// Data length in bytes
    pub data_length: u32,

    /// Recording date and time
    pub recorded: [u8; 7],

    /// File flags
    pub flags: FileFlags,
}

impl DirectoryRecord {
    /// Is this a directory?
    pub fn is_directory(&self) -> bool {
        self.flags.directory
    }

    /// Recording date as seconds since the Unix epoch
    pub fn recorded_time(&self) -> i64 {
        DateTime7::from_bytes(&self.recorded).to_unix()
    }
}
