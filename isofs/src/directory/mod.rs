//! Directory record parsing and navigation

pub mod name;
pub mod record;

use crate::error::{IsoFsError, Result};
use crate::inode::Inode;
use crate::types::NAME_MAX;
use crate::volume::Volume;
use record::{DirectoryRecord, RecordView, HEADER_LEN};
use std::io::{self, Read, Seek};
use std::ops::ControlFlow;

/// Join a directory path and an entry name
pub fn child_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Walk the records of the directory described by `dir`
///
/// The "." and ".." records are not reported. Every other record is turned
/// into an [`Inode`] (decoding its Rock Ridge entries when SUSP is active or
/// `is_root` is set) and handed to `visit` with its decoded name; returning
/// [`ControlFlow::Break`] ends the walk early.
///
/// A record shorter than the fixed header ends the current block once the
/// "." and ".." records have been seen; before that it is a format error.
/// A second "." record means the extent ran into the next directory.
pub fn read_entries<R, F>(volume: &Volume<R>, dir: &DirectoryRecord, is_root: bool, mut visit: F) -> Result<()>
where
    R: Read + Seek,
    F: FnMut(String, Inode) -> ControlFlow<()>,
{
    if !dir.is_directory() {
        return Err(IsoFsError::NotADirectory);
    }

    let data_size = volume.data_size();
    let blocks = (dir.data_length as usize).div_ceil(data_size);
    let mut buffer = volume.block_buffer();
    let mut count = 0usize;

    for block in 0..blocks {
        let lba = dir
            .extent
            .checked_add(block as u32)
            .ok_or_else(|| IsoFsError::corrupt("directory extent beyond addressable range"))?;
        let len = volume.read_block(lba, &mut buffer)?;
        if len != data_size {
            return Err(IsoFsError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("directory block {lba} truncated to {len} bytes"),
            )));
        }

        let mut offset = 0;
        while offset + HEADER_LEN <= data_size {
            let length = buffer[offset] as usize;
            if length == 0 {
                // rest of the block is padding
                break;
            }
            if length < HEADER_LEN {
                if count >= 2 {
                    break;
                }
                return Err(IsoFsError::corrupt(format!(
                    "directory record length {length} in block {lba}"
                )));
            }

            let view = RecordView::parse(&buffer[offset..])?;
            if view.name().len() > NAME_MAX - 1 {
                return Err(IsoFsError::corrupt(format!(
                    "file identifier length {} in block {lba}",
                    view.name().len()
                )));
            }
            offset += view.length();
            count += 1;

            if count <= 2 {
                continue;
            }
            if view.is_self() {
                log::debug!("directory at block {} runs into another directory", dir.extent);
                return Ok(());
            }

            let parse_susp = volume.options().rock_ridge && (volume.susp().is_active() || is_root);
            let inode = Inode::from_record(volume, &view, parse_susp)?;
            let entry_name = match inode.rock_ridge().name.as_ref() {
                Some(alternate) => alternate.clone(),
                None => name::decode_name(view.name(), volume.joliet_level()),
            };
            if !name::is_valid_component(&entry_name) {
                log::warn!(
                    "skipping entry with unusable name {:?} in block {lba}",
                    String::from_utf8_lossy(view.name())
                );
                continue;
            }

            if visit(entry_name, inode).is_break() {
                return Ok(());
            }
        }
    }

    Ok(())
}
