//! Filesystem operations
//!
//! [`IsoFs`] is what a filesystem-in-userspace transport talks to: every
//! operation takes an absolute path and returns a typed result. The
//! transport maps errors to negative errno values with
//! [`IsoFsError::errno`].

use crate::cache::{canonical_path, split_path, InodeCache};
use crate::directory::{self, child_path};
use crate::error::{IsoFsError, Result};
use crate::file;
use crate::inode::Inode;
use crate::options::MountOptions;
use crate::types::{DirEntry, Stat, StatFs, VolumeInfo, ISOFS_SUPER_MAGIC, NAME_MAX};
use crate::volume::Volume;
use std::fs::File;
use std::io::{Read, Seek};
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;

/// A mounted ISO9660 image
///
/// Safe to share between threads; image reads are serialized internally.
pub struct IsoFs<R> {
    volume: Volume<R>,
    cache: InodeCache,
}

impl IsoFs<File> {
    /// Open and mount an image file
    pub fn open_image(path: impl AsRef<Path>, options: MountOptions) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("opening image {}", path.display());
        Self::mount(File::open(path)?, options)
    }
}

impl<R: Read + Seek> IsoFs<R> {
    /// Mount an image from any seekable reader
    pub fn mount(inner: R, options: MountOptions) -> Result<Self> {
        let volume = Volume::mount(inner, options)?;
        let root = Inode::root(&volume)?;
        Ok(Self {
            cache: InodeCache::new(root),
            volume,
        })
    }

    fn lookup(&self, path: &str) -> Result<Arc<Inode>> {
        self.cache.resolve(&self.volume, path)
    }

    /// Attributes of `path`
    pub fn getattr(&self, path: &str) -> Result<Stat> {
        Ok(self.lookup(path)?.stat(self.volume.data_size()))
    }

    /// Copy the symlink target of `path` into `buf`, NUL terminated
    ///
    /// The target is truncated to `buf.len() - 1` bytes.
    ///
    /// # Returns
    /// Number of target bytes copied, terminator excluded
    pub fn readlink(&self, path: &str, buf: &mut [u8]) -> Result<usize> {
        let target = self.read_link(path)?;
        let Some(room) = buf.len().checked_sub(1) else {
            return Err(IsoFsError::InvalidArgument);
        };
        let len = target.len().min(room);
        buf[..len].copy_from_slice(&target.as_bytes()[..len]);
        buf[len] = 0;
        Ok(len)
    }

    /// Symlink target of `path`
    pub fn read_link(&self, path: &str) -> Result<String> {
        let inode = self.lookup(path)?;
        inode
            .symlink()
            .map(str::to_string)
            .ok_or(IsoFsError::InvalidArgument)
    }

    /// Check that `path` can be opened for reading
    pub fn open(&self, path: &str) -> Result<()> {
        let inode = self.lookup(path)?;
        if inode.is_directory() {
            return Err(IsoFsError::NotAFile);
        }
        Ok(())
    }

    /// Read file data at `offset` into `buf`
    ///
    /// # Returns
    /// Number of bytes read, 0 at or past the end of the file
    pub fn read(&self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize> {
        let inode = self.lookup(path)?;
        if inode.is_directory() {
            return Err(IsoFsError::NotAFile);
        }
        match inode.zisofs() {
            Some(zf) => zf.read(&self.volume, inode.record().extent, buf, offset),
            None => file::read_extent(&self.volume, inode.record(), buf, offset),
        }
    }

    /// Read a whole file into a new Vec
    pub fn read_to_end(&self, path: &str) -> Result<Vec<u8>> {
        let size = self.getattr(path)?.size;
        let size = usize::try_from(size).map_err(|_| IsoFsError::OutOfMemory)?;
        let mut buffer = vec![0u8; size];
        let len = self.read(path, &mut buffer, 0)?;
        buffer.truncate(len);
        Ok(buffer)
    }

    /// Check that `path` is a directory
    pub fn opendir(&self, path: &str) -> Result<()> {
        let inode = self.lookup(path)?;
        if !inode.is_directory() {
            return Err(IsoFsError::NotADirectory);
        }
        Ok(())
    }

    /// Report the entries of directory `path` to `filler`
    ///
    /// `filler` returns `true` when it cannot take more entries, which ends
    /// the listing. Every reported entry is cached, so a following
    /// `getattr` on it is answered from memory with the same inode number.
    pub fn readdir<F>(&self, path: &str, mut filler: F) -> Result<()>
    where
        F: FnMut(&DirEntry) -> bool,
    {
        let dir = self.lookup(path)?;
        if !dir.is_directory() {
            return Err(IsoFsError::NotADirectory);
        }
        let dir_path = canonical_path(&split_path(path)?);
        let data_size = self.volume.data_size();

        directory::read_entries(&self.volume, dir.record(), dir_path == "/", |name, inode| {
            let entry_path = child_path(&dir_path, &name);
            let inode = self.cache.insert_if_absent(entry_path.clone(), inode);
            let entry = DirEntry {
                name,
                path: entry_path,
                stat: inode.stat(data_size),
            };
            if filler(&entry) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
    }

    /// Collect the entries of directory `path`
    pub fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        self.readdir(path, |entry| {
            entries.push(entry.clone());
            false
        })?;
        Ok(entries)
    }

    /// Filesystem statistics
    ///
    /// Capacity fields are zero; a read-only image has nothing to report.
    pub fn statfs(&self) -> StatFs {
        StatFs {
            fs_type: ISOFS_SUPER_MAGIC,
            bsize: self.volume.data_size() as u32,
            blocks: 0,
            bfree: 0,
            bavail: 0,
            files: 0,
            ffree: 0,
            namelen: NAME_MAX as u32,
        }
    }

    /// Descriptor summary of the mounted image
    pub fn volume_info(&self) -> &VolumeInfo {
        self.volume.info()
    }

    /// Number of cached inodes, root included
    pub fn cached_inodes(&self) -> usize {
        self.cache.len()
    }

    /// Is `path` cached as existing?
    pub fn is_cached(&self, path: &str) -> bool {
        self.cache.get(path).is_some()
    }

    /// Is `path` cached as missing?
    pub fn is_negative(&self, path: &str) -> bool {
        self.cache.is_negative(path)
    }
}
