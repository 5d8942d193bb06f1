//! Cached inodes and attribute synthesis

use crate::directory::record::{DirectoryRecord, RecordView};
use crate::error::Result;
use crate::extensions::{self, rock_ridge::RockRidge};
use crate::file::zisofs::ZisofsFile;
use crate::types::{mode, FileKind, Stat};
use crate::volume::Volume;
use std::io::{Read, Seek};

/// One resolved path: its directory record plus decoded extensions
///
/// Inodes are immutable once inserted into the cache; only the inode
/// number is assigned at insertion.
#[derive(Debug, Clone)]
pub struct Inode {
    ino: u64,
    record: DirectoryRecord,
    rock_ridge: RockRidge,
    zisofs: Option<ZisofsFile>,
}

impl Inode {
    /// Build an inode from a record read out of a directory block
    pub fn from_record<R: Read + Seek>(volume: &Volume<R>, view: &RecordView<'_>, parse_susp: bool) -> Result<Self> {
        let mut record = view.to_record();
        let rock_ridge = if parse_susp {
            let system_use = view.system_use();
            let system_use = system_use.get(volume.susp().skip()..).unwrap_or(&[]);
            extensions::load(volume, &mut record, system_use)?
        } else {
            RockRidge::default()
        };
        Self::with_extensions(volume, record, rock_ridge)
    }

    /// Build the root inode from the effective descriptor
    ///
    /// With Rock Ridge enabled the "." record of the root directory is
    /// decoded too; its SP entry switches SUSP processing on for the mount.
    pub fn root<R: Read + Seek>(volume: &Volume<R>) -> Result<Self> {
        let mut record = *volume.root();
        if !volume.options().rock_ridge {
            return Self::with_extensions(volume, record, RockRidge::default());
        }

        let mut buffer = volume.block_buffer();
        let len = volume.read_block(record.extent, &mut buffer)?;
        let rock_ridge = match RecordView::parse(&buffer[..len]) {
            Ok(dot) if dot.is_self() => {
                let mut dot_record = dot.to_record();
                let rock_ridge = extensions::load(volume, &mut dot_record, dot.system_use())?;
                if rock_ridge.child_link.is_some() {
                    record = dot_record;
                }
                rock_ridge
            }
            Ok(_) => {
                log::warn!("root directory does not start with a \".\" record");
                RockRidge::default()
            }
            Err(e) => {
                log::warn!("cannot decode root \".\" record: {e}");
                RockRidge::default()
            }
        };
        if volume.susp().is_active() {
            log::debug!("SUSP active, skipping {} bytes per record", volume.susp().skip());
        }
        Self::with_extensions(volume, record, rock_ridge)
    }

    fn with_extensions<R: Read + Seek>(volume: &Volume<R>, record: DirectoryRecord, rock_ridge: RockRidge) -> Result<Self> {
        let zisofs = match &rock_ridge.compression {
            Some(info) if !record.is_directory() => ZisofsFile::load(volume, &record, info)?,
            _ => None,
        };
        Ok(Self {
            ino: 0,
            record,
            rock_ridge,
            zisofs,
        })
    }

    pub(crate) fn assign_ino(&mut self, ino: u64) {
        self.ino = ino;
    }

    /// Inode number
    pub fn ino(&self) -> u64 {
        self.ino
    }

    /// Directory record (after CL relocation)
    pub fn record(&self) -> &DirectoryRecord {
        &self.record
    }

    /// Decoded Rock Ridge entries
    pub fn rock_ridge(&self) -> &RockRidge {
        &self.rock_ridge
    }

    /// zisofs metadata, when the file is really compressed
    pub fn zisofs(&self) -> Option<&ZisofsFile> {
        self.zisofs.as_ref()
    }

    /// Is this a directory according to its record flags?
    pub fn is_directory(&self) -> bool {
        self.record.is_directory()
    }

    /// Symlink target, only for PX-typed symlinks
    pub fn symlink(&self) -> Option<&str> {
        let posix = self.rock_ridge.posix?;
        if posix.mode & mode::S_IFMT != mode::S_IFLNK {
            return None;
        }
        self.rock_ridge.symlink.as_deref()
    }

    /// Logical file size (uncompressed for zisofs files)
    pub fn size(&self) -> u64 {
        match &self.zisofs {
            Some(zf) => zf.uncompressed_size() as u64,
            None => self.record.data_length as u64,
        }
    }

    /// Synthesize the attribute record
    pub fn stat(&self, data_size: usize) -> Stat {
        let (mode, nlink, uid, gid) = match self.rock_ridge.posix {
            Some(px) => (px.mode, px.nlink, px.uid, px.gid),
            None if self.is_directory() => (mode::DEFAULT_DIR, 1, 0, 0),
            None => (mode::DEFAULT_FILE, 1, 0, 0),
        };
        let (atime, mtime, ctime) = match self.rock_ridge.times {
            Some(tf) => (tf.atime, tf.mtime, tf.ctime),
            None => {
                let recorded = self.record.recorded_time();
                (recorded, recorded, recorded)
            }
        };
        let size = self.size();

        Stat {
            ino: self.ino,
            kind: FileKind::from_mode(mode),
            mode,
            nlink,
            uid,
            gid,
            size,
            blocks: size / data_size as u64,
            blksize: data_size as u32,
            atime,
            mtime,
            ctime,
        }
    }
}
