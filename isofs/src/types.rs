//! Common types and constants for ISO9660

use crate::volume::geometry::ImageKind;

/// Default logical block size (ISO9660 sector payload)
pub const SECTOR_SIZE: usize = 2048;

/// Size of one volume descriptor
pub const VOLUME_DESCRIPTOR_SIZE: usize = 2048;

/// Volume descriptor set starts at logical block 16
pub const VOLUME_DESCRIPTOR_START: u32 = 16;

/// Consecutive descriptors without "CD001" before the walk gives up
pub const MAX_IDENTIFIER_MISSES: u32 = 16;

/// Upper bound on descriptors examined in one walk
pub const MAX_VOLUME_DESCRIPTORS: u32 = 256;

/// Standard identifier carried by every volume descriptor
pub const STANDARD_IDENTIFIER: &[u8; 5] = b"CD001";

/// Longest file name component reported to callers
pub const NAME_MAX: usize = 255;

/// Longest symlink target accepted from SL entries
pub const PATH_MAX: usize = 4096;

/// Inode number of the root directory
pub const ROOT_INO: u64 = 1;

/// `f_type` reported by statfs
pub const ISOFS_SUPER_MAGIC: u32 = 0x9660;

/// POSIX file type mask and type bits, as stored in Rock Ridge PX entries
pub mod mode {
    /// File type mask
    pub const S_IFMT: u32 = 0o170_000;
    /// Socket
    pub const S_IFSOCK: u32 = 0o140_000;
    /// Symbolic link
    pub const S_IFLNK: u32 = 0o120_000;
    /// Regular file
    pub const S_IFREG: u32 = 0o100_000;
    /// Block device
    pub const S_IFBLK: u32 = 0o060_000;
    /// Directory
    pub const S_IFDIR: u32 = 0o040_000;
    /// Character device
    pub const S_IFCHR: u32 = 0o020_000;
    /// FIFO
    pub const S_IFIFO: u32 = 0o010_000;

    /// Directory readable and browsable by everyone
    pub const DEFAULT_DIR: u32 = S_IFDIR | 0o555;
    /// Regular file readable by everyone
    pub const DEFAULT_FILE: u32 = S_IFREG | 0o444;
}

/// Volume descriptor type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeDescriptorType {
    /// Boot Record (El Torito)
    BootRecord,
    /// Primary Volume Descriptor
    Primary,
    /// Supplementary Volume Descriptor (Joliet)
    Supplementary,
    /// Volume Partition Descriptor
    Partition,
    /// Volume Descriptor Set Terminator
    Terminator,
    /// Anything else
    Unknown(u8),
}

impl From<u8> for VolumeDescriptorType {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::BootRecord,
            1 => Self::Primary,
            2 => Self::Supplementary,
            3 => Self::Partition,
            255 => Self::Terminator,
            other => Self::Unknown(other),
        }
    }
}

/// Parsed volume information
#[derive(Debug, Clone)]
pub struct VolumeInfo {
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

    /// Volume creation time (seconds since the Unix epoch, 0 if unset)
    pub creation_time: i64,

    /// Volume modification time (seconds since the Unix epoch, 0 if unset)
    pub modification_time: i64,

    /// Volume space size (logical blocks)
    pub volume_space_size: u32,

    /// Logical block size (usually 2048)
    pub logical_block_size: u16,

    /// Physical layout the image was detected as
    pub image_kind: ImageKind,

    /// Joliet level of the effective descriptor (0 when plain ISO9660 names)
    pub joliet_level: u8,

    /// Whether the effective root carries a SUSP "SP" entry
    pub has_rock_ridge: bool,

    /// Whether a supplementary descriptor supplies the root
    pub supplementary: bool,
}

/// File flags from directory record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileFlags {
    /// Hidden file
    pub hidden: bool,

    /// Directory (not a file)
    pub directory: bool,

    /// Associated file
    pub associated: bool,

    /// Extended attribute record format
    pub extended_format: bool,

    /// Owner/group permissions in extended attributes
    pub extended_permissions: bool,

    /// Not final directory record for this file
    pub not_final: bool,
}

impl FileFlags {
    /// Decode the flags byte of a directory record
    pub fn from_bits(bits: u8) -> Self {
        Self {
            hidden: bits & 0x01 != 0,
            directory: bits & 0x02 != 0,
            associated: bits & 0x04 != 0,
            extended_format: bits & 0x08 != 0,
            extended_permissions: bits & 0x10 != 0,
            not_final: bits & 0x80 != 0,
        }
    }
}

/// File type derived from a mode word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Directory
    Directory,
    /// Regular file
    RegularFile,
    /// Symbolic link
    Symlink,
    /// Block device
    BlockDevice,
    /// Character device
    CharDevice,
    /// FIFO
    NamedPipe,
    /// Socket
    Socket,
}

impl FileKind {
    /// Classify a POSIX mode word; unknown type bits count as a regular file
    pub fn from_mode(bits: u32) -> Self {
        match bits & mode::S_IFMT {
            mode::S_IFDIR => Self::Directory,
            mode::S_IFLNK => Self::Symlink,
            mode::S_IFBLK => Self::BlockDevice,
            mode::S_IFCHR => Self::CharDevice,
            mode::S_IFIFO => Self::NamedPipe,
            mode::S_IFSOCK => Self::Socket,
            _ => Self::RegularFile,
        }
    }
}

/// Attribute record returned by getattr and readdir
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// Inode number, unique per path for the life of the mount
    pub ino: u64,
    /// File type
    pub kind: FileKind,
    /// Full mode word (type and permission bits)
    pub mode: u32,
    /// Link count
    pub nlink: u32,
    /// Owner
    pub uid: u32,
    /// Group
    pub gid: u32,
    /// Size in bytes (uncompressed size for zisofs files)
    pub size: u64,
    /// Size in logical blocks
    pub blocks: u64,
    /// Preferred I/O size
    pub blksize: u32,
    /// Access time (seconds since the Unix epoch)
    pub atime: i64,
    /// Modification time
    pub mtime: i64,
    /// Attribute change time
    pub ctime: i64,
}

/// Filesystem statistics returned by statfs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatFs {
    /// Filesystem magic
    pub fs_type: u32,
    /// Block size
    pub bsize: u32,
    /// Total blocks (not reported)
    pub blocks: u64,
    /// Free blocks
    pub bfree: u64,
    /// Blocks available to unprivileged users
    pub bavail: u64,
    /// Total inodes (not reported)
    pub files: u64,
    /// Free inodes
    pub ffree: u64,
    /// Maximum name length
    pub namelen: u32,
}

/// One directory entry as reported by readdir
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Entry name (no separators)
    pub name: String,
    /// Absolute path of the entry
    pub path: String,
    /// Attributes of the entry
    pub stat: Stat,
}
