//! ISO9660 Filesystem Implementation
//!
//! A read-only ISO9660 filesystem driver serving path-based requests
//! (getattr, readlink, open, read, readdir, statfs) straight from a raw
//! image file, as a filesystem-in-userspace transport needs them.
//!
//! # Overview
//!
//! ISO9660 is the standard filesystem for CD-ROMs and DVDs. This crate provides:
//! - Layout detection for plain ISO, raw 2352/2336-byte sector dumps and NRG containers
//! - Volume descriptor parsing (Primary, Supplementary/Joliet)
//! - Rock Ridge (POSIX attributes, symlinks, long names, relocated directories)
//! - Transparent zisofs decompression
//! - A path-keyed inode cache shared by concurrent callers
//!
//! # Architecture
//!
//! The implementation is layered:
//! 1. **Volume layer** - Detects the sector layout, walks volume descriptors
//!    from sector 16 and owns the synchronized block reader
//! 2. **Extension layer** - Decodes SUSP / Rock Ridge system use entries
//! 3. **Directory layer** - Iterates directory records and fixes up names
//! 4. **File layer** - Reads plain extents and zisofs-compressed files
//! 5. **Cache layer** - Memoizes resolved paths and missing paths
//! 6. **Operation layer** - [`IsoFs`], the request entry points
//!
//! # Usage
//!
//! ```no_run
//! use isofs::{IsoFs, MountOptions};
//!
//! let fs = IsoFs::open_image("image.iso", MountOptions::default())?;
//! for entry in fs.read_dir("/")? {
//!     println!("{} {} bytes", entry.name, entry.stat.size);
//! }
//!
//! let mut buf = [0u8; 512];
//! let len = fs.read("/readme.txt", &mut buf, 0)?;
//! # Ok::<(), isofs::IsoFsError>(())
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod directory;
pub mod error;
pub mod extensions;
pub mod file;
pub mod fs;
pub mod inode;
pub mod options;
pub mod types;
pub mod utils;
pub mod volume;

pub use error::{IsoFsError, Result};
pub use fs::IsoFs;
pub use options::MountOptions;
pub use types::{DirEntry, FileKind, Stat, StatFs, VolumeInfo};
pub use volume::geometry::ImageKind;
