//! Error types for ISO9660 filesystem operations

use std::io;

/// Result type for isofs operations
pub type Result<T> = std::result::Result<T, IsoFsError>;

/// Errors that can occur while mounting an image or serving a request
#[derive(Debug, thiserror::Error)]
pub enum IsoFsError {
    /// Path does not exist in the image
    #[error("no such file or directory")]
    NotFound,

    /// A directory operation was attempted on something else
    #[error("not a directory")]
    NotADirectory,

    /// A file operation was attempted on a directory
    #[error("is a directory")]
    NotAFile,

    /// Request is malformed or does not apply to the target
    #[error("invalid argument")]
    InvalidArgument,

    /// On-disk structures are inconsistent
    #[error("corrupt image: {0}")]
    Corrupt(String),

    /// I/O error reading the backing image
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An allocation request derived from on-disk sizes was refused
    #[error("out of memory")]
    OutOfMemory,

    /// No "CD001" identifier at any supported sector layout
    #[error("no ISO9660 volume descriptor found at any known offset")]
    NoVolumeDescriptor,

    /// Descriptor set ended without a primary volume descriptor
    #[error("primary volume descriptor not found")]
    NoPrimaryDescriptor,
}

impl IsoFsError {
    /// Build a [`IsoFsError::Corrupt`] from anything printable
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    /// Positive errno value for the filesystem transport
    ///
    /// The transport negates it when replying to the kernel.
    pub fn errno(&self) -> i32 {
        match self {
            Self::NotFound => libc::ENOENT,
            Self::NotADirectory => libc::ENOTDIR,
            Self::NotAFile => libc::EISDIR,
            Self::InvalidArgument => libc::EINVAL,
            Self::OutOfMemory => libc::ENOMEM,
            Self::Corrupt(_)
            | Self::Io(_)
            | Self::NoVolumeDescriptor
            | Self::NoPrimaryDescriptor => libc::EIO,
        }
    }
}
