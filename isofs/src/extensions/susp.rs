//! System Use Sharing Protocol
//!
//! The system use area after a directory record's name holds a chain of
//! entries, each a 2-byte signature, a 1-byte total length, a 1-byte
//! version and a payload. SUSP itself defines the framing entries (SP, CE,
//! ST, PD, ER, ES); Rock Ridge defines the POSIX ones on top.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Size of the entry header (signature, length, version)
pub const ENTRY_HEADER_LEN: usize = 4;

/// Magic bytes of the SP entry
pub const SP_MAGIC: [u8; 2] = [0xBE, 0xEF];

/// Signature constants
pub mod signatures {
    /// SUSP indicator
    pub const SUSP_INDICATOR: &[u8; 2] = b"SP";
    /// Continuation area
    pub const CONTINUATION: &[u8; 2] = b"CE";
    /// Padding
    pub const PADDING: &[u8; 2] = b"PD";
    /// SUSP terminator
    pub const TERMINATOR: &[u8; 2] = b"ST";
    /// Extensions reference
    pub const EXTENSIONS_REFERENCE: &[u8; 2] = b"ER";
    /// Extension selector
    pub const EXTENSION_SELECTOR: &[u8; 2] = b"ES";
    /// Rock Ridge indicator (RRIP 1.09)
    pub const ROCK_RIDGE: &[u8; 2] = b"RR";
    /// POSIX file attributes signature
    pub const POSIX_ATTRS: &[u8; 2] = b"PX";
    /// POSIX device number signature
    pub const POSIX_DEV: &[u8; 2] = b"PN";
    /// Symbolic link signature
    pub const SYMLINK: &[u8; 2] = b"SL";
    /// Alternate name signature
    pub const ALTERNATE_NAME: &[u8; 2] = b"NM";
    /// Child link signature
    pub const CHILD_LINK: &[u8; 2] = b"CL";
    /// Parent link signature
    pub const PARENT_LINK: &[u8; 2] = b"PL";
    /// Relocated directory signature
    pub const RELOCATED_DIR: &[u8; 2] = b"RE";
    /// Timestamps signature
    pub const TIMESTAMPS: &[u8; 2] = b"TF";
    /// Sparse file signature
    pub const SPARSE_FILE: &[u8; 2] = b"SF";
    /// zisofs compression signature
    pub const ZISOFS: &[u8; 2] = b"ZF";
}

/// One entry of a system use area
#[derive(Debug, Clone, Copy)]
pub struct SuspEntry<'a> {
    /// Two-character signature
    pub signature: [u8; 2],

    /// Length the entry declares for itself
    pub declared_len: usize,

    /// Entry version
    pub version: u8,

    /// Entry bytes, header included, clipped to the area
    pub bytes: &'a [u8],
}

impl<'a> SuspEntry<'a> {
    /// Does the declared length fit inside the area?
    pub fn is_complete(&self) -> bool {
        self.declared_len >= ENTRY_HEADER_LEN && self.declared_len == self.bytes.len()
    }
}

/// Iterator over the entries of one system use area
///
/// Iteration stops at fewer than four remaining bytes and after an entry
/// whose declared length cannot be used to advance.
pub struct Entries<'a> {
    rest: &'a [u8],
}

impl<'a> Entries<'a> {
    /// Iterate over `area`
    pub fn new(area: &'a [u8]) -> Self {
        Self { rest: area }
    }
}

impl<'a> Iterator for Entries<'a> {
    type Item = SuspEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.len() < ENTRY_HEADER_LEN {
            return None;
        }
        let declared_len = self.rest[2] as usize;
        let entry = SuspEntry {
            signature: [self.rest[0], self.rest[1]],
            declared_len,
            version: self.rest[3],
            bytes: &self.rest[..declared_len.clamp(ENTRY_HEADER_LEN, self.rest.len())],
        };
        if entry.is_complete() {
            self.rest = &self.rest[declared_len..];
        } else {
            self.rest = &[];
        }
        Some(entry)
    }
}

/// Skip byte from the SP entry at the start of a root "." system use area
///
/// Returns `None` when the area does not begin with a well-formed SP.
pub fn find_sp(system_use: &[u8]) -> Option<u8> {
    match system_use {
        [b'S', b'P', 7, 1, 0xBE, 0xEF, skip, ..] => Some(*skip),
        _ => None,
    }
}

/// Location of a continuation area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuationArea {
    /// Logical block holding the area
    pub extent: u32,

    /// Byte offset inside that block
    pub offset: u32,

    /// Length of the area
    pub size: u32,
}

/// Mount-wide SUSP state, set by the SP entry of the root
#[derive(Debug, Default)]
pub struct SuspState {
    active: AtomicBool,
    skip: AtomicU8,
}

impl SuspState {
    /// Mark SUSP as in use with `skip` bytes before each record's entries
    pub fn activate(&self, skip: u8) {
        self.skip.store(skip, Ordering::Release);
        self.active.store(true, Ordering::Release);
    }

    /// Turn SUSP processing off for the rest of the mount
    pub fn disable(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Is SUSP processing active?
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Bytes skipped at the start of each system use area
    pub fn skip(&self) -> usize {
        self.skip.load(Ordering::Acquire) as usize
    }
}
