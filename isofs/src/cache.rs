//! Path-keyed inode cache
//!
//! Every path that has been looked up lives in exactly one of two tables:
//! the positive table maps it to its inode, the negative table records that
//! it does not exist. Entries are never evicted; the image is immutable for
//! the life of the mount.
//!
//! Lookups that miss walk the path from the root and read each directory
//! on the way, inserting every entry they see. The walk runs with the table
//! lock held, so two threads resolving the same new path cannot both insert
//! it. Lock order is always tables first, then the image reader.
//!
//! Holding the lock across the walk also means a cached lookup waits while
//! another thread reads a cold directory, zisofs headers included. Lookups
//! are serialised in exchange for never inserting a path twice.

use crate::directory::{self, child_path};
use crate::error::{IsoFsError, Result};
use crate::inode::Inode;
use crate::types::ROOT_INO;
use crate::volume::Volume;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Tables {
    positive: HashMap<String, Arc<Inode>>,
    negative: HashSet<String>,
}

/// Positive and negative lookup tables plus the inode number allocator
pub struct InodeCache {
    tables: Mutex<Tables>,
    next_ino: AtomicU64,
}

impl InodeCache {
    /// Create a cache seeded with the root inode
    pub fn new(mut root: Inode) -> Self {
        root.assign_ino(ROOT_INO);
        let mut tables = Tables::default();
        tables.positive.insert("/".to_string(), Arc::new(root));
        Self {
            tables: Mutex::new(tables),
            next_ino: AtomicU64::new(ROOT_INO + 1),
        }
    }

    /// Find the inode for an absolute path, reading directories as needed
    pub fn resolve<R: Read + Seek>(&self, volume: &Volume<R>, path: &str) -> Result<Arc<Inode>> {
        let components = split_path(path)?;
        let canonical = canonical_path(&components);

        let mut tables = self.tables.lock();
        if let Some(inode) = tables.positive.get(&canonical) {
            return Ok(inode.clone());
        }
        if tables.negative.contains(&canonical) {
            return Err(IsoFsError::NotFound);
        }
        log::trace!("cache miss for {canonical}");

        let mut current = tables
            .positive
            .get("/")
            .cloned()
            .ok_or_else(|| IsoFsError::corrupt("root inode missing from cache"))?;
        let mut current_path = String::from("/");

        for component in components {
            let next_path = child_path(&current_path, component);
            if let Some(next) = tables.positive.get(&next_path) {
                current = next.clone();
                current_path = next_path;
                continue;
            }

            if current.is_directory() {
                let is_root = current_path == "/";
                let tables = &mut *tables;
                directory::read_entries(volume, current.record(), is_root, |name, inode| {
                    insert(tables, &self.next_ino, child_path(&current_path, &name), inode);
                    ControlFlow::Continue(())
                })?;
            }

            match tables.positive.get(&next_path) {
                Some(next) => {
                    current = next.clone();
                    current_path = next_path;
                }
                None => {
                    log::trace!("{canonical} not found ({next_path} missing)");
                    tables.negative.insert(canonical);
                    return Err(IsoFsError::NotFound);
                }
            }
        }

        Ok(current)
    }

    /// Insert `inode` under `path` unless the path is already known
    ///
    /// Returns the cached inode for `path`, which is `inode` (with a fresh
    /// inode number) only if it was inserted.
    pub fn insert_if_absent(&self, path: String, inode: Inode) -> Arc<Inode> {
        let mut tables = self.tables.lock();
        insert(&mut tables, &self.next_ino, path, inode)
    }

    /// Cached inode for `path`, without touching the image
    pub fn get(&self, path: &str) -> Option<Arc<Inode>> {
        self.tables.lock().positive.get(path).cloned()
    }

    /// Has `path` been recorded as missing?
    pub fn is_negative(&self, path: &str) -> bool {
        self.tables.lock().negative.contains(path)
    }

    /// Number of cached inodes, root included
    pub fn len(&self) -> usize {
        self.tables.lock().positive.len()
    }

    /// Only the root is cached
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Number of paths recorded as missing
    pub fn negative_len(&self) -> usize {
        self.tables.lock().negative.len()
    }
}

fn insert(tables: &mut Tables, next_ino: &AtomicU64, path: String, mut inode: Inode) -> Arc<Inode> {
    if let Some(existing) = tables.positive.get(&path) {
        return existing.clone();
    }
    tables.negative.remove(&path);
    inode.assign_ino(next_ino.fetch_add(1, Ordering::Relaxed));
    let inode = Arc::new(inode);
    tables.positive.insert(path, inode.clone());
    inode
}

/// Split an absolute path into its components
///
/// Empty components (repeated or trailing separators) are dropped.
pub fn split_path(path: &str) -> Result<Vec<&str>> {
    if !path.starts_with('/') {
        return Err(IsoFsError::InvalidArgument);
    }
    Ok(path.split('/').filter(|c| !c.is_empty()).collect())
}

/// Rebuild the cache key for a split path
pub fn canonical_path(components: &[&str]) -> String {
    if components.is_empty() {
        "/".to_string()
    } else {
        components.iter().fold(String::new(), |mut path, component| {
            path.push('/');
            path.push_str(component);
            path
        })
    }
}
