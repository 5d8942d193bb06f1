//! Common test utilities: image builder, mount helpers and layout wrappers

#![allow(dead_code)]

pub mod builder;
pub use builder::*;

use isofs::{IsoFs, MountOptions};
use std::io::Cursor;

pub type MemFs = IsoFs<Cursor<Vec<u8>>>;

/// Mount an in-memory image with default options
pub fn mount(image: Vec<u8>) -> MemFs {
    mount_with(image, MountOptions::default())
}

pub fn mount_with(image: Vec<u8>, options: MountOptions) -> MemFs {
    IsoFs::mount(Cursor::new(image), options).expect("image should mount")
}

/// Sorted entry names of a directory
pub fn entry_names(fs: &MemFs, path: &str) -> Vec<String> {
    let mut names: Vec<String> = fs
        .read_dir(path)
        .expect("directory should list")
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    names.sort();
    names
}

/// Small image used by most tests: /hello.txt and /sub/a.txt
pub fn simple_image(rock_ridge: bool) -> Vec<u8> {
    let mut builder = IsoBuilder::new();
    builder
        .rock_ridge(rock_ridge)
        .add_file("/hello.txt", b"hi")
        .add_file("/sub/a.txt", b"contents of a\n");
    builder.build()
}

/// Spread each 2048-byte block of `image` over a raw sector of
/// `sector_size` bytes, user data starting `header` bytes in
pub fn wrap_sectors(image: &[u8], sector_size: usize, header: usize) -> Vec<u8> {
    assert!(header + BLOCK <= sector_size);
    let mut out = Vec::with_capacity(image.len() / BLOCK * sector_size);
    for (index, block) in image.chunks(BLOCK).enumerate() {
        let mut sector = vec![0u8; sector_size];
        if sector_size == 2352 && header >= 16 {
            // sync pattern, MSF address, mode
            sector[1..11].fill(0xFF);
            sector[12] = (index / 4500) as u8;
            sector[13] = (index / 75 % 60) as u8;
            sector[14] = (index % 75) as u8;
            sector[15] = if header == 16 { 1 } else { 2 };
        }
        sector[header..header + block.len()].copy_from_slice(block);
        out.extend_from_slice(&sector);
    }
    out
}

/// Prefix `image` with an empty Nero container header
pub fn nrg_wrap(image: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; 307_200];
    out.extend_from_slice(image);
    out
}
