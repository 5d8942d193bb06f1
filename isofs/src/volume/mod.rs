//! Volume descriptor parsing
//!
//! ISO9660 volume descriptors start at sector 16 and describe the filesystem layout.
//! Multiple descriptors may be present (Primary, Supplementary, Boot Record).
//! Mounting detects the physical layout, walks the descriptor set and picks
//! the descriptor whose root directory is used for the rest of the mount.

pub mod descriptor;
pub mod geometry;
pub mod reader;

use crate::directory::record::{DirectoryRecord, RecordView};
use crate::error::{IsoFsError, Result};
use crate::extensions::susp::{find_sp, SuspState};
use crate::options::MountOptions;
use crate::types::{
    VolumeDescriptorType, VolumeInfo, MAX_IDENTIFIER_MISSES, MAX_VOLUME_DESCRIPTORS, SECTOR_SIZE,
    VOLUME_DESCRIPTOR_SIZE, VOLUME_DESCRIPTOR_START,
};
use descriptor::{descriptor_type, has_identifier, VolumeDescriptor};
use geometry::Geometry;
use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;
use parking_lot::Mutex;
use reader::{read_full_at, ImageReader};
use std::io::{Read, Seek};

/// A mounted image: geometry, effective root and the shared block reader
pub struct Volume<R> {
    reader: Mutex<ImageReader<R>>,
    geometry: Geometry,
    info: VolumeInfo,
    root: DirectoryRecord,
    joliet_level: u8,
    susp: SuspState,
    options: MountOptions,
}

/// Descriptors collected by the walk, before Rock Ridge probing
struct DescriptorSet {
    primary: VolumeDescriptor,
    supplementary: Vec<VolumeDescriptor>,
}

impl<R: Read + Seek> Volume<R> {
    /// Detect the layout of `inner` and select the effective root
    pub fn mount(mut inner: R, options: MountOptions) -> Result<Self> {
        let geometry = geometry::detect(&mut inner)?;
        log::info!("{} image found", geometry.kind());
        if geometry.block_size != SECTOR_SIZE as u64 {
            log::info!("physical sector size {}", geometry.block_size);
        }

        let set = walk_descriptors(&mut inner, &geometry)?;

        let data_size = match set.primary.logical_block_size as usize {
            size @ 512..=2048 if size.is_power_of_two() => size,
            size => {
                log::warn!("unusable logical block size {size}, using {SECTOR_SIZE}");
                SECTOR_SIZE
            }
        };
        let geometry = geometry.with_data_size(data_size);
        let mut reader = ImageReader::new(inner, geometry)?;

        let primary_rr = options.rock_ridge && check_rock_ridge(&mut reader, &set.primary.root);
        let mut root = set.primary.root;
        let mut joliet_level = 0;
        let mut has_rock_ridge = primary_rr;
        let mut supplementary = false;

        for svd in &set.supplementary {
            let level = if options.joliet { svd.joliet_level } else { 0 };
            let svd_rr = options.rock_ridge && check_rock_ridge(&mut reader, &svd.root);
            // prefer the descriptor with Rock Ridge, then Joliet names
            if (level > 0 && svd_rr) || (svd_rr && !primary_rr) || (level > 0 && !primary_rr) {
                log::debug!("switching to supplementary descriptor, Joliet level {level}, Rock Ridge {svd_rr}");
                root = svd.root;
                joliet_level = level;
                has_rock_ridge = svd_rr;
                supplementary = true;
            } else {
                log::debug!("supplementary descriptor (Joliet level {level}) not used");
            }
        }

        let info = VolumeInfo {
            system_id: set.primary.system_id.clone(),
            volume_id: set.primary.volume_id.clone(),
            volume_set_id: set.primary.volume_set_id.clone(),
            publisher_id: set.primary.publisher_id.clone(),
            preparer_id: set.primary.preparer_id.clone(),
            application_id: set.primary.application_id.clone(),
            creation_time: set.primary.creation_time,
            modification_time: set.primary.modification_time,
            volume_space_size: set.primary.volume_space_size,
            logical_block_size: data_size as u16,
            image_kind: geometry.kind(),
            joliet_level,
            has_rock_ridge,
            supplementary,
        };
        log::info!(
            "mounted volume {:?}: Joliet level {}, Rock Ridge {}",
            info.volume_id,
            joliet_level,
            if has_rock_ridge { "present" } else { "absent" }
        );

        Ok(Self {
            reader: Mutex::new(reader),
            geometry,
            info,
            root,
            joliet_level,
            susp: SuspState::default(),
            options,
        })
    }

    /// Read logical block `lba` into `buf`, returning the bytes read
    ///
    /// Fewer than `data_size` bytes means the image ends inside the block.
    pub fn read_block(&self, lba: u32, buf: &mut [u8]) -> Result<usize> {
        let mut reader = self.reader.lock();
        Ok(reader.read_block(lba as u64, buf)?)
    }

    /// Read `len` bytes starting `offset` bytes into the extent at `extent`
    ///
    /// The span may cross logical block boundaries; every block it touches
    /// must exist in the image.
    pub fn read_span(&self, extent: u32, offset: u64, len: usize) -> Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let data_size = self.geometry.data_size as u64;
        let first = offset / data_size;
        let last = (offset + len as u64 - 1) / data_size;
        let count = usize::try_from(last - first + 1).map_err(|_| IsoFsError::OutOfMemory)?;
        let mut buffer = vec![0u8; count * self.geometry.data_size];

        self.reader
            .lock()
            .read_blocks(Lba(extent as u64 + first), &mut buffer)?;

        let start = (offset % data_size) as usize;
        buffer.drain(..start);
        buffer.truncate(len);
        Ok(buffer)
    }

    /// Zeroed buffer of one logical block
    pub fn block_buffer(&self) -> Vec<u8> {
        vec![0u8; self.geometry.data_size]
    }

    /// Logical block size
    pub fn data_size(&self) -> usize {
        self.geometry.data_size
    }

    /// Address translation in use
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Descriptor summary
    pub fn info(&self) -> &VolumeInfo {
        &self.info
    }

    /// Root directory record of the effective descriptor
    pub fn root(&self) -> &DirectoryRecord {
        &self.root
    }

    /// Joliet level of the effective descriptor
    pub fn joliet_level(&self) -> u8 {
        self.joliet_level
    }

    /// Mount-wide SUSP state
    pub fn susp(&self) -> &SuspState {
        &self.susp
    }

    /// Options the volume was mounted with
    pub fn options(&self) -> &MountOptions {
        &self.options
    }
}

fn walk_descriptors<R: Read + Seek>(inner: &mut R, geometry: &Geometry) -> Result<DescriptorSet> {
    let mut buffer = vec![0u8; VOLUME_DESCRIPTOR_SIZE];
    let mut primary: Option<VolumeDescriptor> = None;
    let mut supplementary = Vec::new();
    let mut misses = 0;

    for index in 0..MAX_VOLUME_DESCRIPTORS {
        let lba = (VOLUME_DESCRIPTOR_START + index) as u64;
        let position = geometry
            .block_position(lba)
            .ok_or_else(|| IsoFsError::corrupt("volume descriptor beyond addressable range"))?;
        let len = read_full_at(inner, position, &mut buffer)?;
        if len < VOLUME_DESCRIPTOR_SIZE {
            log::debug!("image ends inside descriptor {index}");
            break;
        }

        if !has_identifier(&buffer) {
            misses += 1;
            if misses >= MAX_IDENTIFIER_MISSES {
                if primary.is_none() {
                    return Err(IsoFsError::corrupt("no standard identifier in volume descriptor set"));
                }
                log::warn!("descriptor set has no terminator, stopping after block {lba}");
                break;
            }
            log::debug!("descriptor {index} lacks standard identifier, skipping");
            continue;
        }
        misses = 0;

        match descriptor_type(&buffer) {
            VolumeDescriptorType::Primary => {
                if primary.is_some() {
                    log::warn!("additional primary volume descriptor {index} ignored");
                } else {
                    primary = Some(VolumeDescriptor::parse(&buffer)?);
                }
            }
            VolumeDescriptorType::Supplementary => {
                if primary.is_none() {
                    return Err(IsoFsError::corrupt(
                        "supplementary volume descriptor precedes the primary",
                    ));
                }
                match VolumeDescriptor::parse(&buffer) {
                    Ok(descriptor) => supplementary.push(descriptor),
                    Err(e) => log::warn!("supplementary volume descriptor {index} skipped: {e}"),
                }
            }
            VolumeDescriptorType::Terminator => {
                log::debug!("descriptor set terminator at block {lba}");
                break;
            }
            other => log::debug!("skipping volume descriptor {index} of type {other:?}"),
        }
    }

    let primary = primary.ok_or(IsoFsError::NoPrimaryDescriptor)?;
    Ok(DescriptorSet {
        primary,
        supplementary,
    })
}

/// Does the "." record of the directory at `root` start with an SP entry?
///
/// Unreadable or malformed roots count as lacking Rock Ridge.
fn check_rock_ridge<R: Read + Seek>(reader: &mut ImageReader<R>, root: &DirectoryRecord) -> bool {
    let mut buffer = vec![0u8; reader.geometry().data_size];
    let len = match reader.read_block(root.extent as u64, &mut buffer) {
        Ok(len) => len,
        Err(e) => {
            log::debug!("cannot read root directory at block {}: {e}", root.extent);
            return false;
        }
    };
    match RecordView::parse(&buffer[..len]) {
        Ok(dot) if dot.name().len() == 1 => find_sp(dot.system_use()).is_some(),
        Ok(_) => {
            log::warn!("root directory at block {} does not start with \".\"", root.extent);
            false
        }
        Err(e) => {
            log::warn!("root directory at block {}: {e}", root.extent);
            false
        }
    }
}
