//! Raw block reader
//!
//! Translates logical block numbers into byte offsets on the backing image
//! according to the detected [`Geometry`] and reads one logical block at a
//! time. The reader is owned by a mutex in [`crate::volume::Volume`]; the
//! seek and the read that follows it are never interleaved with another
//! caller's.

use crate::volume::geometry::Geometry;
use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};
use std::io::{self, Read, Seek, SeekFrom};

/// Seek to `offset` and fill as much of `buf` as the image holds
///
/// Returns the number of bytes read; fewer than `buf.len()` only at end of
/// file.
pub fn read_full_at<R: Read + Seek>(inner: &mut R, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    inner.seek(SeekFrom::Start(offset))?;
    let mut filled = 0;
    while filled < buf.len() {
        match inner.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Logical block reader over a raw image
pub struct ImageReader<R> {
    inner: R,
    geometry: Geometry,
    block_size: BlockSize,
}

impl<R: Read + Seek> ImageReader<R> {
    /// Wrap `inner`, addressing it with `geometry`
    ///
    /// Fails if the logical block size cannot back a block device.
    pub fn new(inner: R, geometry: Geometry) -> io::Result<Self> {
        let block_size = u32::try_from(geometry.data_size)
            .ok()
            .and_then(BlockSize::new)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unsupported logical block size {}", geometry.data_size),
                )
            })?;
        Ok(Self {
            inner,
            geometry,
            block_size,
        })
    }

    /// Geometry used for address translation
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Read logical block `lba` into the first `data_size` bytes of `buf`
    ///
    /// A block cut short by the end of the image is returned partially
    /// (0 bytes past the end); callers decide whether that is acceptable.
    pub fn read_block(&mut self, lba: u64, buf: &mut [u8]) -> io::Result<usize> {
        let data_size = self.geometry.data_size;
        let dst = buf.get_mut(..data_size).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "buffer smaller than a logical block")
        })?;
        let offset = self.geometry.block_position(lba).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("block {lba} out of range"))
        })?;
        let len = read_full_at(&mut self.inner, offset, dst)?;
        if len < data_size {
            log::trace!("short read of block {lba}: {len} of {data_size} bytes");
        }
        Ok(len)
    }

    /// Give back the backing image
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> BlockIo for ImageReader<R> {
    type Error = io::Error;

    fn block_size(&self) -> BlockSize {
        self.block_size
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        let len = self.inner.seek(SeekFrom::End(0))?;
        let start = self.geometry.file_offset + self.geometry.block_offset;
        // a trailing partial block still holds readable data
        Ok(len.saturating_sub(start).div_ceil(self.geometry.block_size))
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Self::Error> {
        let data_size = self.geometry.data_size;
        if dst.len() % data_size != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "buffer is not a whole number of blocks",
            ));
        }
        for (i, chunk) in dst.chunks_exact_mut(data_size).enumerate() {
            let lba = start_lba.0 + i as u64;
            let len = self.read_block(lba, chunk)?;
            if len == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("block {lba} is past the end of the image"),
                ));
            }
            // images are often truncated right after the last used byte
            chunk[len..].fill(0);
        }
        Ok(())
    }

    fn write_blocks(&mut self, _start_lba: Lba, _src: &[u8]) -> Result<(), Self::Error> {
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "ISO9660 images are read-only",
        ))
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
