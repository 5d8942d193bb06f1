//! ISO9660 extensions (SUSP, Rock Ridge)

pub mod rock_ridge;
pub mod susp;

use crate::directory::record::{DirectoryRecord, RecordView};
use crate::error::{IsoFsError, Result};
use crate::volume::Volume;
use rock_ridge::RockRidge;
use std::io::{Read, Seek};
use susp::ContinuationArea;

enum Pending {
    Continuation(ContinuationArea),
    Relocation(u32),
}

/// Decode the system use area of `record`, following CE and CL entries
///
/// A CL entry replaces `record` with the "." record of the relocated
/// directory and decodes that record's own entries as well. Continuation
/// areas beyond the configured limit are ignored; relocations beyond it
/// fail with [`IsoFsError::Corrupt`].
pub fn load<R: Read + Seek>(
    volume: &Volume<R>,
    record: &mut DirectoryRecord,
    system_use: &[u8],
) -> Result<RockRidge> {
    let options = volume.options();
    let mut rock_ridge = RockRidge::default();
    let mut pending = Vec::new();
    let mut continuations = 0;
    let mut relocations = 0;

    let mut span = system_use.to_vec();
    loop {
        let outcome = rock_ridge.parse_span(&span, volume.susp(), volume.data_size())?;
        // relocations are resolved before the rest of the current record
        if let Some(area) = outcome.continuation {
            pending.push(Pending::Continuation(area));
        }
        if let Some(block) = outcome.relocation {
            pending.push(Pending::Relocation(block));
        }

        span = match pending.pop() {
            None => break,
            Some(Pending::Continuation(area)) => {
                continuations += 1;
                if continuations > options.max_continuation_areas {
                    log::warn!("more than {} continuation areas, ignoring the rest", options.max_continuation_areas);
                    Vec::new()
                } else {
                    volume.read_span(area.extent, area.offset as u64, area.size as usize)?
                }
            }
            Some(Pending::Relocation(block)) => {
                relocations += 1;
                if relocations > options.max_relocation_depth {
                    return Err(IsoFsError::corrupt(format!(
                        "relocated directory chain deeper than {}",
                        options.max_relocation_depth
                    )));
                }
                let mut buffer = volume.block_buffer();
                let len = volume.read_block(block, &mut buffer)?;
                let dot = RecordView::parse(&buffer[..len])?;
                if dot.name().len() != 1 {
                    return Err(IsoFsError::corrupt(format!(
                        "relocated directory at block {block} does not start with \".\""
                    )));
                }
                *record = dot.to_record();
                rock_ridge.child_link = Some(block);
                let skip = volume.susp().skip();
                dot.system_use().get(skip..).unwrap_or(&[]).to_vec()
            }
        };
    }

    rock_ridge.finish();
    Ok(rock_ridge)
}
