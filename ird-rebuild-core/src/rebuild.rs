//! Image reconstruction: lay the header range, every file extent and the
//! footer range back out at their original byte positions.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::RebuildError;
use crate::ird::IrdFile;
use crate::iso::{self, DiscSource};
use crate::util;

/// Rebuild a disc image from an extracted dump tree.
///
/// The output starts with the archive's header range, continues with every
/// extent's data at `block_offset * block_size` (zero fill between extents),
/// and ends with the footer range appended directly after the last extent.
pub fn rebuild_iso(
    ird: &IrdFile,
    dump_root: &Path,
    out_path: &Path,
) -> Result<(), RebuildError> {
    let mut source = DiscSource::open(&ird.header_path, &ird.footer_path)?;
    let dirs = source.build_dir_table()?;
    let files = source.build_file_table(&dirs, ird.file_hashes.len() * 2)?;
    let block_size = source.descriptor().block_size as u64;

    let mut out = BufWriter::new(File::create(out_path)?);
    let mut position: u64 = 0;

    source.header.seek(SeekFrom::Start(0))?;
    position += util::copy_stream(&mut source.header, &mut out, u64::MAX)?;
    log::debug!("header range: {position} bytes");

    for record in files.in_block_order() {
        let target = record.block_offset as u64 * block_size;
        if position > target {
            return Err(RebuildError::violation(format!(
                "extent of '{}' at block {} overlaps data already written",
                record.name, record.block_offset
            )));
        }
        util::write_zeros(&mut out, target - position)?;
        position = target;

        let relative = iso::build_path(&dirs, record)?;
        let mut input = File::open(dump_root.join(&relative))?;
        input.seek(SeekFrom::Start(record.file_offset))?;
        let copied = util::copy_stream(&mut input, &mut out, record.extent_length as u64)?;
        if copied != record.extent_length as u64 {
            return Err(RebuildError::SizeError {
                expected: record.extent_length as u64,
                actual: copied,
            });
        }
        position += copied;
    }

    source.footer.seek(SeekFrom::Start(0))?;
    let footer = util::copy_stream(&mut source.footer, &mut out, u64::MAX)?;
    position += footer;
    out.flush()?;

    log::info!("wrote {position} bytes to {}", out_path.display());
    Ok(())
}

#[cfg(test)]
#[path = "tests/rebuild_tests.rs"]
mod tests;
