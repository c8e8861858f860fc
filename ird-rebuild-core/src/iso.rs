//! ECMA-119 (ISO 9660) structure decoding.
//!
//! Parses the primary volume descriptor, the path table and the directory
//! extents out of the reconstructed disc header range, producing the
//! directory and file tables shared by verification and rebuilding.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::RebuildError;
use crate::util;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Byte offset of the usable volume descriptor within the header range.
/// PS3 discs describe their filesystem in the descriptor at sector 17
/// (0x8800 with 2048-byte blocks).
pub const PVD_OFFSET: u64 = 0x8800;

/// Fixed capacity of the directory table.
pub const MAX_DIRECTORIES: usize = 0x1000;

/// Fixed capacity for reconstructed relative paths, in bytes.
pub const MAX_PATH_LEN: usize = 4096;

/// Size of a volume descriptor.
const VOL_DESC_SIZE: usize = 2048;

/// Fixed prefix of an on-disc directory record, before the identifier.
const DIR_RECORD_PREFIX: usize = 33;

/// Fixed prefix of an on-disc path table record, before the identifier.
const PATH_RECORD_PREFIX: usize = 8;

const FLAG_DIRECTORY: u8 = 0x02;
const FLAG_CONTINUES: u8 = 0x80;

// ---------------------------------------------------------------------------
// Field decoding
// ---------------------------------------------------------------------------

/// Decode the little-endian half of an ECMA-119 multi-byte field.
pub fn ecma_u32(raw: &[u8]) -> u32 {
    u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])
}

pub fn ecma_u16(raw: &[u8]) -> u16 {
    u16::from_le_bytes([raw[0], raw[1]])
}

// ---------------------------------------------------------------------------
// Data model
// ---------------------------------------------------------------------------

/// Parsed volume descriptor fields, immutable for the decode session.
#[derive(Debug, Clone)]
pub struct VolumeDescriptor {
    /// Total volume size in blocks (kept for sanity checks only).
    pub volume_size: u32,
    pub block_size: u16,
    pub path_table_size: u32,
    pub path_table_location: u32,
}

/// Verification classification for one file record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileState {
    /// Unset; never a terminal state after a verification run.
    #[default]
    Empty,
    Missing,
    SizeMismatch,
    ChecksumMismatch,
    Verified,
}

impl FileState {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Empty => "",
            Self::Missing => "Missing",
            Self::SizeMismatch => "Size Mismatch",
            Self::ChecksumMismatch => "Checksum Mismatch",
            Self::Verified => "Verified",
        }
    }
}

/// One decoded path table record (a directory).
#[derive(Debug, Clone)]
pub struct PathTableRecord {
    pub block_offset: u32,
    /// Index of the parent entry in the owning [`DirTable`]. The root entry
    /// references itself.
    pub parent: usize,
    /// On-disc record length: fixed prefix plus the identifier, padded to an
    /// even byte count.
    pub record_length: u16,
    pub name: String,
}

/// One decoded directory record (a file extent).
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub block_offset: u32,
    /// Length in bytes of this extent's data.
    pub extent_length: u32,
    /// Sum of all extent lengths; meaningful on lead records only.
    pub total_length: u64,
    /// Byte offset of this extent's data within the logical file; zero on
    /// lead records.
    pub file_offset: u64,
    pub record_length: u8,
    pub flags: u8,
    /// Index of the parent directory in the session's [`DirTable`].
    pub parent: usize,
    /// Index of the lead record in the owning [`FileTable`] when this record
    /// continues an earlier extent.
    pub lead: Option<usize>,
    pub name: String,
    /// Expected MD5 digest, attached from the IRD file checksum table.
    pub expected_md5: Option<[u8; 16]>,
    pub state: FileState,
}

impl FileRecord {
    pub fn is_directory(&self) -> bool {
        self.flags & FLAG_DIRECTORY != 0
    }

    /// True when the file's data continues in a following extent record.
    pub fn continues(&self) -> bool {
        self.flags & FLAG_CONTINUES != 0
    }

    pub fn is_lead(&self) -> bool {
        self.lead.is_none()
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Insertion-ordered arena of path table records plus a block-sorted view.
///
/// Entries never move once pushed, so parent indices stay valid after the
/// table is sorted.
#[derive(Debug, Default)]
pub struct DirTable {
    entries: Vec<PathTableRecord>,
    order: Vec<usize>,
}

impl DirTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> &PathTableRecord {
        &self.entries[index]
    }

    fn push(&mut self, record: PathTableRecord) -> Result<usize, RebuildError> {
        if self.entries.len() >= MAX_DIRECTORIES {
            return Err(RebuildError::TableOverflow {
                table: "directory",
                max: MAX_DIRECTORIES,
            });
        }
        let index = self.entries.len();
        self.entries.push(record);
        self.order.push(index);
        Ok(index)
    }

    pub fn sort_by_block(&mut self) {
        self.order.sort_by_key(|&i| self.entries[i].block_offset);
    }

    /// Entries in ascending block order, with their arena indices.
    pub fn in_block_order(&self) -> impl Iterator<Item = (usize, &PathTableRecord)> {
        self.order.iter().map(move |&i| (i, &self.entries[i]))
    }
}

/// Insertion-ordered arena of file records with a caller-supplied capacity
/// and a block-sorted view.
#[derive(Debug)]
pub struct FileTable {
    entries: Vec<FileRecord>,
    order: Vec<usize>,
    capacity: usize,
}

impl FileTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            order: Vec::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> &FileRecord {
        &self.entries[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut FileRecord {
        &mut self.entries[index]
    }

    fn push(&mut self, record: FileRecord) -> Result<usize, RebuildError> {
        if self.entries.len() >= self.capacity {
            return Err(RebuildError::TableOverflow {
                table: "file",
                max: self.capacity,
            });
        }
        let index = self.entries.len();
        self.entries.push(record);
        self.order.push(index);
        Ok(index)
    }

    pub fn sort_by_block(&mut self) {
        self.order.sort_by_key(|&i| self.entries[i].block_offset);
    }

    /// Arena indices in ascending block order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Records in ascending block order, continuations included.
    pub fn in_block_order(&self) -> impl Iterator<Item = &FileRecord> {
        self.order.iter().map(move |&i| &self.entries[i])
    }
}

// ---------------------------------------------------------------------------
// Decode session
// ---------------------------------------------------------------------------

/// An open decode session over the reconstructed header and footer ranges.
pub struct DiscSource {
    pub(crate) header: File,
    pub(crate) footer: File,
    desc: VolumeDescriptor,
}

impl DiscSource {
    /// Open both byte ranges and parse the volume descriptor.
    pub fn open(header_path: &Path, footer_path: &Path) -> Result<Self, RebuildError> {
        let mut header = File::open(header_path)?;
        let footer = File::open(footer_path)?;
        let desc = read_volume_descriptor(&mut header, PVD_OFFSET)?;
        log::debug!(
            "volume: {} blocks of {} bytes, path table {} bytes at block {}",
            desc.volume_size,
            desc.block_size,
            desc.path_table_size,
            desc.path_table_location
        );
        Ok(Self {
            header,
            footer,
            desc,
        })
    }

    pub fn descriptor(&self) -> &VolumeDescriptor {
        &self.desc
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), RebuildError> {
        self.header.seek(SeekFrom::Start(offset))?;
        self.header.read_exact(buf)?;
        Ok(())
    }

    /// Decode one path table record; returns the record and its raw 1-based
    /// parent index (resolved by the caller against the table under
    /// construction).
    fn read_path_record(&mut self, offset: u64) -> Result<(PathTableRecord, u16), RebuildError> {
        let mut prefix = [0u8; PATH_RECORD_PREFIX];
        self.read_at(offset, &mut prefix)?;

        let name_length = prefix[0] as usize;
        let block_offset = ecma_u32(&prefix[2..6]);
        let parent_idx = ecma_u16(&prefix[6..8]);

        let mut record_length = (PATH_RECORD_PREFIX + name_length) as u16;
        if record_length % 2 != 0 {
            record_length += 1;
        }

        let mut raw_name = vec![0u8; name_length];
        self.read_at(offset + PATH_RECORD_PREFIX as u64, &mut raw_name)?;
        let name = util::utf16be_to_utf8(&raw_name)?;

        Ok((
            PathTableRecord {
                block_offset,
                parent: 0,
                record_length,
                name,
            },
            parent_idx,
        ))
    }

    /// Decode one directory record at an absolute header offset.
    ///
    /// Returns [`RebuildError::RecordFit`] when the record's fixed prefix
    /// would straddle a block boundary or its length field is zero — the
    /// caller retries at the next block boundary.
    fn read_dir_record(&mut self, offset: u64) -> Result<FileRecord, RebuildError> {
        let block_size = self.desc.block_size as u64;
        let start_block = offset / block_size;
        let end_block = (offset + DIR_RECORD_PREFIX as u64 - 1) / block_size;
        if start_block != end_block {
            return Err(RebuildError::RecordFit { offset });
        }

        let mut prefix = [0u8; DIR_RECORD_PREFIX];
        self.read_at(offset, &mut prefix)?;

        let record_length = prefix[0];
        if record_length == 0 {
            return Err(RebuildError::RecordFit { offset });
        }

        let block_offset = ecma_u32(&prefix[2..6]);
        let extent_length = ecma_u32(&prefix[10..14]);
        let flags = prefix[25];
        let name_length = prefix[32] as usize;

        let mut raw_name = vec![0u8; name_length];
        self.read_at(offset + DIR_RECORD_PREFIX as u64, &mut raw_name)?;
        let name = util::utf16be_to_utf8(&raw_name)?;

        Ok(FileRecord {
            block_offset,
            extent_length,
            total_length: 0,
            file_offset: 0,
            record_length,
            flags,
            parent: 0,
            lead: None,
            name,
            expected_md5: None,
            state: FileState::Empty,
        })
    }

    /// Walk the path table and build the directory table, sorted by block
    /// offset.
    pub fn build_dir_table(&mut self) -> Result<DirTable, RebuildError> {
        let block_size = self.desc.block_size as u64;
        let mut offset = self.desc.path_table_location as u64 * block_size;
        let end = offset + self.desc.path_table_size as u64;

        let mut table = DirTable::default();
        while offset < end {
            let (mut record, parent_idx) = self.read_path_record(offset)?;
            let next = table.len();
            record.parent = match parent_idx as usize {
                // Index 0 is reserved for "no parent"; like the on-disc
                // self-reference of the root, it resolves to the entry
                // itself.
                0 => next,
                idx if idx - 1 <= next => idx - 1,
                idx => {
                    return Err(RebuildError::violation(format!(
                        "path table entry {next} references undecoded parent {idx}"
                    )));
                }
            };
            offset += record.record_length as u64;
            table.push(record)?;
        }

        table.sort_by_block();
        log::debug!("decoded {} directories", table.len());
        Ok(table)
    }

    /// Scan every directory's extent and build the file table, sorted by
    /// block offset. Continuation records of multi-extent files occupy their
    /// own slots, so `max_files` must budget for them.
    pub fn build_file_table(
        &mut self,
        dirs: &DirTable,
        max_files: usize,
    ) -> Result<FileTable, RebuildError> {
        let mut files = FileTable::with_capacity(max_files);
        let dir_indices: Vec<usize> = dirs.in_block_order().map(|(i, _)| i).collect();
        for dir_index in dir_indices {
            self.scan_directory(dirs, dir_index, &mut files)?;
        }
        files.sort_by_block();
        log::debug!("decoded {} file records", files.len());
        Ok(files)
    }

    fn scan_directory(
        &mut self,
        dirs: &DirTable,
        dir_index: usize,
        files: &mut FileTable,
    ) -> Result<(), RebuildError> {
        let block_size = self.desc.block_size as u64;
        let dir = dirs.get(dir_index);

        // The directory's own descriptor record gives the extent length of
        // its listing.
        let own = self.read_dir_record(dir.block_offset as u64 * block_size)?;
        let mut offset = own.block_offset as u64 * block_size;
        let end = offset + own.extent_length as u64;

        while offset < end {
            let mut record = match self.read_dir_record(offset) {
                Err(RebuildError::RecordFit { .. }) => {
                    // Out of records in this block; the next one starts on
                    // the following block boundary.
                    offset += block_size - (offset % block_size);
                    continue;
                }
                other => other?,
            };

            if record.is_directory() {
                offset += record.record_length as u64;
                continue;
            }

            record.parent = dir_index;
            record.total_length = record.extent_length as u64;
            trim_version_suffix(&mut record.name)?;

            let record_length = record.record_length as u64;
            let continues = record.continues();
            let lead = files.push(record)?;
            offset += record_length;

            if continues {
                offset = self.chain_extents(dir_index, lead, offset, files)?;
            }
        }
        Ok(())
    }

    /// Collect the continuation records of a multi-extent file, starting
    /// immediately after the lead record's bytes. The final record of the
    /// chain is the first one without the continue flag.
    fn chain_extents(
        &mut self,
        dir_index: usize,
        lead: usize,
        mut offset: u64,
        files: &mut FileTable,
    ) -> Result<u64, RebuildError> {
        let block_size = self.desc.block_size as u64;
        let mut relative = files.get(lead).extent_length as u64;
        let mut prev = lead;

        loop {
            let mut record = match self.read_dir_record(offset) {
                Err(RebuildError::RecordFit { .. }) => {
                    offset += block_size - (offset % block_size);
                    continue;
                }
                other => other?,
            };

            // Each extent's data begins exactly where the previous extent's
            // blocks end.
            let prev_record = files.get(prev);
            let expected = prev_record.block_offset as u64
                + (prev_record.extent_length as u64).div_ceil(block_size);
            if record.block_offset as u64 != expected {
                return Err(RebuildError::violation(format!(
                    "extent of '{}' starts at block {} instead of {}",
                    files.get(lead).name,
                    record.block_offset,
                    expected
                )));
            }

            record.parent = dir_index;
            record.lead = Some(lead);
            record.file_offset = relative;
            trim_version_suffix(&mut record.name)?;

            relative += record.extent_length as u64;
            files.get_mut(lead).total_length += record.extent_length as u64;
            offset += record.record_length as u64;

            let continues = record.continues();
            prev = files.push(record)?;
            if !continues {
                break;
            }
        }
        Ok(offset)
    }
}

fn read_volume_descriptor(
    header: &mut File,
    position: u64,
) -> Result<VolumeDescriptor, RebuildError> {
    header.seek(SeekFrom::Start(position))?;
    let mut raw = [0u8; VOL_DESC_SIZE];
    header.read_exact(&mut raw)?;

    if &raw[1..6] != b"CD001" {
        return Err(RebuildError::invalid_format(
            "missing CD001 signature in volume descriptor",
        ));
    }

    Ok(VolumeDescriptor {
        volume_size: ecma_u32(&raw[80..84]),
        block_size: ecma_u16(&raw[128..130]),
        path_table_size: ecma_u32(&raw[132..136]),
        path_table_location: ecma_u32(&raw[140..144]),
    })
}

/// Drop the two-byte on-disc version suffix (`;1`) from a file identifier.
fn trim_version_suffix(name: &mut String) -> Result<(), RebuildError> {
    if name.len() < 2 || !name.is_char_boundary(name.len() - 2) {
        return Err(RebuildError::violation(format!(
            "file identifier '{name}' lacks a version suffix"
        )));
    }
    name.truncate(name.len() - 2);
    Ok(())
}

// ---------------------------------------------------------------------------
// Path resolution
// ---------------------------------------------------------------------------

/// Reconstruct a file record's slash-separated relative path, root to leaf.
pub fn build_path(dirs: &DirTable, record: &FileRecord) -> Result<String, RebuildError> {
    let mut stack = Vec::new();
    let mut total = record.name.len();
    let mut cursor = record.parent;
    let mut steps = 0usize;

    while dirs.get(cursor).parent != cursor {
        let dir = dirs.get(cursor);
        total += dir.name.len() + 1;
        if total > MAX_PATH_LEN {
            return Err(RebuildError::PathOverflow { max: MAX_PATH_LEN });
        }
        stack.push(cursor);
        cursor = dir.parent;

        // Table construction only accepts backward parent references, so
        // this bound is never hit for a table built by build_dir_table.
        steps += 1;
        if steps > MAX_DIRECTORIES {
            return Err(RebuildError::violation(
                "directory parent chain does not terminate",
            ));
        }
    }
    if total > MAX_PATH_LEN {
        return Err(RebuildError::PathOverflow { max: MAX_PATH_LEN });
    }

    let mut path = String::with_capacity(total);
    for &index in stack.iter().rev() {
        path.push_str(&dirs.get(index).name);
        path.push('/');
    }
    path.push_str(&record.name);
    Ok(path)
}

#[cfg(test)]
#[path = "tests/iso_tests.rs"]
mod tests;
