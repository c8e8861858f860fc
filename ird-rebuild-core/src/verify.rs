//! Dump verification: pair the decoded file table with the IRD checksum
//! table, then check the extracted dump tree against it.

use std::path::Path;

use crate::error::RebuildError;
use crate::ird::{FileHash, IrdFile};
use crate::iso::{self, DirTable, DiscSource, FileState, FileTable};
use crate::util;

/// Outcome of a verification run.
#[derive(Debug, Default)]
pub struct VerifyReport {
    pub all_verified: bool,
    /// Relative path and terminal state of every file that did not verify.
    pub issues: Vec<(String, FileState)>,
    /// Number of lead records checked.
    pub checked: usize,
}

/// Attach the IRD checksum table to the decoded file table.
///
/// Both sides are ordered by starting block, so the pairing is positional
/// over lead records; each pair's sector and block offset must agree, and
/// neither side may have entries left over.
pub fn attach_checksums(
    files: &mut FileTable,
    hashes: &[FileHash],
) -> Result<(), RebuildError> {
    let leads: Vec<usize> = files
        .order()
        .iter()
        .copied()
        .filter(|&i| files.get(i).is_lead())
        .collect();

    if leads.len() != hashes.len() {
        return Err(RebuildError::violation(format!(
            "archive lists {} file hashes but the disc has {} files",
            hashes.len(),
            leads.len()
        )));
    }

    for (&index, entry) in leads.iter().zip(hashes) {
        let record = files.get_mut(index);
        if record.block_offset as u64 != entry.sector {
            return Err(RebuildError::violation(format!(
                "checksum entry for sector {} paired with '{}' at block {}",
                entry.sector, record.name, record.block_offset
            )));
        }
        record.expected_md5 = Some(entry.hash);
    }
    Ok(())
}

/// Verify an extracted dump tree against a decoded IRD archive.
pub fn verify_dump(ird: &IrdFile, dump_root: &Path) -> Result<VerifyReport, RebuildError> {
    let mut source = DiscSource::open(&ird.header_path, &ird.footer_path)?;
    let dirs = source.build_dir_table()?;
    // Continuation records of multi-extent files need their own table slots.
    let mut files = source.build_file_table(&dirs, ird.file_hashes.len() * 2)?;
    attach_checksums(&mut files, &ird.file_hashes)?;
    verify_files(&dirs, &mut files, dump_root)
}

/// Check every lead record's backing file on disk and classify it.
pub fn verify_files(
    dirs: &DirTable,
    files: &mut FileTable,
    dump_root: &Path,
) -> Result<VerifyReport, RebuildError> {
    let mut report = VerifyReport {
        all_verified: true,
        ..VerifyReport::default()
    };

    for index in files.order().to_vec() {
        if !files.get(index).is_lead() {
            continue;
        }
        let relative = iso::build_path(dirs, files.get(index))?;
        let state = classify(files.get(index), &dump_root.join(&relative))?;
        files.get_mut(index).state = state;
        report.checked += 1;

        if state != FileState::Verified {
            log::warn!("{relative}: {}", state.describe());
            report.all_verified = false;
            report.issues.push((relative, state));
        } else {
            log::debug!("{relative}: verified");
        }
    }
    Ok(report)
}

fn classify(record: &iso::FileRecord, path: &Path) -> Result<FileState, RebuildError> {
    let meta = match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta,
        _ => return Ok(FileState::Missing),
    };
    if meta.len() != record.total_length {
        return Ok(FileState::SizeMismatch);
    }
    if let Some(expected) = record.expected_md5
        && util::md5_file(path)? != expected
    {
        return Ok(FileState::ChecksumMismatch);
    }
    Ok(FileState::Verified)
}

#[cfg(test)]
#[path = "tests/verify_tests.rs"]
mod tests;
