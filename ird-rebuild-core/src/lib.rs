//! Rebuilds PS3 disc images from extracted dump trees and IRD archives.
//!
//! An IRD archive preserves everything of the original disc that the dumped
//! file tree does not: the ISO 9660 header and footer byte ranges, per-file
//! MD5 checksums, and the disc authentication data. This crate decodes the
//! archive, walks the ECMA-119 structures in the preserved header, verifies
//! the dump against the checksum table and lays the image back out byte for
//! byte.

pub mod error;
pub mod ird;
pub mod iso;
pub mod net;
pub mod rebuild;
pub mod sfo;
pub mod util;
pub mod verify;

pub use error::RebuildError;
pub use ird::{IrdFile, load_ird};
pub use iso::{DiscSource, FileState};
pub use rebuild::rebuild_iso;
pub use sfo::{SFO_REL_PATH, SfoSummary, load_sfo};
pub use verify::{VerifyReport, verify_dump};

/// Flat listing of a disc's contents, decoded from an archive's header
/// range.
#[derive(Debug, Default)]
pub struct DiscListing {
    pub directories: Vec<String>,
    /// Starting block and relative path of every file.
    pub files: Vec<(u32, String)>,
}

/// Enumerate the directories and files an archive's disc contains.
pub fn disc_listing(ird: &IrdFile) -> Result<DiscListing, RebuildError> {
    let mut source = DiscSource::open(&ird.header_path, &ird.footer_path)?;
    let dirs = source.build_dir_table()?;
    let files = source.build_file_table(&dirs, ird.file_hashes.len() * 2)?;

    let mut listing = DiscListing::default();
    for (_, dir) in dirs.in_block_order() {
        if !dir.name.is_empty() {
            listing.directories.push(dir.name.clone());
        }
    }
    for record in files.in_block_order() {
        if record.is_lead() {
            listing
                .files
                .push((record.block_offset, iso::build_path(&dirs, record)?));
        }
    }
    Ok(listing)
}

#[cfg(test)]
pub(crate) mod testutil;

#[cfg(test)]
#[path = "tests/listing_tests.rs"]
mod tests;
