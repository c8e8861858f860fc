//! IRD archive container decoding.
//!
//! An IRD archive is a gzip stream wrapping a packed record: identification
//! fields, two length-prefixed gzip blobs holding the disc's header and
//! footer byte ranges, the region and file checksum tables, and an opaque
//! disc-authentication trailer.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::error::RebuildError;

pub const IRD_MAGIC: [u8; 4] = *b"3IRD";

/// Size of the disc permanent information & control block in the trailer.
pub const PIC_SIZE: usize = 0x73;

/// Size of each opaque authentication field in the trailer.
pub const OPAQUE_SIZE: usize = 0x10;

/// Total trailer size: PIC plus two opaque fields.
pub const DISC_DT_SIZE: usize = PIC_SIZE + 2 * OPAQUE_SIZE;

/// One entry of the file checksum table.
#[derive(Debug, Clone, Copy)]
pub struct FileHash {
    /// Starting sector of the file's lead extent.
    pub sector: u64,
    pub hash: [u8; 16],
}

/// Order of the fields inside the disc-authentication trailer, which changed
/// between archive versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrailerLayout {
    /// PIC precedes the opaque fields (version 9).
    PicFirst,
    /// PIC follows the opaque fields (versions 6 to 8).
    PicLast,
}

impl TrailerLayout {
    fn for_version(version: u8) -> Self {
        if version == 9 {
            Self::PicFirst
        } else {
            Self::PicLast
        }
    }
}

/// A fully decoded IRD archive. The compressed disc ranges are materialized
/// as plain files under the session's working directory.
#[derive(Debug)]
pub struct IrdFile {
    pub version: u8,
    pub title_id: String,
    pub title: String,
    pub system_version: String,
    pub disc_version: String,
    pub app_version: String,
    /// Decompressed disc header range on disk.
    pub header_path: PathBuf,
    /// Decompressed disc footer range on disk.
    pub footer_path: PathBuf,
    pub region_hashes: Vec<[u8; 16]>,
    pub file_hashes: Vec<FileHash>,
    pub pic: [u8; PIC_SIZE],
    pub data1: [u8; OPAQUE_SIZE],
    pub data2: [u8; OPAQUE_SIZE],
    pub uid: u32,
    pub crc: u32,
}

// ---------------------------------------------------------------------------
// Field readers
// ---------------------------------------------------------------------------

fn read_exact(reader: &mut impl Read, buf: &mut [u8]) -> Result<(), RebuildError> {
    reader.read_exact(buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => RebuildError::Truncated {
            expected: buf.len() as u64,
        },
        _ => RebuildError::Io(err),
    })
}

fn read_u8(reader: &mut impl Read) -> Result<u8, RebuildError> {
    let mut buf = [0u8; 1];
    read_exact(reader, &mut buf)?;
    Ok(buf[0])
}

fn read_u32(reader: &mut impl Read) -> Result<u32, RebuildError> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(reader: &mut impl Read) -> Result<u64, RebuildError> {
    let mut buf = [0u8; 8];
    read_exact(reader, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a fixed-width text field, trimming trailing NUL padding.
fn read_fixed_string(reader: &mut impl Read, width: usize) -> Result<String, RebuildError> {
    let mut buf = vec![0u8; width];
    read_exact(reader, &mut buf)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(width);
    String::from_utf8(buf[..end].to_vec())
        .map_err(|_| RebuildError::encoding("non-UTF-8 text field in archive"))
}

/// Extract one length-prefixed gzip blob to `<tmp>/<name>.bin`.
///
/// The blob is itself compressed inside the outer archive stream, so the
/// bytes pass through two gzip layers: the declared count of inner-blob
/// bytes is read through the outer decoder into a stage-one file, which is
/// then decompressed a second time into the final byte range.
fn read_compressed_range(
    reader: &mut impl Read,
    tmp_dir: &Path,
    name: &str,
) -> Result<PathBuf, RebuildError> {
    let length = read_u32(reader)? as usize;
    let mut blob = vec![0u8; length];
    read_exact(reader, &mut blob)?;

    let stage_path = tmp_dir.join(format!("{name}.binu"));
    File::create(&stage_path)?.write_all(&blob)?;

    let out_path = tmp_dir.join(format!("{name}.bin"));
    let mut decoder = GzDecoder::new(blob.as_slice());
    let mut out = File::create(&out_path)?;
    io::copy(&mut decoder, &mut out).map_err(|err| {
        RebuildError::compressed(format!("{name} range is not a valid gzip stream: {err}"))
    })?;

    Ok(out_path)
}

// ---------------------------------------------------------------------------
// Archive decoding
// ---------------------------------------------------------------------------

/// Decode an IRD archive, extracting the disc header and footer ranges into
/// `tmp_dir`.
pub fn load_ird(ird_path: &Path, tmp_dir: &Path) -> Result<IrdFile, RebuildError> {
    let archive = File::open(ird_path)?;
    let mut reader = GzDecoder::new(archive);

    let mut magic = [0u8; 4];
    read_exact(&mut reader, &mut magic)?;
    if magic != IRD_MAGIC {
        return Err(RebuildError::invalid_format(
            "missing 3IRD signature; not an IRD archive",
        ));
    }

    let version = read_u8(&mut reader)?;
    if !(6..=9).contains(&version) {
        return Err(RebuildError::invalid_format(format!(
            "unsupported archive version {version}"
        )));
    }

    let title_id = read_fixed_string(&mut reader, 9)?;
    let title_len = read_u8(&mut reader)? as usize;
    let title = read_fixed_string(&mut reader, title_len)?;
    let system_version = read_fixed_string(&mut reader, 4)?;
    let disc_version = read_fixed_string(&mut reader, 5)?;
    let app_version = read_fixed_string(&mut reader, 5)?;

    // Version 7 carries four reserved bytes here.
    if version == 7 {
        let mut pad = [0u8; 4];
        read_exact(&mut reader, &mut pad)?;
    }

    let header_path = read_compressed_range(&mut reader, tmp_dir, "header")?;
    let footer_path = read_compressed_range(&mut reader, tmp_dir, "footer")?;

    let region_count = read_u8(&mut reader)? as usize;
    let mut region_hashes = Vec::with_capacity(region_count);
    for _ in 0..region_count {
        let mut hash = [0u8; 16];
        read_exact(&mut reader, &mut hash)?;
        region_hashes.push(hash);
    }

    let file_count = read_u32(&mut reader)? as usize;
    let mut file_hashes = Vec::with_capacity(file_count);
    for _ in 0..file_count {
        let sector = read_u64(&mut reader)?;
        let mut hash = [0u8; 16];
        read_exact(&mut reader, &mut hash)?;
        file_hashes.push(FileHash { sector, hash });
    }

    // Four reserved bytes precede the trailer in every version.
    let mut extra = [0u8; 4];
    read_exact(&mut reader, &mut extra)?;

    let mut disc_dt = [0u8; DISC_DT_SIZE];
    read_exact(&mut reader, &mut disc_dt)?;
    let (pic, data1, data2) = split_disc_data(&disc_dt, TrailerLayout::for_version(version));

    let uid = read_u32(&mut reader)?;
    let crc = read_u32(&mut reader)?;

    log::info!(
        "loaded IRD v{version} for {title_id} '{title}' ({} region hashes, {} file hashes)",
        region_hashes.len(),
        file_hashes.len()
    );

    Ok(IrdFile {
        version,
        title_id,
        title,
        system_version,
        disc_version,
        app_version,
        header_path,
        footer_path,
        region_hashes,
        file_hashes,
        pic,
        data1,
        data2,
        uid,
        crc,
    })
}

fn split_disc_data(
    raw: &[u8; DISC_DT_SIZE],
    layout: TrailerLayout,
) -> ([u8; PIC_SIZE], [u8; OPAQUE_SIZE], [u8; OPAQUE_SIZE]) {
    let mut pic = [0u8; PIC_SIZE];
    let mut data1 = [0u8; OPAQUE_SIZE];
    let mut data2 = [0u8; OPAQUE_SIZE];

    match layout {
        TrailerLayout::PicFirst => {
            pic.copy_from_slice(&raw[..PIC_SIZE]);
            data1.copy_from_slice(&raw[PIC_SIZE..PIC_SIZE + OPAQUE_SIZE]);
            data2.copy_from_slice(&raw[PIC_SIZE + OPAQUE_SIZE..]);
        }
        TrailerLayout::PicLast => {
            data1.copy_from_slice(&raw[..OPAQUE_SIZE]);
            data2.copy_from_slice(&raw[OPAQUE_SIZE..2 * OPAQUE_SIZE]);
            pic.copy_from_slice(&raw[2 * OPAQUE_SIZE..]);
        }
    }
    (pic, data1, data2)
}

#[cfg(test)]
#[path = "tests/ird_tests.rs"]
mod tests;
