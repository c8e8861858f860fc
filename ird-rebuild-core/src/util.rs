//! Primitive I/O helpers shared by the decoder, verifier and rebuilder.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::RebuildError;

pub const CHUNK_SIZE: usize = 64 * 1024; // 64 KB

/// Decode an on-disc UTF-16BE identifier to UTF-8.
///
/// Decoding stops at the first NUL word; a trailing odd byte is ignored
/// (the root directory identifier is a single zero byte).
pub fn utf16be_to_utf8(raw: &[u8]) -> Result<String, RebuildError> {
    let mut words = Vec::with_capacity(raw.len() / 2);
    for pair in raw.chunks_exact(2) {
        let word = u16::from_be_bytes([pair[0], pair[1]]);
        if word == 0 {
            break;
        }
        words.push(word);
    }
    String::from_utf16(&words).map_err(|_| RebuildError::encoding("invalid UTF-16 identifier"))
}

/// Compute the MD5 digest of a whole file, streamed in 64 KB chunks.
pub fn md5_file(path: &Path) -> Result<[u8; 16], RebuildError> {
    let mut file = File::open(path)?;
    let mut ctx = md5::Context::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        ctx.consume(&buf[..n]);
    }
    Ok(ctx.compute().0)
}

/// Copy up to `limit` bytes from `reader` to `writer`, returning the number
/// of bytes moved. A source that ends early is not an error here; callers
/// that need an exact count check the return value.
pub fn copy_stream(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    limit: u64,
) -> Result<u64, RebuildError> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total: u64 = 0;

    while total < limit {
        let want = (limit - total).min(CHUNK_SIZE as u64) as usize;
        let n = reader.read(&mut buf[..want])?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
    Ok(total)
}

/// Write `count` zero bytes to `writer`.
pub fn write_zeros(writer: &mut dyn Write, count: u64) -> Result<(), RebuildError> {
    if count == 0 {
        return Ok(());
    }
    let zeros = vec![0u8; CHUNK_SIZE];
    let mut remaining = count;

    while remaining > 0 {
        let n = remaining.min(CHUNK_SIZE as u64) as usize;
        writer.write_all(&zeros[..n])?;
        remaining -= n as u64;
    }
    Ok(())
}

/// Per-title working directory for decompressed IRD artifacts.
///
/// Keyed by the SFO content signature so two different titles never share
/// artifact names (`header.bin` etc.).
pub fn session_tmp_dir(signature: u32) -> Result<PathBuf, RebuildError> {
    let dir = std::env::temp_dir()
        .join("ird_rebuild")
        .join(format!("{signature:08X}"));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[cfg(test)]
#[path = "tests/util_tests.rs"]
mod tests;
