//! PARAM.SFO parsing.
//!
//! A dump's `PS3_GAME/PARAM.SFO` identifies the title: the fields read here
//! select the matching IRD archive and key the session working directory.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::RebuildError;

/// Location of the parameter file within an extracted dump tree.
pub const SFO_REL_PATH: &str = "PS3_GAME/PARAM.SFO";

const SFO_MAGIC: [u8; 4] = [0, b'P', b'S', b'F'];
const HEADER_SIZE: usize = 20;
const INDEX_ENTRY_SIZE: usize = 16;

/// The identification fields of a title's PARAM.SFO.
#[derive(Debug, Clone)]
pub struct SfoSummary {
    pub title_id: String,
    pub system_version: String,
    pub disc_version: String,
    pub app_version: String,
    /// CRC-32 of the raw identification fields; used to key per-title
    /// working directories and the remote archive lookup.
    pub signature: u32,
}

fn le_u16(raw: &[u8]) -> u16 {
    u16::from_le_bytes([raw[0], raw[1]])
}

fn le_u32(raw: &[u8]) -> u32 {
    u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])
}

/// Copy a data-table value into a fixed-width field, NUL padded.
fn copy_field(dest: &mut [u8], src: &[u8]) {
    let n = dest.len().min(src.len());
    dest[..n].copy_from_slice(&src[..n]);
}

fn trimmed(raw: &[u8]) -> Result<String, RebuildError> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8(raw[..end].to_vec())
        .map_err(|_| RebuildError::encoding("non-UTF-8 parameter value"))
}

/// Parse a PARAM.SFO file into its identification summary.
pub fn load_sfo(path: &Path) -> Result<SfoSummary, RebuildError> {
    let mut raw = Vec::new();
    File::open(path)?.read_to_end(&mut raw)?;
    if raw.len() < HEADER_SIZE || raw[..4] != SFO_MAGIC {
        return Err(RebuildError::invalid_format(
            "missing PSF signature; not a PARAM.SFO file",
        ));
    }

    let key_table_start = le_u32(&raw[8..12]) as usize;
    let data_table_start = le_u32(&raw[12..16]) as usize;
    let entries = le_u32(&raw[16..20]) as usize;

    let index_end = HEADER_SIZE + entries * INDEX_ENTRY_SIZE;
    if index_end > raw.len() || key_table_start > raw.len() || data_table_start > raw.len() {
        return Err(RebuildError::invalid_format(
            "parameter tables extend past the end of the file",
        ));
    }

    let mut title_id = [0u8; 9];
    let mut system_version = [0u8; 4];
    let mut disc_version = [0u8; 5];
    let mut app_version = [0u8; 5];

    for entry in raw[HEADER_SIZE..index_end].chunks_exact(INDEX_ENTRY_SIZE) {
        let key_offset = le_u16(&entry[0..2]) as usize;
        let data_len = le_u32(&entry[4..8]) as usize;
        let data_offset = le_u32(&entry[12..16]) as usize;

        let key_start = key_table_start + key_offset;
        let Some(key_raw) = raw.get(key_start..) else {
            continue;
        };
        let key_end = key_raw.iter().position(|&b| b == 0).unwrap_or(key_raw.len());
        let key = &key_raw[..key_end];

        let data_start = data_table_start + data_offset;
        let Some(data) = raw.get(data_start..data_start + data_len) else {
            continue;
        };

        match key {
            b"TITLE_ID" => copy_field(&mut title_id, data),
            // The firmware version string is stored with a leading pad byte.
            b"PS3_SYSTEM_VER" => copy_field(&mut system_version, data.get(1..).unwrap_or(&[])),
            b"VERSION" => copy_field(&mut disc_version, data),
            b"APP_VER" => copy_field(&mut app_version, data),
            _ => {}
        }
    }

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&title_id);
    hasher.update(&system_version);
    hasher.update(&disc_version);
    hasher.update(&app_version);
    let signature = hasher.finalize();

    let summary = SfoSummary {
        title_id: trimmed(&title_id)?,
        system_version: trimmed(&system_version)?,
        disc_version: trimmed(&disc_version)?,
        app_version: trimmed(&app_version)?,
        signature,
    };
    log::info!(
        "PARAM.SFO: {} (system {}, disc {}, app {}, signature {:08X})",
        summary.title_id,
        summary.system_version,
        summary.disc_version,
        summary.app_version,
        summary.signature
    );
    Ok(summary)
}

#[cfg(test)]
#[path = "tests/sfo_tests.rs"]
mod tests;
