//! Remote fetches: IRD archive lookup and firmware updater download.

use std::fs::File;
use std::path::Path;

use crate::error::RebuildError;
use crate::util;

const IRD_BASE: &str = "http://ps3ird.free.fr";
const PUP_BASE: &str = "http://archive.midnightchannel.net/SonyPS/Firmware/";

/// Download the IRD archive matching an SFO content signature.
///
/// The index endpoint answers a signature query with the archive's file
/// name on the first line; the archive itself is then fetched from the same
/// host.
pub fn download_ird(signature: u32, out_path: &Path) -> Result<(), RebuildError> {
    let query = format!("{IRD_BASE}/script.php?ird={signature:08X}");
    log::debug!("archive lookup: {query}");

    let listing = reqwest::blocking::get(&query)?.error_for_status()?.text()?;
    let name = listing
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .ok_or_else(|| {
            RebuildError::other(format!("no IRD archive known for signature {signature:08X}"))
        })?;

    log::info!("downloading IRD archive {name}");
    fetch_to_file(&format!("{IRD_BASE}/{name}"), out_path)
}

/// Download the firmware updater (`PS3UPDAT.PUP`) for a system version.
pub fn download_pup(system_version: &str, out_path: &Path) -> Result<(), RebuildError> {
    let query = format!("{PUP_BASE}?cat=CEX&disc=1&ver={system_version}");
    log::info!("downloading firmware updater for system {system_version}");
    fetch_to_file(&query, out_path)
}

/// Stream a URL to a file, removing the partial file on failure.
fn fetch_to_file(url: &str, out_path: &Path) -> Result<(), RebuildError> {
    let result = (|| {
        let mut response = reqwest::blocking::get(url)?.error_for_status()?;
        let mut out = File::create(out_path)?;
        let written = util::copy_stream(&mut response, &mut out, u64::MAX)?;
        log::debug!("fetched {written} bytes from {url}");
        Ok(())
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(out_path);
    }
    result
}
