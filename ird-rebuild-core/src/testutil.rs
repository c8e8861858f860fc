//! Fixture builders shared by the unit tests: a tiny in-memory ECMA-119
//! header range and a matching IRD archive.

use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::ird::{DISC_DT_SIZE, OPAQUE_SIZE, PIC_SIZE};

pub const BLOCK: usize = 2048;

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn utf16be(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_be_bytes).collect()
}

/// Splice `bytes` into `buf` at `offset`.
pub fn put(buf: &mut [u8], offset: usize, bytes: &[u8]) {
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
}

/// A volume descriptor block with the four fields the decoder reads.
pub fn pvd(volume_size: u32, path_table_size: u32, path_table_location: u32) -> Vec<u8> {
    let mut block = vec![0u8; BLOCK];
    block[0] = 2;
    put(&mut block, 1, b"CD001");
    put(&mut block, 80, &volume_size.to_le_bytes());
    put(&mut block, 128, &(BLOCK as u16).to_le_bytes());
    put(&mut block, 132, &path_table_size.to_le_bytes());
    put(&mut block, 140, &path_table_location.to_le_bytes());
    block
}

/// An on-disc path table record. `raw_name` is the identifier as stored
/// (UTF-16BE, or a single zero byte for the root). `parent` is the raw
/// 1-based field value.
pub fn path_record(raw_name: &[u8], block: u32, parent: u16) -> Vec<u8> {
    let mut rec = vec![0u8; 8];
    rec[0] = raw_name.len() as u8;
    put(&mut rec, 2, &block.to_le_bytes());
    put(&mut rec, 6, &parent.to_le_bytes());
    rec.extend_from_slice(raw_name);
    if rec.len() % 2 != 0 {
        rec.push(0);
    }
    rec
}

/// An on-disc directory record. `raw_name` is the stored identifier.
pub fn dir_record(raw_name: &[u8], block: u32, extent_length: u32, flags: u8) -> Vec<u8> {
    let mut length = 33 + raw_name.len();
    if length % 2 != 0 {
        length += 1;
    }
    let mut rec = vec![0u8; length];
    rec[0] = length as u8;
    put(&mut rec, 2, &block.to_le_bytes());
    put(&mut rec, 10, &extent_length.to_le_bytes());
    rec[25] = flags;
    rec[32] = raw_name.len() as u8;
    put(&mut rec, 33, raw_name);
    rec
}

/// The standard fixture volume:
///
/// - block 17: volume descriptor
/// - block 18: path table (root at block 19, `FOO` at block 20)
/// - block 19: root listing (`BAR.TXT` at block 30, 100 bytes)
/// - block 20: `FOO` listing (`BAZ.BIN` at block 31, 5000 bytes)
pub fn header_range() -> Vec<u8> {
    let mut header = vec![0u8; 21 * BLOCK];

    let root = path_record(&[0], 19, 1);
    let foo = path_record(&utf16be("FOO"), 20, 1);
    let path_table_size = (root.len() + foo.len()) as u32;
    put(&mut header, 17 * BLOCK, &pvd(21, path_table_size, 18));

    let mut offset = 18 * BLOCK;
    put(&mut header, offset, &root);
    offset += root.len();
    put(&mut header, offset, &foo);

    let mut listing = Vec::new();
    listing.extend_from_slice(&dir_record(&[0], 19, BLOCK as u32, 0x02));
    listing.extend_from_slice(&dir_record(&[1], 19, BLOCK as u32, 0x02));
    listing.extend_from_slice(&dir_record(&utf16be("BAR.TXT;1"), 30, 100, 0));
    put(&mut header, 19 * BLOCK, &listing);

    let mut listing = Vec::new();
    listing.extend_from_slice(&dir_record(&[0], 20, BLOCK as u32, 0x02));
    listing.extend_from_slice(&dir_record(&[1], 19, BLOCK as u32, 0x02));
    listing.extend_from_slice(&dir_record(&utf16be("BAZ.BIN;1"), 31, 5000, 0));
    put(&mut header, 20 * BLOCK, &listing);

    header
}

/// The standard fixture plus a three-extent file in the root listing:
/// `BIG.DAT` at blocks 40 (4096 bytes), 42 (2048 bytes) and 43 (100 bytes).
pub fn header_range_multi_extent() -> Vec<u8> {
    let mut header = header_range();

    let mut listing = Vec::new();
    listing.extend_from_slice(&dir_record(&[0], 19, BLOCK as u32, 0x02));
    listing.extend_from_slice(&dir_record(&[1], 19, BLOCK as u32, 0x02));
    listing.extend_from_slice(&dir_record(&utf16be("BAR.TXT;1"), 30, 100, 0));
    listing.extend_from_slice(&dir_record(&utf16be("BIG.DAT;1"), 40, 4096, 0x80));
    listing.extend_from_slice(&dir_record(&utf16be("BIG.DAT;1"), 42, 2048, 0x80));
    listing.extend_from_slice(&dir_record(&utf16be("BIG.DAT;1"), 43, 100, 0));
    header[19 * BLOCK..20 * BLOCK].fill(0);
    put(&mut header, 19 * BLOCK, &listing);

    header
}

/// Inputs for [`build_ird_archive`].
pub struct ArchiveFixture {
    pub version: u8,
    pub title_id: &'static str,
    pub title: &'static str,
    pub system_version: &'static str,
    pub disc_version: &'static str,
    pub app_version: &'static str,
    pub header: Vec<u8>,
    pub footer: Vec<u8>,
    pub region_hashes: Vec<[u8; 16]>,
    /// (sector, md5) pairs for the file checksum table.
    pub file_hashes: Vec<(u64, [u8; 16])>,
    pub pic: [u8; PIC_SIZE],
    pub data1: [u8; OPAQUE_SIZE],
    pub data2: [u8; OPAQUE_SIZE],
    pub uid: u32,
    pub crc: u32,
}

impl Default for ArchiveFixture {
    fn default() -> Self {
        Self {
            version: 9,
            title_id: "BLUS30443",
            title: "Example Game",
            system_version: "3.55",
            disc_version: "01.00",
            app_version: "01.00",
            header: header_range(),
            footer: vec![0xEE; 4096],
            region_hashes: vec![[0x11; 16]],
            file_hashes: vec![(30, [0xAA; 16]), (31, [0xBB; 16])],
            pic: [0x50; PIC_SIZE],
            data1: [0x01; OPAQUE_SIZE],
            data2: [0x02; OPAQUE_SIZE],
            uid: 0xDEAD_BEEF,
            crc: 0x1234_5678,
        }
    }
}

/// Serialize and gzip a complete IRD archive.
pub fn build_ird_archive(fixture: &ArchiveFixture) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(b"3IRD");
    body.push(fixture.version);
    body.extend_from_slice(&fixed(fixture.title_id, 9));
    body.push(fixture.title.len() as u8);
    body.extend_from_slice(fixture.title.as_bytes());
    body.extend_from_slice(&fixed(fixture.system_version, 4));
    body.extend_from_slice(&fixed(fixture.disc_version, 5));
    body.extend_from_slice(&fixed(fixture.app_version, 5));
    if fixture.version == 7 {
        body.extend_from_slice(&[0u8; 4]);
    }

    for range in [&fixture.header, &fixture.footer] {
        let blob = gzip(range);
        body.extend_from_slice(&(blob.len() as u32).to_le_bytes());
        body.extend_from_slice(&blob);
    }

    body.push(fixture.region_hashes.len() as u8);
    for hash in &fixture.region_hashes {
        body.extend_from_slice(hash);
    }

    body.extend_from_slice(&(fixture.file_hashes.len() as u32).to_le_bytes());
    for (sector, hash) in &fixture.file_hashes {
        body.extend_from_slice(&sector.to_le_bytes());
        body.extend_from_slice(hash);
    }

    body.extend_from_slice(&[0u8; 4]);

    let mut trailer = [0u8; DISC_DT_SIZE];
    if fixture.version == 9 {
        put(&mut trailer, 0, &fixture.pic);
        put(&mut trailer, PIC_SIZE, &fixture.data1);
        put(&mut trailer, PIC_SIZE + OPAQUE_SIZE, &fixture.data2);
    } else {
        put(&mut trailer, 0, &fixture.data1);
        put(&mut trailer, OPAQUE_SIZE, &fixture.data2);
        put(&mut trailer, 2 * OPAQUE_SIZE, &fixture.pic);
    }
    body.extend_from_slice(&trailer);

    body.extend_from_slice(&fixture.uid.to_le_bytes());
    body.extend_from_slice(&fixture.crc.to_le_bytes());

    gzip(&body)
}

fn fixed(text: &str, width: usize) -> Vec<u8> {
    let mut buf = vec![0u8; width];
    let n = text.len().min(width);
    buf[..n].copy_from_slice(&text.as_bytes()[..n]);
    buf
}
