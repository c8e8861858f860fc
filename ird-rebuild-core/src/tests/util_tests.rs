use std::io::Cursor;

use super::*;

#[test]
fn decodes_utf16be_identifiers() {
    let raw: Vec<u8> = "BAR.TXT".encode_utf16().flat_map(u16::to_be_bytes).collect();
    assert_eq!(utf16be_to_utf8(&raw).unwrap(), "BAR.TXT");
}

#[test]
fn decoding_stops_at_nul_word() {
    let raw = [0, b'A', 0, 0, 0, b'B'];
    assert_eq!(utf16be_to_utf8(&raw).unwrap(), "A");
}

#[test]
fn root_identifier_decodes_empty() {
    // the root directory identifier is a single zero byte
    assert_eq!(utf16be_to_utf8(&[0]).unwrap(), "");
}

#[test]
fn rejects_unpaired_surrogates() {
    let raw = [0xD8, 0x00];
    assert!(matches!(
        utf16be_to_utf8(&raw),
        Err(RebuildError::Encoding(_))
    ));
}

#[test]
fn md5_of_known_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("abc.txt");
    std::fs::write(&path, b"abc").unwrap();

    let digest = md5_file(&path).unwrap();
    assert_eq!(
        digest,
        [
            0x90, 0x01, 0x50, 0x98, 0x3c, 0xd2, 0x4f, 0xb0, 0xd6, 0x96, 0x3f, 0x7d, 0x28, 0xe1,
            0x7f, 0x72
        ]
    );
}

#[test]
fn copy_stream_honors_limit() {
    let mut src = Cursor::new(vec![0xAB; 1000]);
    let mut dst = Vec::new();
    assert_eq!(copy_stream(&mut src, &mut dst, 300).unwrap(), 300);
    assert_eq!(dst, vec![0xAB; 300]);
}

#[test]
fn copy_stream_reports_short_sources() {
    let mut src = Cursor::new(vec![0xAB; 100]);
    let mut dst = Vec::new();
    assert_eq!(copy_stream(&mut src, &mut dst, 300).unwrap(), 100);
}

#[test]
fn copy_stream_crosses_chunk_boundaries() {
    let data = vec![0x5A; CHUNK_SIZE + 17];
    let mut src = Cursor::new(data.clone());
    let mut dst = Vec::new();
    assert_eq!(
        copy_stream(&mut src, &mut dst, u64::MAX).unwrap(),
        data.len() as u64
    );
    assert_eq!(dst, data);
}

#[test]
fn write_zeros_exact_count() {
    let mut dst = Vec::new();
    write_zeros(&mut dst, CHUNK_SIZE as u64 + 5).unwrap();
    assert_eq!(dst.len(), CHUNK_SIZE + 5);
    assert!(dst.iter().all(|&b| b == 0));
}

#[test]
fn session_dir_is_keyed_by_signature() {
    let dir = session_tmp_dir(0xCAFE).unwrap();
    assert!(dir.ends_with("ird_rebuild/0000CAFE"));
    assert!(dir.is_dir());
}
