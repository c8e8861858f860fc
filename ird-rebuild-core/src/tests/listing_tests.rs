use super::*;
use crate::testutil::{self, ArchiveFixture};

fn load_fixture(dir: &std::path::Path, fixture: &ArchiveFixture) -> IrdFile {
    let path = dir.join("fixture.ird");
    std::fs::write(&path, testutil::build_ird_archive(fixture)).unwrap();
    load_ird(&path, dir).unwrap()
}

#[test]
fn lists_directories_and_files() {
    let dir = tempfile::tempdir().unwrap();
    let ird = load_fixture(dir.path(), &ArchiveFixture::default());

    let listing = disc_listing(&ird).unwrap();
    assert_eq!(listing.directories, ["FOO"]);
    assert_eq!(
        listing.files,
        [
            (30, "BAR.TXT".to_string()),
            (31, "FOO/BAZ.BIN".to_string())
        ]
    );
}

#[test]
fn multi_extent_files_appear_once() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = ArchiveFixture {
        header: testutil::header_range_multi_extent(),
        file_hashes: vec![(30, [0; 16]), (31, [0; 16]), (40, [0; 16])],
        ..ArchiveFixture::default()
    };
    let ird = load_fixture(dir.path(), &fixture);

    let listing = disc_listing(&ird).unwrap();
    let big: Vec<_> = listing
        .files
        .iter()
        .filter(|(_, path)| path == "BIG.DAT")
        .collect();
    assert_eq!(big.len(), 1);
    assert_eq!(big[0].0, 40);
}
