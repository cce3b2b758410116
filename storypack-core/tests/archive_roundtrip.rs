mod common;

use std::io::{Cursor, Write};

use storypack_core::container::records::MAX_STAGE_NAME;
use storypack_core::{ArchiveCodec, BinaryCodec, PackCodec, PackError};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

#[test]
fn archive_round_trip_preserves_pack() {
    let pack = common::sample_pack();
    let bytes = common::archive_bytes(&pack);
    assert_eq!(&bytes[..4], b"PK\x03\x04");
    let back = ArchiveCodec.read(&mut Cursor::new(&bytes)).unwrap();
    assert_eq!(back, pack);
}

#[test]
fn archive_metadata_has_no_sector_size() {
    let pack = common::sample_pack();
    let bytes = common::archive_bytes(&pack);
    let meta = ArchiveCodec.read_metadata(&mut Cursor::new(&bytes)).unwrap();
    assert_eq!(meta.uuid, pack.uuid());
    assert_eq!(meta.version, pack.version);
    assert_eq!(meta.title, pack.title);
    assert_eq!(meta.thumbnail, pack.thumbnail);
    assert_eq!(meta.sector_size, None);
}

#[test]
fn archive_to_binary_keeps_content() {
    let pack = common::sample_pack();
    let from_archive = ArchiveCodec
        .read(&mut Cursor::new(common::archive_bytes(&pack)))
        .unwrap();
    let bin = common::binary_bytes(&from_archive);
    assert_eq!(bin, common::binary_bytes(&pack));
    assert_eq!(BinaryCodec.read(&mut Cursor::new(&bin)).unwrap(), pack);
}

#[test]
fn missing_descriptor_is_malformed() {
    let mut zw = ZipWriter::new(Cursor::new(Vec::new()));
    zw.start_file("assets/cover.png", SimpleFileOptions::default())
        .unwrap();
    zw.write_all(b"png").unwrap();
    let bytes = zw.finish().unwrap().into_inner();

    let err = ArchiveCodec
        .read_metadata(&mut Cursor::new(&bytes))
        .unwrap_err();
    assert!(matches!(err, PackError::Malformed(_)), "{err}");
}

#[test]
fn missing_asset_entry_is_malformed() {
    let pack = common::sample_pack();
    let src = common::archive_bytes(&pack);
    let mut archive = zip::ZipArchive::new(Cursor::new(&src)).unwrap();

    // Copy everything except one asset.
    let mut zw = ZipWriter::new(Cursor::new(Vec::new()));
    for i in 0..archive.len() {
        let f = archive.by_index_raw(i).unwrap();
        if f.name() != "assets/ch2.mp3" {
            zw.raw_copy_file(f).unwrap();
        }
    }
    let bytes = zw.finish().unwrap().into_inner();

    let err = ArchiveCodec.read(&mut Cursor::new(&bytes)).unwrap_err();
    assert!(matches!(err, PackError::Malformed(_)), "{err}");
}

#[test]
fn descriptor_without_entry_stage_is_malformed() {
    let mut zw = ZipWriter::new(Cursor::new(Vec::new()));
    zw.start_file("story.json", SimpleFileOptions::default())
        .unwrap();
    zw.write_all(br#"{"format":"storypack/v1","version":1,"stageNodes":[]}"#)
        .unwrap();
    let bytes = zw.finish().unwrap().into_inner();

    let err = ArchiveCodec
        .read_metadata(&mut Cursor::new(&bytes))
        .unwrap_err();
    assert!(matches!(err, PackError::Malformed(_)), "{err}");
}

#[test]
fn garbage_is_not_an_archive() {
    let err = ArchiveCodec
        .read_metadata(&mut Cursor::new(b"definitely not a zip".to_vec()))
        .unwrap_err();
    assert!(matches!(err, PackError::Malformed(_)), "{err}");
}

#[test]
fn inflated_declared_size_does_not_abort() {
    let pack = common::sample_pack();
    let mut bytes = common::archive_bytes(&pack);
    common::patch_declared_size(&mut bytes, "thumbnail.png", 0xFFFF_FFF0);

    match ArchiveCodec.read_metadata(&mut Cursor::new(&bytes)) {
        Ok(meta) => assert_eq!(meta.thumbnail, pack.thumbnail),
        Err(err) => assert!(
            matches!(err, PackError::Malformed(_) | PackError::Io(_) | PackError::Zip(_)),
            "{err}"
        ),
    }
}

#[test]
fn minimal_and_empty_fields_round_trip() {
    for pack in [common::minimal_pack(), common::named_entry_pack("")] {
        let back = ArchiveCodec
            .read(&mut Cursor::new(common::archive_bytes(&pack)))
            .unwrap();
        assert_eq!(back, pack);
    }

    let mut pack = common::named_entry_pack("Cover");
    pack.title = Some(String::new());
    pack.thumbnail = Some(Vec::new());
    let back = ArchiveCodec
        .read(&mut Cursor::new(common::archive_bytes(&pack)))
        .unwrap();
    assert_eq!(back.title.as_deref(), Some(""));
    assert_eq!(back.thumbnail.as_deref(), Some(&[][..]));
    assert_eq!(back, pack);
}

#[test]
fn both_containers_accept_the_same_stage_names() {
    let longest = common::named_entry_pack(&"n".repeat(MAX_STAGE_NAME));
    let from_archive = ArchiveCodec
        .read(&mut Cursor::new(common::archive_bytes(&longest)))
        .unwrap();
    assert_eq!(
        BinaryCodec
            .read(&mut Cursor::new(common::binary_bytes(&from_archive)))
            .unwrap(),
        longest
    );

    let too_long = common::named_entry_pack(&"n".repeat(MAX_STAGE_NAME + 120));
    let mut out = Cursor::new(Vec::new());
    let err = ArchiveCodec.write(&too_long, &mut out).unwrap_err();
    assert!(matches!(err, PackError::InvalidGraph(_)), "{err}");
    let err = BinaryCodec.write(&too_long, &mut out).unwrap_err();
    assert!(matches!(err, PackError::InvalidGraph(_)), "{err}");
}
