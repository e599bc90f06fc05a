#![allow(missing_docs)]

use std::fs;
use std::io::Write;

use treepack::bitpack::{BitPacker, BitUnpacker, write_bitpack};
use treepack::cache::SymbolAction;
use treepack::inspector::ImageInspector;
use treepack::tokens::{Token, TokenCache};
use treepack::tree::node::Body;
use treepack::{Arena, Config, ImageReader, ImageWriter, NodeKind, Preloaded, ReadSet, TreepackError};

// --- MOCK DATA BUILDERS ---

fn write_small_image(path: &std::path::Path) -> treepack::Result<()> {
    let (mut arena, builtins) = Arena::with_builtins();
    let preloaded = Preloaded::init(&builtins);
    let mut name = treepack::Node::new(NodeKind::IdentifierNode);
    if let Body::Ident(body) = &mut name.body {
        body.text = "probe".to_string();
    }
    let name = arena.push_node(name);
    let mut decl = treepack::Node::new(NodeKind::VarDecl);
    decl.name = Some(name);
    let decl = arena.push_node(decl);

    let read_set = ReadSet::new();
    let mut writer = ImageWriter::create(path, &arena, &read_set, preloaded, Config::default())?;
    writer.write_tree(decl, SymbolAction::Declare)?;
    writer.close()
}

fn expect_format_error(result: treepack::Result<ImageReader>) {
    match result {
        Err(TreepackError::Format(_)) => {}
        Err(other) => panic!("expected a format error, got {other:?}"),
        Ok(_) => panic!("a corrupt image opened without complaint"),
    }
}

// --- TESTS ---

/// Wrong magic bytes are rejected at open.
#[test]
fn open_rejects_wrong_magic() -> treepack::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("magic.tpk");
    write_small_image(&path)?;

    let mut bytes = fs::read(&path)?;
    bytes[0..4].copy_from_slice(b"NOPE");
    fs::write(&path, &bytes)?;

    expect_format_error(ImageReader::open(&path, Config::default()));
    Ok(())
}

/// A major version this build does not read is rejected at open; minor
/// and patch are informational and accepted.
#[test]
fn open_rejects_major_version_mismatch() -> treepack::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("version.tpk");
    write_small_image(&path)?;

    let mut bytes = fs::read(&path)?;
    bytes[4] = bytes[4].wrapping_add(1); // major
    fs::write(&path, &bytes)?;
    expect_format_error(ImageReader::open(&path, Config::default()));

    let mut bytes = fs::read(&path)?;
    bytes[4] = bytes[4].wrapping_sub(1); // restore major
    bytes[5] = bytes[5].wrapping_add(9); // minor: fine
    fs::write(&path, &bytes)?;
    assert!(ImageReader::open(&path, Config::default()).is_ok());
    Ok(())
}

/// Truncation anywhere, header, section table or reference table, is a
/// format error, never a panic or a partial decode.
#[test]
fn open_rejects_truncation() -> treepack::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("truncated.tpk");
    write_small_image(&path)?;
    let bytes = fs::read(&path)?;

    for keep in [4usize, 14, bytes.len() / 2, bytes.len() - 1] {
        let mut file = fs::File::create(&path)?;
        file.write_all(&bytes[..keep])?;
        drop(file);
        expect_format_error(ImageReader::open(&path, Config::default()));
    }
    Ok(())
}

/// A file that is not an image at all is rejected.
#[test]
fn open_rejects_garbage() -> treepack::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("garbage.tpk");
    fs::write(&path, b"not an image")?;
    expect_format_error(ImageReader::open(&path, Config::default()));
    Ok(())
}

/// Opening a path that does not exist is an I/O error, distinct from a
/// format error.
#[test]
fn open_missing_file_is_io_error() {
    let result = ImageReader::open("/nonexistent/image.tpk", Config::default());
    match result {
        Err(TreepackError::Io(_)) => {}
        other => panic!("expected an I/O error, got {other:?}"),
    }
}

/// The bit packer and unpacker agree on a mixed run of widths, including
/// a field that forces a word spill.
#[test]
fn bitpack_roundtrips_mixed_widths() {
    let mut packer = BitPacker::new();
    packer.push::<1>(1);
    packer.push::<4>(0b1010);
    packer.push::<16>(54_321);
    packer.push::<9>(300);
    for i in 0..40 {
        packer.push_bool(i % 3 == 0);
    }
    packer.push::<32>(0xDEAD_BEEF); // does not fit the first word

    let mut buf = Vec::new();
    let words = write_bitpack(&mut buf, packer);
    assert_eq!(words, 2);

    let mut pos = 0;
    let mut unpacker = BitUnpacker::new();
    assert_eq!(unpacker.pull::<1>(&buf, &mut pos), 1);
    assert_eq!(unpacker.pull::<4>(&buf, &mut pos), 0b1010);
    assert_eq!(unpacker.pull::<16>(&buf, &mut pos), 54_321);
    assert_eq!(unpacker.pull::<9>(&buf, &mut pos), 300);
    for i in 0..40 {
        assert_eq!(unpacker.pull_bool(&buf, &mut pos), i % 3 == 0);
    }
    assert_eq!(unpacker.pull::<32>(&buf, &mut pos), 0xDEAD_BEEF);
    assert_eq!(unpacker.words_fetched(), 2);
    assert_eq!(pos, buf.len(), "unpacker must consume exactly the run");
}

/// A value wider than its declared field is a caller bug and aborts.
#[test]
#[should_panic(expected = "does not fit")]
fn bitpack_rejects_oversized_value() {
    let mut packer = BitPacker::new();
    packer.push::<3>(8);
}

/// Token caches round-trip byte-exactly through the blob codec.
#[test]
fn token_cache_roundtrips() -> treepack::Result<()> {
    let cache = TokenCache {
        tokens: vec![
            Token {
                kind: 3,
                flags: 0b101,
                text: "return".to_string(),
            },
            Token {
                kind: 17,
                flags: 0,
                text: "x".to_string(),
            },
        ],
    };
    let blob = cache.to_blob()?;
    assert_eq!(TokenCache::from_blob(&blob)?, cache);

    let empty = TokenCache::default();
    assert!(empty.is_empty());
    assert_eq!(TokenCache::from_blob(&empty.to_blob()?)?, empty);
    Ok(())
}

/// A blob that is not a token cache fails decoding as a serialization
/// error instead of producing garbage tokens.
#[test]
fn token_cache_rejects_bad_blob() {
    match TokenCache::from_blob(&[0xFF, 0xFF, 0xFF, 0xFF]) {
        Err(TreepackError::Serialization(_)) => {}
        other => panic!("expected a serialization error, got {other:?}"),
    }
}

/// The inspector reports the written layout without decoding the record
/// stream.
#[test]
fn inspector_reports_layout() -> treepack::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("inspect.tpk");
    write_small_image(&path)?;

    let report = ImageInspector::inspect(&path)?;
    assert_eq!(report.name, "inspect.tpk");
    assert!(report.file_size > 0);
    assert_eq!(report.sections.len(), 3);
    assert_eq!(report.slot_count, 2); // the decl and its identifier
    assert_eq!(report.families.len(), 1);
    assert_eq!(report.families[0].family, "Tree");
    assert_eq!(report.families[0].count, 2);

    let rendered = report.to_string();
    assert!(rendered.contains("VarDecl"));
    assert!(rendered.contains("IdentifierNode"));
    Ok(())
}
