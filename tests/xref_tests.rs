#![allow(missing_docs)]

use treepack::cache::SymbolAction;
use treepack::tree::node::Body;
use treepack::{Arena, Config, ImageReader, ImageWriter, NodeId, NodeKind, Preloaded, ReadSet, TreepackError};

// --- MOCK DATA BUILDERS ---

fn named_decl(arena: &mut Arena, kind: NodeKind, text: &str) -> NodeId {
    let mut name = treepack::Node::new(NodeKind::IdentifierNode);
    if let Body::Ident(body) = &mut name.body {
        body.text = text.to_string();
    }
    let name = arena.push_node(name);
    let mut node = treepack::Node::new(kind);
    node.name = Some(name);
    arena.push_node(node)
}

// --- TESTS ---

/// A node decoded from image A and referenced while writing image B comes
/// back as the identical node when B is read with A registered.
#[test]
fn external_reference_resolves_to_the_included_node() -> treepack::Result<()> {
    let dir = tempfile::tempdir()?;
    let path_a = dir.path().join("a.tpk");
    let path_b = dir.path().join("b.tpk");

    // Write image A from a producing arena.
    let (mut producer, builtins) = Arena::with_builtins();
    let preloaded = Preloaded::init(&builtins);
    let exported = named_decl(&mut producer, NodeKind::TypeDecl, "exported");
    {
        let empty = ReadSet::new();
        let mut writer =
            ImageWriter::create(&path_a, &producer, &empty, preloaded, Config::default())?;
        writer.write_tree(exported, SymbolAction::Define)?;
        writer.close()?;
    }

    // Read A into the consuming arena and register it.
    let (mut arena, _) = Arena::with_builtins();
    let mut read_set = ReadSet::new();
    let reader_a = ImageReader::open(&path_a, Config::default())?;
    let image_a = reader_a.read_body(&mut arena, &read_set, preloaded)?;
    let imported = image_a.symbols()[0].node;
    read_set.register(image_a);

    // Write image B with a declaration whose type is the imported node.
    let user = named_decl(&mut arena, NodeKind::VarDecl, "user");
    arena.node_mut(user).ttype = Some(imported);
    {
        let mut writer =
            ImageWriter::create(&path_b, &arena, &read_set, preloaded, Config::default())?;
        writer.write_tree(user, SymbolAction::Declare)?;
        writer.close()?;
    }

    // Read B against the same registry: the reference must resolve to the
    // node A produced, not to a fresh copy.
    let reader_b = ImageReader::open(&path_b, Config::default())?;
    let image_b = reader_b.read_body(&mut arena, &read_set, preloaded)?;
    let decoded_user = image_b.symbols()[0].node;
    assert_eq!(
        arena.node(decoded_user).ttype,
        Some(imported),
        "external reference decoded to a copy instead of the included node"
    );
    Ok(())
}

/// References to builtin singletons travel as preloaded slots and decode
/// to the fixed builtin ids on the other side.
#[test]
fn preloaded_reference_resolves_to_the_builtin() -> treepack::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("builtin_ref.tpk");

    let (mut arena, builtins) = Arena::with_builtins();
    let preloaded = Preloaded::init(&builtins);
    let decl = named_decl(&mut arena, NodeKind::VarDecl, "v");
    arena.node_mut(decl).ttype = Some(builtins.void_type);
    if let Body::Decl(body) = &mut arena.node_mut(decl).body {
        body.context = Some(builtins.global_namespace);
    }

    let read_set = ReadSet::new();
    let mut writer = ImageWriter::create(&path, &arena, &read_set, preloaded, Config::default())?;
    writer.write_tree(decl, SymbolAction::Declare)?;
    writer.close()?;

    let (mut out, out_builtins) = Arena::with_builtins();
    let reader = ImageReader::open(&path, Config::default())?;
    let image = reader.read_body(&mut out, &read_set, preloaded)?;

    let node = out.node(image.symbols()[0].node);
    assert_eq!(node.ttype, Some(out_builtins.void_type));
    let Body::Decl(body) = &node.body else {
        panic!("decl lost its body");
    };
    assert_eq!(body.context, Some(out_builtins.global_namespace));

    // Builtins were not pickled: the image caches only the decl and its
    // name.
    assert_eq!(reader.slot_count(), 2);
    Ok(())
}

/// An image whose include manifest does not match the registered read set
/// is rejected before any node is materialized.
#[test]
fn include_manifest_mismatch_is_a_format_error() -> treepack::Result<()> {
    let dir = tempfile::tempdir()?;
    let path_a = dir.path().join("first.tpk");
    let path_b = dir.path().join("second.tpk");

    let (mut arena, builtins) = Arena::with_builtins();
    let preloaded = Preloaded::init(&builtins);
    let decl_a = named_decl(&mut arena, NodeKind::TypeDecl, "a");
    {
        let empty = ReadSet::new();
        let mut writer =
            ImageWriter::create(&path_a, &arena, &empty, preloaded, Config::default())?;
        writer.write_tree(decl_a, SymbolAction::Define)?;
        writer.close()?;
    }

    // Image B is written over a registry containing A.
    let (mut consumer, _) = Arena::with_builtins();
    let mut read_set = ReadSet::new();
    let reader_a = ImageReader::open(&path_a, Config::default())?;
    read_set.register(reader_a.read_body(&mut consumer, &read_set, preloaded)?);
    let decl_b = named_decl(&mut consumer, NodeKind::TypeDecl, "b");
    {
        let mut writer =
            ImageWriter::create(&path_b, &consumer, &read_set, preloaded, Config::default())?;
        writer.write_tree(decl_b, SymbolAction::Define)?;
        writer.close()?;
    }

    // Reading B with an empty registry must fail the manifest check.
    let (mut fresh, _) = Arena::with_builtins();
    let empty = ReadSet::new();
    let reader_b = ImageReader::open(&path_b, Config::default())?;
    let err = reader_b
        .read_body(&mut fresh, &empty, preloaded)
        .expect_err("manifest mismatch must be rejected");
    assert!(
        matches!(err, TreepackError::Format(_)),
        "expected a format error, got {err:?}"
    );
    Ok(())
}

/// Symbols are replayed in `write_tree` order with their actions intact.
#[test]
fn symbol_table_preserves_order_and_actions() -> treepack::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("symtab.tpk");

    let (mut arena, builtins) = Arena::with_builtins();
    let preloaded = Preloaded::init(&builtins);
    let first = named_decl(&mut arena, NodeKind::FunctionDecl, "first");
    let second = named_decl(&mut arena, NodeKind::VarDecl, "second");

    let read_set = ReadSet::new();
    let mut writer = ImageWriter::create(&path, &arena, &read_set, preloaded, Config::default())?;
    writer.write_tree(first, SymbolAction::Declare)?;
    writer.write_tree(second, SymbolAction::Define)?;
    writer.write_tree(first, SymbolAction::Define)?;
    writer.close()?;

    let (mut out, _) = Arena::with_builtins();
    let reader = ImageReader::open(&path, Config::default())?;
    let image = reader.read_body(&mut out, &read_set, preloaded)?;

    let symbols = image.symbols();
    assert_eq!(symbols.len(), 3);
    assert_eq!(symbols[0].action, SymbolAction::Declare);
    assert_eq!(symbols[1].action, SymbolAction::Define);
    assert_eq!(symbols[2].action, SymbolAction::Define);
    assert_eq!(
        symbols[0].node, symbols[2].node,
        "re-exported symbol must resolve to the same node"
    );
    assert_ne!(symbols[0].node, symbols[1].node);
    Ok(())
}
