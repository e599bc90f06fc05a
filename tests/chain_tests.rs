#![allow(missing_docs)]

use treepack::cache::SymbolAction;
use treepack::tree::node::{Body, LangDecl, LangDeclNs, LangDeclPayload, Scope};
use treepack::{Arena, Config, ImageReader, ImageWriter, NodeId, NodeKind, Preloaded, ReadSet};

// --- MOCK DATA BUILDERS ---

/// Chains `count` variable declarations named `d0..`, marking the listed
/// positions as builtins, and returns the ids in chain order.
fn build_chain(arena: &mut Arena, count: usize, builtins_at: &[usize]) -> Vec<NodeId> {
    let decls: Vec<_> = (0..count)
        .map(|i| {
            let mut name = treepack::Node::new(NodeKind::IdentifierNode);
            if let Body::Ident(body) = &mut name.body {
                body.text = format!("d{i}");
            }
            let name = arena.push_node(name);
            let mut node = treepack::Node::new(NodeKind::VarDecl);
            node.name = Some(name);
            node.flags.set_builtin(builtins_at.contains(&i));
            arena.push_node(node)
        })
        .collect();
    for window in decls.windows(2) {
        arena.node_mut(window[0]).chain = Some(window[1]);
    }
    decls
}

fn scope_owner(arena: &mut Arena, scope: Scope) -> NodeId {
    let id = arena.push_scope(scope);
    let ns = arena.push_node(treepack::Node::new(NodeKind::NamespaceDecl));
    if let Body::Decl(decl) = &mut arena.node_mut(ns).body {
        let mut lang = LangDecl::minimal();
        lang.payload = LangDeclPayload::Ns(LangDeclNs { level: Some(id) });
        decl.lang = Some(Box::new(lang));
    }
    ns
}

fn decoded_scope(arena: &Arena, ns: NodeId) -> &Scope {
    let Body::Decl(decl) = &arena.node(ns).body else {
        panic!("namespace lost its body");
    };
    let lang = decl.lang.as_ref().expect("namespace lost its extension");
    let LangDeclPayload::Ns(payload) = &lang.payload else {
        panic!("namespace extension decoded to the wrong variant");
    };
    arena.scope(payload.level.expect("namespace lost its level"))
}

fn chain_names(arena: &Arena, head: Option<NodeId>) -> Vec<String> {
    arena
        .chain_iter(head)
        .map(|id| {
            let name = arena.node(id).name.expect("chained decl lost its name");
            match &arena.node(name).body {
                Body::Ident(body) => body.text.clone(),
                other => panic!("expected an identifier body, got {other:?}"),
            }
        })
        .collect()
}

// --- TESTS ---

/// Five chained declarations with two builtins encode to a count of three
/// and decode in original relative order; the source chain is untouched.
#[test]
fn filtered_chain_drops_builtins() -> treepack::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("filtered.tpk");

    let (mut arena, builtins) = Arena::with_builtins();
    let preloaded = Preloaded::init(&builtins);
    let decls = build_chain(&mut arena, 5, &[1, 3]);
    let ns = scope_owner(
        &mut arena,
        Scope {
            names: Some(decls[0]),
            ..Scope::default()
        },
    );

    let read_set = ReadSet::new();
    let mut writer = ImageWriter::create(&path, &arena, &read_set, preloaded, Config::default())?;
    writer.write_tree(ns, SymbolAction::Define)?;
    writer.close()?;

    // Encoding must not sever or reorder anything in the source arena.
    assert_eq!(chain_names(&arena, Some(decls[0])), ["d0", "d1", "d2", "d3", "d4"]);

    let (mut out, _) = Arena::with_builtins();
    let reader = ImageReader::open(&path, Config::default())?;
    let image = reader.read_body(&mut out, &read_set, preloaded)?;

    let scope = decoded_scope(&out, image.symbols()[0].node);
    assert_eq!(scope.names_size, 3, "filtered count must skip builtins");
    assert_eq!(chain_names(&out, scope.names), ["d0", "d2", "d4"]);
    Ok(())
}

/// An unfiltered chain round-trips completely, relinked in order with the
/// tail terminated.
#[test]
fn plain_chain_roundtrips_in_order() -> treepack::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("plain.tpk");

    let (mut arena, builtins) = Arena::with_builtins();
    let preloaded = Preloaded::init(&builtins);
    let decls = build_chain(&mut arena, 4, &[]);
    let ns = scope_owner(
        &mut arena,
        Scope {
            usings: Some(decls[0]),
            ..Scope::default()
        },
    );

    let read_set = ReadSet::new();
    let mut writer = ImageWriter::create(&path, &arena, &read_set, preloaded, Config::default())?;
    writer.write_tree(ns, SymbolAction::Define)?;
    writer.close()?;

    let (mut out, _) = Arena::with_builtins();
    let reader = ImageReader::open(&path, Config::default())?;
    let image = reader.read_body(&mut out, &read_set, preloaded)?;

    let scope = decoded_scope(&out, image.symbols()[0].node);
    assert_eq!(chain_names(&out, scope.usings), ["d0", "d1", "d2", "d3"]);
    let tail = out.chain_iter(scope.usings).last().expect("chain is empty");
    assert!(out.node(tail).chain.is_none(), "chain tail must terminate");
    Ok(())
}

/// An all-builtin chain encodes to an empty list and decodes to no head.
#[test]
fn fully_filtered_chain_is_empty() -> treepack::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("empty.tpk");

    let (mut arena, builtins) = Arena::with_builtins();
    let preloaded = Preloaded::init(&builtins);
    let decls = build_chain(&mut arena, 2, &[0, 1]);
    let ns = scope_owner(
        &mut arena,
        Scope {
            names: Some(decls[0]),
            ..Scope::default()
        },
    );

    let read_set = ReadSet::new();
    let mut writer = ImageWriter::create(&path, &arena, &read_set, preloaded, Config::default())?;
    writer.write_tree(ns, SymbolAction::Define)?;
    writer.close()?;

    let (mut out, _) = Arena::with_builtins();
    let reader = ImageReader::open(&path, Config::default())?;
    let image = reader.read_body(&mut out, &read_set, preloaded)?;

    let scope = decoded_scope(&out, image.symbols()[0].node);
    assert_eq!(scope.names_size, 0);
    assert!(scope.names.is_none());
    Ok(())
}
