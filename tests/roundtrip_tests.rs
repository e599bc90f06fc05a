#![allow(missing_docs)]

use treepack::cache::SymbolAction;
use treepack::tree::node::{Body, LangDecl, LangDeclNs, LangDeclPayload, SourceLocation};
use treepack::{Arena, Config, ImageReader, ImageWriter, NodeKind, Preloaded, ReadSet};

// --- MOCK DATA BUILDERS ---

fn ident(arena: &mut Arena, text: &str) -> treepack::NodeId {
    let mut node = treepack::Node::new(NodeKind::IdentifierNode);
    if let Body::Ident(body) = &mut node.body {
        body.text = text.to_string();
    }
    arena.push_node(node)
}

fn int_cst(arena: &mut Arena, value: i64) -> treepack::NodeId {
    let mut node = treepack::Node::new(NodeKind::IntegerCst);
    node.body = Body::IntCst { value };
    arena.push_node(node)
}

fn var_decl(
    arena: &mut Arena,
    name: treepack::NodeId,
    ttype: Option<treepack::NodeId>,
    initial: Option<treepack::NodeId>,
) -> treepack::NodeId {
    let mut node = treepack::Node::new(NodeKind::VarDecl);
    node.name = Some(name);
    node.ttype = ttype;
    if let Body::Decl(decl) = &mut node.body {
        decl.initial = initial;
    }
    arena.push_node(node)
}

fn ident_text(arena: &Arena, id: treepack::NodeId) -> &str {
    match &arena.node(id).body {
        Body::Ident(body) => &body.text,
        other => panic!("expected an identifier body, got {other:?}"),
    }
}

// --- TESTS ---

/// A declaration with a name, an initializer and a location survives a
/// write/read cycle with every field intact.
#[test]
fn roundtrip_simple_decl() -> treepack::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("simple.tpk");

    let (mut arena, builtins) = Arena::with_builtins();
    let preloaded = Preloaded::init(&builtins);
    let name = ident(&mut arena, "answer");
    let init = int_cst(&mut arena, 42);
    let decl = var_decl(&mut arena, name, None, Some(init));
    arena.node_mut(decl).location = Some(SourceLocation {
        file: "main.cc".to_string(),
        line: 7,
        column: 4,
    });

    let read_set = ReadSet::new();
    let mut writer = ImageWriter::create(&path, &arena, &read_set, preloaded, Config::default())?;
    writer.write_tree(decl, SymbolAction::Define)?;
    writer.close()?;

    let (mut out, _) = Arena::with_builtins();
    let reader = ImageReader::open(&path, Config::default())?;
    let image = reader.read_body(&mut out, &read_set, preloaded)?;

    assert_eq!(image.symbols().len(), 1);
    assert_eq!(image.symbols()[0].action, SymbolAction::Define);
    let decoded = image.symbols()[0].node;
    let node = out.node(decoded);
    assert_eq!(node.kind, NodeKind::VarDecl);
    assert_eq!(
        node.location,
        Some(SourceLocation {
            file: "main.cc".to_string(),
            line: 7,
            column: 4,
        })
    );
    let name = node.name.expect("decl lost its name");
    assert_eq!(ident_text(&out, name), "answer");
    let Body::Decl(body) = &node.body else {
        panic!("decl lost its body");
    };
    let init = body.initial.expect("decl lost its initializer");
    assert_eq!(out.node(init).body, Body::IntCst { value: 42 });
    Ok(())
}

/// A type reachable from two declarations is pickled once and decodes to
/// one node reachable from both.
#[test]
fn roundtrip_preserves_sharing() -> treepack::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("shared.tpk");

    let (mut arena, builtins) = Arena::with_builtins();
    let preloaded = Preloaded::init(&builtins);
    let shared_type = arena.push_node(treepack::Node::new(NodeKind::RecordType));
    let name_a = ident(&mut arena, "a");
    let name_b = ident(&mut arena, "b");
    let decl_a = var_decl(&mut arena, name_a, Some(shared_type), None);
    let decl_b = var_decl(&mut arena, name_b, Some(shared_type), None);

    let read_set = ReadSet::new();
    let mut writer = ImageWriter::create(&path, &arena, &read_set, preloaded, Config::default())?;
    writer.write_tree(decl_a, SymbolAction::Declare)?;
    writer.write_tree(decl_b, SymbolAction::Declare)?;
    writer.close()?;

    let (mut out, _) = Arena::with_builtins();
    let reader = ImageReader::open(&path, Config::default())?;
    let image = reader.read_body(&mut out, &read_set, preloaded)?;

    let [a, b] = image.symbols() else {
        panic!("expected two symbols, got {}", image.symbols().len());
    };
    let type_a = out.node(a.node).ttype.expect("first decl lost its type");
    let type_b = out.node(b.node).ttype.expect("second decl lost its type");
    assert_eq!(type_a, type_b, "shared type decoded to two copies");
    assert_eq!(out.node(type_a).kind, NodeKind::RecordType);
    Ok(())
}

/// A two-scope cycle (each scope the other's parent) terminates on encode
/// and decodes to a cycle over the same two objects.
#[test]
fn roundtrip_cyclic_scope_chain() -> treepack::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cycle.tpk");

    let (mut arena, builtins) = Arena::with_builtins();
    let preloaded = Preloaded::init(&builtins);
    let s1 = arena.push_scope(treepack::tree::node::Scope::default());
    let s2 = arena.push_scope(treepack::tree::node::Scope::default());
    arena.scope_mut(s1).level_chain = Some(s2);
    arena.scope_mut(s2).level_chain = Some(s1);

    let name = ident(&mut arena, "ns");
    let ns = arena.push_node(treepack::Node::new(NodeKind::NamespaceDecl));
    arena.node_mut(ns).name = Some(name);
    if let Body::Decl(decl) = &mut arena.node_mut(ns).body {
        let mut lang = LangDecl::minimal();
        lang.payload = LangDeclPayload::Ns(LangDeclNs { level: Some(s1) });
        decl.lang = Some(Box::new(lang));
    }

    let read_set = ReadSet::new();
    let mut writer = ImageWriter::create(&path, &arena, &read_set, preloaded, Config::default())?;
    writer.write_tree(ns, SymbolAction::Define)?;
    writer.close()?;

    let (mut out, _) = Arena::with_builtins();
    let reader = ImageReader::open(&path, Config::default())?;
    let image = reader.read_body(&mut out, &read_set, preloaded)?;

    let decoded_ns = image.symbols()[0].node;
    let Body::Decl(decl) = &out.node(decoded_ns).body else {
        panic!("namespace lost its body");
    };
    let lang = decl.lang.as_ref().expect("namespace lost its extension");
    let LangDeclPayload::Ns(ns_payload) = &lang.payload else {
        panic!("namespace extension decoded to the wrong variant");
    };
    let d1 = ns_payload.level.expect("namespace lost its level");
    let d2 = out.scope(d1).level_chain.expect("scope lost its parent");
    assert_ne!(d1, d2);
    assert_eq!(
        out.scope(d2).level_chain,
        Some(d1),
        "parent chain did not close back on the first scope"
    );
    Ok(())
}

/// A node whose kind the engine recognizes but does not implement decodes
/// as a bare node: kind and common part only.
#[test]
fn roundtrip_unimplemented_kind_is_bare() -> treepack::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bare.tpk");

    let (mut arena, builtins) = Arena::with_builtins();
    let preloaded = Preloaded::init(&builtins);
    let name = ident(&mut arena, "complex");
    let node = arena.push_node(treepack::Node::new(NodeKind::ComplexType));
    arena.node_mut(node).name = Some(name);

    let config = Config {
        log_unimplemented: true,
        ..Config::default()
    };
    let read_set = ReadSet::new();
    let mut writer = ImageWriter::create(&path, &arena, &read_set, preloaded, config)?;
    writer.write_tree(node, SymbolAction::Declare)?;
    writer.close()?;

    let (mut out, _) = Arena::with_builtins();
    let reader = ImageReader::open(&path, config)?;
    let image = reader.read_body(&mut out, &read_set, preloaded)?;

    let decoded = out.node(image.symbols()[0].node);
    assert_eq!(decoded.kind, NodeKind::ComplexType);
    let name = decoded.name.expect("bare node lost its common part");
    assert_eq!(ident_text(&out, name), "complex");
    Ok(())
}

/// Call expressions carry their arity explicitly; a three-argument call
/// decodes with exactly three arguments in call order.
#[test]
fn roundtrip_call_arity() -> treepack::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("call.tpk");

    let (mut arena, builtins) = Arena::with_builtins();
    let preloaded = Preloaded::init(&builtins);
    let callee_name = ident(&mut arena, "f");
    let callee = var_decl(&mut arena, callee_name, None, None);
    let args: Vec<_> = (0..3).map(|i| int_cst(&mut arena, i)).collect();
    let mut call = treepack::Node::new(NodeKind::CallExpr);
    if let Body::Call(body) = &mut call.body {
        body.function = Some(callee);
        body.args = args.clone();
    }
    let call = arena.push_node(call);

    let read_set = ReadSet::new();
    let mut writer = ImageWriter::create(&path, &arena, &read_set, preloaded, Config::default())?;
    writer.write_tree(call, SymbolAction::Declare)?;
    writer.close()?;

    let (mut out, _) = Arena::with_builtins();
    let reader = ImageReader::open(&path, Config::default())?;
    let image = reader.read_body(&mut out, &read_set, preloaded)?;

    let Body::Call(body) = &out.node(image.symbols()[0].node).body else {
        panic!("call lost its body");
    };
    assert_eq!(body.args.len(), 3);
    for (i, &arg) in body.args.iter().enumerate() {
        assert_eq!(out.node(arg).body, Body::IntCst { value: i as i64 });
    }
    Ok(())
}

/// Statement lists and fixed-arity expression operands survive the trip.
#[test]
fn roundtrip_statements_and_operands() -> treepack::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("stmts.tpk");

    let (mut arena, builtins) = Arena::with_builtins();
    let preloaded = Preloaded::init(&builtins);
    let cond = int_cst(&mut arena, 1);
    let value = int_cst(&mut arena, 5);
    let mut throw = treepack::Node::new(NodeKind::ThrowExpr);
    if let Body::Operands(operands) = &mut throw.body {
        operands[0] = Some(value);
    }
    let throw = arena.push_node(throw);
    let mut cond_stmt = treepack::Node::new(NodeKind::IfStmt);
    if let Body::Operands(operands) = &mut cond_stmt.body {
        operands[0] = Some(cond);
        operands[1] = Some(throw);
    }
    let cond_stmt = arena.push_node(cond_stmt);
    let mut list = treepack::Node::new(NodeKind::StatementList);
    list.body = Body::Stmts(vec![cond_stmt]);
    let list = arena.push_node(list);

    let read_set = ReadSet::new();
    let mut writer = ImageWriter::create(&path, &arena, &read_set, preloaded, Config::default())?;
    writer.write_tree(list, SymbolAction::Define)?;
    writer.close()?;

    let (mut out, _) = Arena::with_builtins();
    let reader = ImageReader::open(&path, Config::default())?;
    let image = reader.read_body(&mut out, &read_set, preloaded)?;

    let Body::Stmts(stmts) = &out.node(image.symbols()[0].node).body else {
        panic!("statement list lost its body");
    };
    assert_eq!(stmts.len(), 1);
    let Body::Operands(operands) = &out.node(stmts[0]).body else {
        panic!("if statement lost its operands");
    };
    assert_eq!(operands.len(), 3);
    let throw = operands[1].expect("if statement lost its then-branch");
    assert_eq!(out.node(throw).kind, NodeKind::ThrowExpr);
    assert!(operands[2].is_none(), "absent else-branch grew a value");
    Ok(())
}
