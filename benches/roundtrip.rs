#![allow(missing_docs)]

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use treepack::cache::SymbolAction;
use treepack::tree::node::Body;
use treepack::{Arena, Config, ImageReader, ImageWriter, NodeId, NodeKind, Preloaded, ReadSet};

/// Builds a header-shaped translation: `count` classes, each with a
/// handful of members typed over a small shared pool of types, so the
/// pickle cache sees realistic sharing pressure.
fn generate_translation(count: usize) -> (Arena, Vec<NodeId>, &'static Preloaded) {
    let (mut arena, builtins) = Arena::with_builtins();
    let preloaded = Preloaded::init(&builtins);

    let pool: Vec<_> = (0..16)
        .map(|i| {
            let mut name = treepack::Node::new(NodeKind::IdentifierNode);
            if let Body::Ident(body) = &mut name.body {
                body.text = format!("Type{i}");
            }
            let name = arena.push_node(name);
            let mut ttype = treepack::Node::new(NodeKind::RecordType);
            ttype.name = Some(name);
            arena.push_node(ttype)
        })
        .collect();

    let roots = (0..count)
        .map(|i| {
            let fields: Vec<_> = (0..8)
                .map(|j| {
                    let mut name = treepack::Node::new(NodeKind::IdentifierNode);
                    if let Body::Ident(body) = &mut name.body {
                        body.text = format!("field_{i}_{j}");
                    }
                    let name = arena.push_node(name);
                    let mut field = treepack::Node::new(NodeKind::FieldDecl);
                    field.name = Some(name);
                    field.ttype = Some(pool[(i + j) % pool.len()]);
                    arena.push_node(field)
                })
                .collect();
            for window in fields.windows(2) {
                arena.node_mut(window[0]).chain = Some(window[1]);
            }

            let mut name = treepack::Node::new(NodeKind::IdentifierNode);
            if let Body::Ident(body) = &mut name.body {
                body.text = format!("Class{i}");
            }
            let name = arena.push_node(name);
            let mut class = treepack::Node::new(NodeKind::RecordType);
            class.name = Some(name);
            if let Body::Type(body) = &mut class.body {
                body.values = Some(fields[0]);
            }
            arena.push_node(class)
        })
        .collect();

    (arena, roots, preloaded)
}

fn write_image(
    path: &std::path::Path,
    arena: &Arena,
    roots: &[NodeId],
    preloaded: &'static Preloaded,
) -> treepack::Result<()> {
    let read_set = ReadSet::new();
    let mut writer = ImageWriter::create(path, arena, &read_set, preloaded, Config::default())?;
    for &root in roots {
        writer.write_tree(root, SymbolAction::Define)?;
    }
    writer.close()
}

fn bench_encode(c: &mut Criterion) {
    let class_count = 1_000;
    let (arena, roots, preloaded) = generate_translation(class_count);
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bench.tpk");

    write_image(&path, &arena, &roots, preloaded).expect("probe write");
    let image_size = std::fs::metadata(&path).expect("probe metadata").len();
    println!("Encode image size: {image_size} bytes, {class_count} classes");

    let mut group = c.benchmark_group("Image Write");
    group.throughput(Throughput::Bytes(image_size));
    group.bench_function("treepack_encode", |b| {
        b.iter(|| {
            write_image(&path, black_box(&arena), black_box(&roots), preloaded)
                .expect("bench write");
        });
    });
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let class_count = 1_000;
    let (arena, roots, preloaded) = generate_translation(class_count);
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bench.tpk");
    write_image(&path, &arena, &roots, preloaded).expect("bench write");
    let image_size = std::fs::metadata(&path).expect("metadata").len();

    let mut group = c.benchmark_group("Image Read");
    group.throughput(Throughput::Bytes(image_size));
    group.bench_function("treepack_decode", |b| {
        let read_set = ReadSet::new();
        b.iter(|| {
            let (mut out, _) = Arena::with_builtins();
            let reader = ImageReader::open(&path, Config::default()).expect("open");
            let image = reader
                .read_body(&mut out, &read_set, preloaded)
                .expect("decode");
            black_box(image.symbols().len());
        });
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
