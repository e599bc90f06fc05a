#![allow(missing_docs)]

use treepack::cache::{Handle, PickleCache};
use treepack::{Arena, Preloaded};

/// Distinct handles get the dense slots `0..N` in insertion order;
/// re-adding an existing handle reports it and returns the original slot.
#[test]
fn cache_slots_form_a_bijection() {
    let (mut arena, _) = Arena::with_builtins();
    let nodes: Vec<_> = (0..5)
        .map(|_| arena.push_node(treepack::Node::new(treepack::NodeKind::VarDecl)))
        .collect();

    let mut cache = PickleCache::new();
    for (expected, &node) in nodes.iter().enumerate() {
        let (slot, existed) = cache.add(Handle::Tree(node));
        assert_eq!(slot as usize, expected, "slots must be dense and gapless");
        assert!(!existed, "a fresh handle reported as already present");
    }
    assert_eq!(cache.len(), nodes.len());

    let (slot, existed) = cache.add(Handle::Tree(nodes[0]));
    assert_eq!(slot, 0, "re-adding must return the original slot");
    assert!(existed, "re-adding must report the handle as present");
    assert_eq!(cache.len(), nodes.len(), "re-adding must not grow the cache");

    for (expected, &node) in nodes.iter().enumerate() {
        assert_eq!(cache.lookup(Handle::Tree(node)), Some(expected as u32));
        assert_eq!(cache.handle_at(expected as u32), Handle::Tree(node));
    }
}

/// The decode-side entry point accepts slots in announcement order and is
/// idempotent for an existing binding.
#[test]
fn cache_insert_at_follows_announcement_order() {
    let (mut arena, _) = Arena::with_builtins();
    let a = arena.push_node(treepack::Node::new(treepack::NodeKind::VarDecl));
    let b = arena.push_node(treepack::Node::new(treepack::NodeKind::VarDecl));

    let mut cache = PickleCache::new();
    cache.insert_at(Handle::Tree(a), 0);
    cache.insert_at(Handle::Tree(b), 1);
    cache.insert_at(Handle::Tree(a), 0);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.lookup(Handle::Tree(a)), Some(0));
    assert_eq!(cache.lookup(Handle::Tree(b)), Some(1));
}

/// Rebinding a slot to a different identity is a consistency failure.
#[test]
#[should_panic(expected = "record stream corrupt")]
fn cache_rejects_slot_rebinding() {
    let (mut arena, _) = Arena::with_builtins();
    let a = arena.push_node(treepack::Node::new(treepack::NodeKind::VarDecl));
    let b = arena.push_node(treepack::Node::new(treepack::NodeKind::VarDecl));

    let mut cache = PickleCache::new();
    cache.insert_at(Handle::Tree(a), 0);
    cache.insert_at(Handle::Tree(b), 0);
}

/// A reference to a slot nobody assigned is a consistency failure.
#[test]
#[should_panic(expected = "unassigned cache slot")]
fn cache_rejects_unassigned_slot() {
    let cache = PickleCache::new();
    let _ = cache.handle_at(3);
}

/// The preloaded cache covers the whole builtin catalog and hands back
/// the same ids it was initialized with.
#[test]
fn preloaded_covers_the_builtin_catalog() {
    let (_, builtins) = Arena::with_builtins();
    let preloaded = Preloaded::init(&builtins);

    let order = builtins.preload_order();
    assert_eq!(preloaded.len(), order.len());
    for (slot, &id) in order.iter().enumerate() {
        assert_eq!(preloaded.lookup(Handle::Tree(id)), Some(slot as u32));
        assert_eq!(preloaded.handle_at(slot as u32), Handle::Tree(id));
    }

    // A second init against the (deterministic) catalog is the same
    // process-wide instance.
    let (_, again) = Arena::with_builtins();
    let second = Preloaded::init(&again);
    assert_eq!(second.len(), preloaded.len());
}

/// Builtin construction is deterministic: every arena assigns the same
/// ids, which is what lets preloaded references cross processes.
#[test]
fn builtin_ids_are_deterministic() {
    let (_, first) = Arena::with_builtins();
    let (_, second) = Arena::with_builtins();
    assert_eq!(first.preload_order(), second.preload_order());
    assert_eq!(first.void_type, second.void_type);
    assert_eq!(first.global_namespace, second.global_namespace);
}
