//! Pickle caches: the machinery that preserves sharing and breaks cycles.
//!
//! Every record a stream writes gets a dense *slot* in that stream's
//! [`PickleCache`] the first time it is encountered. Later occurrences
//! write only the slot, so shared subtrees stay shared and cyclic ones
//! terminate. The decoder maintains a mirror cache, registering each
//! materialized record at its announced slot before reading its fields.
//!
//! References resolve against three cache classes:
//!
//! - **internal**: this stream's own cache;
//! - **external**: the cache of a previously read image, found through
//!   the [`ReadSet`] registry;
//! - **preloaded**: the process-wide [`Preloaded`] cache of builtin
//!   singletons that are never pickled.

use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::sync::OnceLock;

use twox_hash::XxHash64;

use crate::format::HandleTag;
use crate::tree::{BindingId, Builtins, NodeId, ScopeId};

/// Identity of any record the pickle cache can hold.
///
/// Tree nodes, scopes and bindings are first-class identities. The
/// remaining variants name sub-records that are owned by a node or scope;
/// they exist so owned records can participate in the uniform framing
/// grammar and the reference table. A back-reference to an owned slot can
/// never legally appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    /// A tree node.
    Tree(NodeId),
    /// A binding scope.
    Scope(ScopeId),
    /// A name binding.
    Binding(BindingId),
    /// The language-specific declaration extension owned by a node.
    LangDecl(NodeId),
    /// The language-specific type extension owned by a node.
    LangType(NodeId),
    /// The saved function state owned by a function declaration.
    Function(NodeId),
    /// The sorted field cache owned by a class type.
    SortedFields(NodeId),
    /// A class-scope shadowed binding, keyed by owner scope and index.
    ClassBinding(ScopeId, u32),
    /// A label-scope shadowed binding, keyed by owner scope and index.
    LabelBinding(ScopeId, u32),
}

impl Handle {
    /// The wire tag for this identity's record family.
    pub fn tag(&self) -> HandleTag {
        match self {
            Self::Tree(_) => HandleTag::Tree,
            Self::Scope(_) => HandleTag::Scope,
            Self::Binding(_) => HandleTag::Binding,
            Self::LangDecl(_) => HandleTag::LangDecl,
            Self::LangType(_) => HandleTag::LangType,
            Self::Function(_) => HandleTag::Function,
            Self::SortedFields(_) => HandleTag::SortedFields,
            Self::ClassBinding(..) => HandleTag::ClassBinding,
            Self::LabelBinding(..) => HandleTag::LabelBinding,
        }
    }

    /// Unwraps a tree identity.
    ///
    /// # Panics
    ///
    /// Panics if the slot holds a different record family; the stream
    /// referenced a slot with the wrong expectation, which means it is
    /// corrupt.
    pub fn expect_tree(self) -> NodeId {
        match self {
            Self::Tree(id) => id,
            other => panic_wrong_family("tree node", other),
        }
    }

    /// Unwraps a scope identity.
    ///
    /// # Panics
    ///
    /// Panics if the slot holds a different record family.
    pub fn expect_scope(self) -> ScopeId {
        match self {
            Self::Scope(id) => id,
            other => panic_wrong_family("scope", other),
        }
    }

    /// Unwraps a binding identity.
    ///
    /// # Panics
    ///
    /// Panics if the slot holds a different record family.
    pub fn expect_binding(self) -> BindingId {
        match self {
            Self::Binding(id) => id,
            other => panic_wrong_family("binding", other),
        }
    }
}

fn panic_wrong_family(expected: &str, found: Handle) -> ! {
    unreachable!("record stream corrupt: expected a {expected} slot, found {found:?}")
}

/// One cache slot's bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct CacheEntry {
    /// The identity bound to the slot.
    pub handle: Handle,
    /// Byte offset of the slot's full record in the main section.
    /// Filled by the writer when the record starts; zero on the read side.
    pub offset: u64,
    /// Node kind code for tree slots, zero otherwise.
    pub kind_code: u16,
}

type CacheMap = HashMap<Handle, u32, BuildHasherDefault<XxHash64>>;

/// A bijection between record identities and dense slots.
///
/// Slots are assigned in first-insertion order and never reused; the
/// cache only grows.
#[derive(Debug, Default)]
pub struct PickleCache {
    map: CacheMap,
    entries: Vec<CacheEntry>,
}

impl PickleCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `handle`, returning its slot and whether it was already
    /// present. Adding an existing handle is idempotent and returns the
    /// original slot.
    pub fn add(&mut self, handle: Handle) -> (u32, bool) {
        if let Some(&slot) = self.map.get(&handle) {
            return (slot, true);
        }
        let slot = u32::try_from(self.entries.len()).unwrap_or(u32::MAX);
        self.map.insert(handle, slot);
        self.entries.push(CacheEntry {
            handle,
            offset: 0,
            kind_code: 0,
        });
        (slot, false)
    }

    /// Binds `handle` to `slot` explicitly (decode side).
    ///
    /// Slots arrive in announcement order, so `slot` must be the next
    /// fresh index or an existing binding of the same handle.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is already bound to a different handle, if
    /// `handle` is already bound to a different slot, or if `slot` skips
    /// ahead of the insertion order. All three mean the stream is corrupt.
    pub fn insert_at(&mut self, handle: Handle, slot: u32) {
        if let Some(entry) = self.entries.get(slot as usize) {
            assert!(
                entry.handle == handle,
                "record stream corrupt: slot {slot} rebound from {:?} to {handle:?}",
                entry.handle
            );
            return;
        }
        assert!(
            slot as usize == self.entries.len(),
            "record stream corrupt: slot {slot} announced out of order (next is {})",
            self.entries.len()
        );
        if let Some(&previous) = self.map.get(&handle) {
            unreachable!(
                "record stream corrupt: {handle:?} bound to both slot {previous} and slot {slot}"
            );
        }
        self.map.insert(handle, slot);
        self.entries.push(CacheEntry {
            handle,
            offset: 0,
            kind_code: 0,
        });
    }

    /// Looks up the slot bound to `handle`, if any.
    pub fn lookup(&self, handle: Handle) -> Option<u32> {
        self.map.get(&handle).copied()
    }

    /// Returns the identity bound to `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` was never assigned; a reference to it means the
    /// stream is corrupt.
    pub fn handle_at(&self, slot: u32) -> Handle {
        self.entries
            .get(slot as usize)
            .map(|e| e.handle)
            .expect("record stream corrupt: reference to unassigned cache slot")
    }

    /// Records where a slot's full record was written and what kind it
    /// holds (writer side, feeds the reference table).
    pub fn set_record_info(&mut self, slot: u32, offset: u64, kind_code: u16) {
        let entry = self
            .entries
            .get_mut(slot as usize)
            .expect("cache invariant violated: record info for unassigned slot");
        entry.offset = offset;
        entry.kind_code = kind_code;
    }

    /// All entries in slot order.
    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    /// Number of assigned slots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no slot has been assigned.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// --- PRELOADED CACHE ---

static PRELOADED: OnceLock<Preloaded> = OnceLock::new();

/// The process-wide cache of builtin singletons.
///
/// Initialized exactly once, before any stream is constructed, and
/// immutable afterwards. Streams take the `&'static Preloaded` returned
/// by [`Preloaded::init`] as a constructor argument, so a stream cannot
/// exist before the preload happened.
#[derive(Debug)]
pub struct Preloaded {
    cache: PickleCache,
}

impl Preloaded {
    /// Initializes the preloaded cache from the builtin catalog and
    /// returns the process-wide instance.
    ///
    /// The catalog is deterministic, so calling this again (e.g. from a
    /// second front end in the same process) returns the instance built
    /// by the first call.
    pub fn init(builtins: &Builtins) -> &'static Preloaded {
        PRELOADED.get_or_init(|| {
            let mut cache = PickleCache::new();
            for id in builtins.preload_order() {
                cache.add(Handle::Tree(id));
            }
            Preloaded { cache }
        })
    }

    /// Looks up the preloaded slot of `handle`, if it is a builtin.
    pub fn lookup(&self, handle: Handle) -> Option<u32> {
        self.cache.lookup(handle)
    }

    /// Returns the builtin identity at `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is outside the preload catalog.
    pub fn handle_at(&self, slot: u32) -> Handle {
        self.cache.handle_at(slot)
    }

    /// Number of preloaded slots.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// True if the catalog is empty (it never is in practice).
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

// --- READ IMAGES ---

/// What a top-level symbol asks the reader to replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SymbolAction {
    /// Declare the symbol.
    Declare = 0,
    /// Define the symbol.
    Define = 1,
}

impl SymbolAction {
    /// Decodes the wire bit.
    pub fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Declare),
            1 => Some(Self::Define),
            _ => None,
        }
    }
}

/// One entry of an image's symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// The declared or defined node.
    pub node: NodeId,
    /// What to do with it.
    pub action: SymbolAction,
}

/// A fully decoded image, retained so later streams can resolve external
/// references into it.
#[derive(Debug)]
pub struct DecodedImage {
    name: String,
    cache: PickleCache,
    symbols: Vec<Symbol>,
}

impl DecodedImage {
    pub(crate) fn new(name: String, cache: PickleCache, symbols: Vec<Symbol>) -> Self {
        Self {
            name,
            cache,
            symbols,
        }
    }

    /// The image's name as it appears in include manifests.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The image's pickle cache.
    pub fn cache(&self) -> &PickleCache {
        &self.cache
    }

    /// The image's top-level symbols in replay order.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }
}

/// The ordered registry of images read so far.
///
/// External references written by a stream index this registry; images
/// must therefore be registered in the same order on the reading side,
/// which the include manifest checks. Images stay registered until the
/// set is dropped at end of parsing.
#[derive(Debug, Default)]
pub struct ReadSet {
    images: Vec<DecodedImage>,
}

impl ReadSet {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a decoded image, returning its include index.
    pub fn register(&mut self, image: DecodedImage) -> u32 {
        let index = u32::try_from(self.images.len()).unwrap_or(u32::MAX);
        self.images.push(image);
        index
    }

    /// Scans registered images in open order for `handle`; first match
    /// wins. Returns the include index and the slot within that image.
    pub fn lookup_in_includes(&self, handle: Handle) -> Option<(u32, u32)> {
        for (index, image) in self.images.iter().enumerate() {
            if let Some(slot) = image.cache.lookup(handle) {
                return Some((index as u32, slot));
            }
        }
        None
    }

    /// Returns the image at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a registered image; an external reference
    /// to it means the stream and the registry disagree.
    pub fn image(&self, index: u32) -> &DecodedImage {
        self.images
            .get(index as usize)
            .expect("record stream corrupt: external reference to unregistered image")
    }

    /// All registered images in open order.
    pub fn images(&self) -> &[DecodedImage] {
        &self.images
    }

    /// Number of registered images.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// True if no image is registered.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
