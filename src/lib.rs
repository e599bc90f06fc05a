//! # Treepack
//!
//! A cycle-safe streaming engine that pickles compiler tree graphs into
//! binary images and replays them, preserving every shared subtree and
//! surviving arbitrary cycles.
//!
//! ## Overview
//!
//! A front end's parse product is not a tree but a graph: declarations
//! point at their types, types back at their declarations, scopes chain
//! to parents that contain them, and the same builtin nodes appear
//! everywhere. Treepack serializes such a graph from an [`Arena`] into an
//! *image* on disk, and decodes images back into an arena so a later
//! compilation can skip parsing entirely.
//!
//! ### Key Features
//!
//! *   **Structural Sharing:** Every record is assigned a dense cache
//!     slot the first time it is written. Later occurrences emit a
//!     back-reference, so a subtree reachable over ten paths is pickled
//!     once and restored as one object.
//! *   **Cycle Safety:** The decoder registers each record in its cache
//!     *before* reading the record's fields. A field that points back at
//!     a record still being decoded resolves to the already-materialized
//!     object instead of recursing forever.
//! *   **External References:** A node that was itself decoded from a
//!     previously read image is never re-pickled; the writer emits a
//!     reference naming that image and the node's slot inside it.
//! *   **Preloaded Builtins:** Builtin singletons shared by every
//!     translation live in a process-wide cache and travel as two-byte
//!     references.
//! *   **Bit-Packed Flags:** Runs of flag bits and narrow enums are
//!     packed into varint-encoded words with compile-time-checked field
//!     widths.
//! *   **Optional Compression:** Image sections can be compressed with
//!     LZ4 (feature: `lz4_flex`).
//! *   **Tracing:** Every primitive transfer can be logged through the
//!     [`log`] facade without altering stream contents.
//!
//! ## Architecture
//!
//! ### The Record Grammar
//!
//! Node data is a stream of records. Each record opens with a one-byte
//! marker that says whether content follows and, for references, which
//! cache resolves the slot that follows: this stream's own cache, the
//! cache of a previously read image, or the process-wide preloaded
//! cache. Content records carry their fresh slot, then their fields;
//! fields that are themselves records nest recursively.
//!
//! ### File Format
//!
//! The physical layout is written front-to-back:
//! ```text
//! [Image Header] [String Table] [Section Table]
//! [Includes] [Main] [Symtab] [Reference Table]
//! ```
//!
//! The includes section names every image the writer resolved external
//! references against, in order; the reader refuses to decode against a
//! different set. The symbol table lists the top-level declarations in
//! replay order. The reference table records, for every cache slot, the
//! record family, node kind and byte offset of its full record.
//!
//! ## Core Concepts
//!
//! ### `Arena`
//!
//! The [`Arena`] owns every node, scope and binding of a translation and
//! hands out copyable ids. Decoding materializes into the same arena the
//! caller parses into, so decoded and parsed nodes are indistinguishable.
//!
//! ### Writer and Reader
//!
//! An [`ImageWriter`] is created against a destination path, fed roots
//! with [`ImageWriter::write_tree`], and flushed once with
//! [`ImageWriter::close`]. An [`ImageReader`] memory-maps an image,
//! validates its layout, and decodes the node data with
//! [`ImageReader::read_body`]. Each stream moves in exactly one
//! direction; dropping a writer without closing it leaves no usable
//! image.
//!
//! ### `ReadSet` and `Preloaded`
//!
//! The [`ReadSet`] registry holds the images decoded so far and gives
//! external references their meaning; writer and reader must be handed
//! the same registry in the same order. [`Preloaded`] is the
//! process-wide builtin cache; stream constructors require the
//! `&'static` token returned by [`Preloaded::init`], so no stream can
//! exist before the builtins are cached.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use treepack::{Arena, Config, ImageReader, ImageWriter, Preloaded, ReadSet};
//! use treepack::cache::SymbolAction;
//!
//! let (mut arena, builtins) = Arena::with_builtins();
//! let preloaded = Preloaded::init(&builtins);
//! // ... parse declarations into the arena ...
//!
//! let mut read_set = ReadSet::new();
//! let mut writer =
//!     ImageWriter::create("unit.tpk", &arena, &read_set, preloaded, Config::default())?;
//! writer.write_tree(my_decl, SymbolAction::Define)?;
//! writer.close()?;
//!
//! let reader = ImageReader::open("unit.tpk", Config::default())?;
//! let image = reader.read_body(&mut arena, &read_set, preloaded)?;
//! read_set.register(image);
//! ```
//!
//! ### Safety and Error Handling
//!
//! * **Encapsulated Unsafe:** `unsafe` code appears once, in the
//!   `reader` module, to memory-map the image file.
//! * **Two Failure Classes:** Anything that can fail before decoding
//!   starts, opening files, validating headers and manifests, unknown
//!   compression, returns a [`TreepackError`]. Once a record stream is
//!   being decoded, an inconsistency means the image or the engine is
//!   broken; decoding aborts with a diagnostic rather than materializing
//!   a corrupt graph.
//! * **No Silent Truncation:** Reference tables, section bounds and
//!   include manifests are cross-checked against what the stream
//!   actually announced.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod bitpack;
pub mod cache;
pub mod compression;
pub mod error;
pub mod format;
pub mod inspector;
pub mod reader;
pub mod tokens;
pub mod tree;
pub mod writer;

// --- INTERNAL IMPLEMENTATION MODULES (Hidden from Docs) ---
#[doc(hidden)]
pub mod strings;
#[doc(hidden)]
pub mod trace;

// Private modules holding the two halves of the record-stream contract.
mod decode;
mod encode;

// --- RE-EXPORTS ---

#[cfg(feature = "lz4_flex")]
pub use compression::Lz4Compressor;
pub use compression::{Compressor, CompressorRegistry, NoCompression};

pub use cache::{DecodedImage, Handle, PickleCache, Preloaded, ReadSet, Symbol, SymbolAction};
pub use error::{Result, TreepackError};
pub use reader::ImageReader;
pub use tree::{Arena, Body, Builtins, Node, NodeId, NodeKind};
pub use writer::ImageWriter;

/// Engine options shared by writers and readers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    /// Tracing verbosity. Zero disables tracing entirely.
    pub trace_level: u8,
    /// Report node kinds the engine transports without contents.
    pub log_unimplemented: bool,
    /// Compression algorithm applied to image sections when writing.
    /// Zero stores sections uncompressed.
    pub compression_id: u8,
}
