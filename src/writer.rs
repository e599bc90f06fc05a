//! The Write-Side Engine.
//!
//! An [`ImageWriter`] pickles trees from an arena into an image file. It
//! buffers the node data sections in memory while records are written,
//! then lays the whole image out in one pass when [`ImageWriter::close`]
//! is called. A writer that is dropped without closing produces no usable
//! image; the partial file keeps whatever was flushed, which is nothing,
//! since all section data is buffered until close.
//!
//! The writer moves in one direction only. Creating it opens the stream,
//! closing it consumes the value, so a closed stream cannot be written to
//! and a written-to stream cannot be reopened.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::warn;

use crate::Config;
use crate::bitpack::{BitPacker, write_bitpack};
use crate::cache::{Handle, PickleCache, Preloaded, ReadSet, SymbolAction};
use crate::compression::CompressorRegistry;
use crate::error::Result;
use crate::format::{ImageHeader, RecordMarker, SectionEntry, SectionId, SlotRef, write_uleb};
use crate::strings::StringTable;
use crate::trace::{Direction, Tracer, stream_name};
use crate::tree::{Arena, SourceLocation};

/// The main handle for writing an image.
///
/// Borrows the arena it pickles from and the registry of images already
/// read, so external references can be resolved while encoding.
#[derive(Debug)]
pub struct ImageWriter<'a> {
    pub(crate) arena: &'a Arena,
    pub(crate) read_set: &'a ReadSet,
    pub(crate) preloaded: &'static Preloaded,
    pub(crate) cache: PickleCache,
    pub(crate) symbols: Vec<(u32, SymbolAction)>,
    pub(crate) tracer: Tracer,
    strings: StringTable,
    main: Vec<u8>,
    sink: BufWriter<File>,
    registry: CompressorRegistry,
    compression_id: u8,
    path: PathBuf,
    closed: bool,
}

impl<'a> ImageWriter<'a> {
    /// Creates a writer for a new image at `path`. The file is truncated.
    ///
    /// Fails if the file cannot be created or if `config` names a
    /// compression algorithm this build does not provide.
    pub fn create<P: AsRef<Path>>(
        path: P,
        arena: &'a Arena,
        read_set: &'a ReadSet,
        preloaded: &'static Preloaded,
        config: Config,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let registry = CompressorRegistry::new();
        registry.get(config.compression_id)?;
        let file = File::create(&path)?;
        let tracer = Tracer::new(stream_name(&path), Direction::Write, &config);
        Ok(Self {
            arena,
            read_set,
            preloaded,
            cache: PickleCache::new(),
            symbols: Vec::new(),
            tracer,
            strings: StringTable::new(),
            main: Vec::new(),
            sink: BufWriter::new(file),
            registry,
            compression_id: config.compression_id,
            path,
            closed: false,
        })
    }

    /// Flushes the complete image and consumes the writer.
    ///
    /// Layout order: header, string table, section table, the three node
    /// data sections, reference table. Nothing reaches the file before
    /// this call.
    pub fn close(mut self) -> Result<()> {
        // Build the small sections first; interning include names must
        // happen before the header captures the string table size.
        let mut includes = Vec::new();
        write_uleb(&mut includes, self.read_set.len() as u64);
        for image in self.read_set.images() {
            let offset = self.strings.intern(image.name());
            write_uleb(&mut includes, u64::from(offset));
        }

        let mut symtab = Vec::new();
        write_uleb(&mut symtab, self.symbols.len() as u64);
        for &(slot, action) in &self.symbols {
            write_uleb(&mut symtab, u64::from(slot));
            write_uleb(&mut symtab, u64::from(action as u8));
        }

        let main = std::mem::take(&mut self.main);
        let compressor = self.registry.get(self.compression_id)?;
        let sections: [(SectionId, &[u8]); SectionId::COUNT] = [
            (SectionId::Includes, &includes),
            (SectionId::Main, &main),
            (SectionId::Symtab, &symtab),
        ];
        let mut stored: Vec<Cow<'_, [u8]>> = Vec::with_capacity(SectionId::COUNT);
        for (_, bytes) in &sections {
            stored.push(compressor.compress(bytes)?);
        }

        let header = ImageHeader::new(self.strings.size());
        self.sink.write_all(&header.to_bytes())?;
        self.sink.write_all(self.strings.as_bytes())?;

        for (i, (id, _)) in sections.iter().enumerate() {
            let entry = SectionEntry {
                id: *id,
                compression_id: self.compression_id,
                stored_len: stored[i].len() as u64,
            };
            self.sink.write_all(&entry.to_bytes())?;
        }
        for bytes in &stored {
            self.sink.write_all(bytes)?;
        }

        let entries = self.cache.entries();
        self.sink.write_all(&(entries.len() as u64).to_le_bytes())?;
        for entry in entries {
            let slot_ref = SlotRef {
                tag: entry.handle.tag(),
                kind: entry.kind_code,
                offset: entry.offset,
            };
            self.sink.write_all(&slot_ref.to_bytes())?;
        }

        self.sink.flush()?;
        self.closed = true;
        Ok(())
    }

    // --- RECORD FRAMING ---

    /// Opens a record for `handle`, resolving its provenance.
    ///
    /// Emits a reference marker and returns `false` when the record is
    /// already covered by the preloaded cache, this stream's cache or a
    /// previously read image. Otherwise assigns a fresh slot, emits a
    /// content marker and returns `true`: the caller must now write the
    /// record's body.
    pub(crate) fn begin_record(&mut self, handle: Handle, kind_code: u16) -> bool {
        if let Some(slot) = self.preloaded.lookup(handle) {
            self.main.push(RecordMarker::PreloadedRef.as_u8());
            write_uleb(&mut self.main, u64::from(slot));
            self.tracer.marker(RecordMarker::PreloadedRef, Some(slot));
            return false;
        }
        if let Some(slot) = self.cache.lookup(handle) {
            self.main.push(RecordMarker::InternalRef.as_u8());
            write_uleb(&mut self.main, u64::from(slot));
            self.tracer.marker(RecordMarker::InternalRef, Some(slot));
            return false;
        }
        if let Some((image, slot)) = self.read_set.lookup_in_includes(handle) {
            self.main.push(RecordMarker::ExternalRef.as_u8());
            write_uleb(&mut self.main, u64::from(image));
            write_uleb(&mut self.main, u64::from(slot));
            self.tracer.marker(RecordMarker::ExternalRef, Some(slot));
            return false;
        }
        let offset = self.main.len() as u64;
        let (slot, _) = self.cache.add(handle);
        self.cache.set_record_info(slot, offset, kind_code);
        self.main.push(RecordMarker::Start.as_u8());
        write_uleb(&mut self.main, u64::from(slot));
        self.tracer.marker(RecordMarker::Start, Some(slot));
        true
    }

    // --- PRIMITIVES ---

    /// Writes a bare record marker, used for absent nested records.
    pub(crate) fn out_marker(&mut self, marker: RecordMarker) {
        self.main.push(marker.as_u8());
        self.tracer.marker(marker, None);
    }

    /// Writes an unsigned scalar as a varint.
    pub(crate) fn out_uleb(&mut self, value: u64) {
        write_uleb(&mut self.main, value);
        self.tracer.uint(value);
    }

    /// Writes a signed scalar as a zigzag varint.
    pub(crate) fn out_sleb(&mut self, value: i64) {
        crate::format::write_sleb(&mut self.main, value);
        self.tracer.int(value);
    }

    /// Writes a possibly absent string as a table reference.
    pub(crate) fn out_str(&mut self, value: Option<&str>) {
        match value {
            Some(text) => {
                let offset = self.strings.intern(text);
                write_uleb(&mut self.main, u64::from(offset) + 1);
            }
            None => write_uleb(&mut self.main, 0),
        }
        self.tracer.string(value);
    }

    /// Writes a possibly absent source location.
    pub(crate) fn out_location(&mut self, location: Option<&SourceLocation>) {
        match location {
            Some(loc) => {
                let offset = self.strings.intern(&loc.file);
                write_uleb(&mut self.main, u64::from(offset) + 1);
                write_uleb(&mut self.main, u64::from(loc.line));
                write_uleb(&mut self.main, u64::from(loc.column));
                self.tracer.location(Some(&loc.file), loc.line, loc.column);
            }
            None => {
                write_uleb(&mut self.main, 0);
                self.tracer.location(None, 0, 0);
            }
        }
    }

    /// Writes a finished bit pack.
    pub(crate) fn out_bitpack(&mut self, packer: BitPacker) {
        let words = write_bitpack(&mut self.main, packer);
        self.tracer.bitpack(words);
    }

    /// Writes a length-prefixed opaque byte blob.
    pub(crate) fn out_bytes(&mut self, bytes: &[u8]) {
        write_uleb(&mut self.main, bytes.len() as u64);
        self.main.extend_from_slice(bytes);
        self.tracer.bytes(bytes.len());
    }
}

impl Drop for ImageWriter<'_> {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                target: "treepack",
                "image writer for {} dropped without close; no usable image was produced",
                self.path.display()
            );
        }
    }
}
