//! The image string table.
//!
//! Identifier spellings, string constants and file names are interned once
//! per image and referenced from record streams by byte offset. The table
//! body is a flat blob of `(varint length, utf-8 bytes)` entries; the
//! header records its total size so the reader can locate the sections
//! that follow.
//!
//! On the wire a string reference is `offset + 1`, with `0` meaning
//! "absent", so the first interned string (offset 0) stays representable.

use std::collections::HashMap;
use std::hash::BuildHasherDefault;

use twox_hash::XxHash64;

use crate::format::{read_uleb, write_uleb};

/// Write-side interning table.
#[derive(Debug, Default)]
pub struct StringTable {
    map: HashMap<String, u32, BuildHasherDefault<XxHash64>>,
    blob: Vec<u8>,
}

impl StringTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `text`, returning its byte offset in the table body.
    ///
    /// Repeated interning of the same text returns the same offset.
    pub fn intern(&mut self, text: &str) -> u32 {
        if let Some(&offset) = self.map.get(text) {
            return offset;
        }
        let offset = self.blob.len() as u32;
        write_uleb(&mut self.blob, text.len() as u64);
        self.blob.extend_from_slice(text.as_bytes());
        self.map.insert(text.to_owned(), offset);
        offset
    }

    /// Total byte size of the table body.
    pub fn size(&self) -> u64 {
        self.blob.len() as u64
    }

    /// The raw table body, ready to be written after the image header.
    pub fn as_bytes(&self) -> &[u8] {
        &self.blob
    }
}

/// Read-side view over a mapped string table.
#[derive(Debug, Clone, Copy)]
pub struct StringView<'a> {
    bytes: &'a [u8],
}

impl<'a> StringView<'a> {
    /// Wraps the table body located by the image header.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Resolves the string at `offset`.
    ///
    /// Offsets come from the record stream; one that does not point at a
    /// well-formed entry means the image is corrupt and aborts.
    pub fn get(&self, offset: u32) -> &'a str {
        let mut pos = offset as usize;
        assert!(
            pos < self.bytes.len(),
            "string table corrupt: offset {offset} out of bounds"
        );
        let len = read_uleb(self.bytes, &mut pos) as usize;
        let end = pos.checked_add(len).unwrap_or(usize::MAX);
        assert!(
            end <= self.bytes.len(),
            "string table corrupt: entry at {offset} overruns the table"
        );
        std::str::from_utf8(&self.bytes[pos..end])
            .expect("string table corrupt: entry is not valid utf-8")
    }
}
