//! Defines the physical binary layout of treepack images.
//!
//! # Image Layout
//! An image is written front-to-back in a fixed order:
//!
//! `[Image Header] [String Table] [Section Table] [Section 0] ... [Reference Table]`
//!
//! ## Image Header
//! `Magic(4) + Major(1) + Minor(1) + Patch(1) + StrtabSize(8) = 15 bytes`
//!
//! The version triple is the crate version of the writer. Readers accept
//! an image only when the major byte matches their own.
//!
//! ## Record grammar
//! Node data inside the main section is a stream of *records*. Every
//! record opens with a one-byte [`RecordMarker`] that says whether content
//! follows and, for references, against which cache the payload slot
//! resolves. Integers inside record streams are LEB128 varints; the fixed
//! tables around them use plain little-endian fields.

use crate::error::{Result, TreepackError};

/// Magic bytes identifying the image format: "TPAK".
pub const MAGIC_BYTES: [u8; 4] = *b"TPAK";

/// The fixed size of the image header.
/// Magic(4) + Major(1) + Minor(1) + Patch(1) + StrtabSize(8) = 15
pub const IMAGE_HEADER_SIZE: usize = 15;

fn version_byte(raw: &str) -> u8 {
    raw.parse().unwrap_or(0)
}

/// The writer's version triple, taken from the crate version.
pub fn crate_version() -> (u8, u8, u8) {
    (
        version_byte(env!("CARGO_PKG_VERSION_MAJOR")),
        version_byte(env!("CARGO_PKG_VERSION_MINOR")),
        version_byte(env!("CARGO_PKG_VERSION_PATCH")),
    )
}

/// The fixed-size header at the very start of an image.
#[derive(Debug, Clone, Copy)]
pub struct ImageHeader {
    /// Format identification bytes, always [`MAGIC_BYTES`].
    pub magic: [u8; 4],
    /// Writer major version. Must match the reader's major exactly.
    pub major: u8,
    /// Writer minor version. Informational.
    pub minor: u8,
    /// Writer patch version. Informational.
    pub patch: u8,
    /// Byte size of the string table that immediately follows.
    pub strtab_size: u64,
}

impl ImageHeader {
    /// Creates a header for the current crate version.
    pub fn new(strtab_size: u64) -> Self {
        let (major, minor, patch) = crate_version();
        Self {
            magic: MAGIC_BYTES,
            major,
            minor,
            patch,
            strtab_size,
        }
    }

    /// Serializes the header to its fixed-size byte form (Little Endian).
    pub fn to_bytes(&self) -> [u8; IMAGE_HEADER_SIZE] {
        let mut buf = [0u8; IMAGE_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4] = self.major;
        buf[5] = self.minor;
        buf[6] = self.patch;
        buf[7..15].copy_from_slice(&self.strtab_size.to_le_bytes());
        buf
    }

    /// Parses a header from the start of a mapped image.
    ///
    /// Only checks that enough bytes are present; magic and version
    /// validation is the reader's job so it can report file context.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < IMAGE_HEADER_SIZE {
            return Err(TreepackError::Format(
                "Buffer too small for image header".into(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        let strtab_size = u64::from_le_bytes(bytes[7..15].try_into().unwrap_or([0; 8]));
        Ok(Self {
            magic,
            major: bytes[4],
            minor: bytes[5],
            patch: bytes[6],
            strtab_size,
        })
    }
}

/// The first byte of every record in a node data section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordMarker {
    /// No object. Nothing follows.
    End = 0,
    /// New content: a fresh cache slot follows, then the full record body.
    Start = 1,
    /// Reference into this stream's own cache: a slot follows.
    InternalRef = 2,
    /// Reference into another image's cache: include index + slot follow.
    ExternalRef = 3,
    /// Reference into the process-wide preloaded cache: a slot follows.
    PreloadedRef = 4,
}

impl RecordMarker {
    /// Decodes a marker byte. `None` means the stream is corrupt.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::End),
            1 => Some(Self::Start),
            2 => Some(Self::InternalRef),
            3 => Some(Self::ExternalRef),
            4 => Some(Self::PreloadedRef),
            _ => None,
        }
    }

    /// The wire byte for this marker.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Identifies one of the node data sections of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SectionId {
    /// Manifest of include image names, in external-reference order.
    Includes = 0,
    /// The record stream holding all pickled tree data.
    Main = 1,
    /// Ordered top-level symbols (cache slot + action flags).
    Symtab = 2,
}

impl SectionId {
    /// Number of section kinds. The section table always has this many rows.
    pub const COUNT: usize = 3;

    /// Decodes a section id byte.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Includes),
            1 => Some(Self::Main),
            2 => Some(Self::Symtab),
            _ => None,
        }
    }

    /// The wire byte for this section id.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One row of the section table.
#[derive(Debug, Clone, Copy)]
pub struct SectionEntry {
    /// Which section this row describes.
    pub id: SectionId,
    /// Compression algorithm applied to the stored bytes (0 = none).
    pub compression_id: u8,
    /// Stored (possibly compressed) byte length of the section.
    pub stored_len: u64,
}

impl SectionEntry {
    /// The size in bytes of a serialized section table row.
    pub const SIZE: usize = 10; // id(1) + compression(1) + stored_len(8)

    /// Serializes to a fixed-size byte array (Little Endian).
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = self.id.as_u8();
        buf[1] = self.compression_id;
        buf[2..10].copy_from_slice(&self.stored_len.to_le_bytes());
        buf
    }

    /// Deserializes from a fixed-size byte array.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(TreepackError::Format(
                "Buffer too small for section table row".into(),
            ));
        }
        let id = SectionId::from_u8(bytes[0]).ok_or_else(|| {
            TreepackError::Format(format!("Unknown section id {}", bytes[0]))
        })?;
        let stored_len = u64::from_le_bytes(bytes[2..10].try_into().unwrap_or([0; 8]));
        Ok(Self {
            id,
            compression_id: bytes[1],
            stored_len,
        })
    }
}

/// Wire tag naming which record family a cache slot holds.
///
/// Mirrors the cache `Handle` variants one-to-one; the reference table
/// stores it so a slot can be classified without re-decoding the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandleTag {
    /// A tree node.
    Tree = 0,
    /// A binding scope.
    Scope = 1,
    /// A name binding.
    Binding = 2,
    /// The language-specific declaration extension of a node.
    LangDecl = 3,
    /// The language-specific type extension of a node.
    LangType = 4,
    /// The saved function-parsing state of a function declaration.
    Function = 5,
    /// The sorted field cache of a class type.
    SortedFields = 6,
    /// A class-scope shadowed binding (owner scope + index).
    ClassBinding = 7,
    /// A label-scope shadowed binding (owner scope + index).
    LabelBinding = 8,
}

impl HandleTag {
    /// Decodes a handle tag byte.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Tree),
            1 => Some(Self::Scope),
            2 => Some(Self::Binding),
            3 => Some(Self::LangDecl),
            4 => Some(Self::LangType),
            5 => Some(Self::Function),
            6 => Some(Self::SortedFields),
            7 => Some(Self::ClassBinding),
            8 => Some(Self::LabelBinding),
            _ => None,
        }
    }

    /// The wire byte for this tag.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One row of the reference table: where a cache slot's full record lives.
///
/// Written for every slot the writer assigned, in slot order. Enough to
/// re-resolve or classify a slot without decoding the main section.
#[derive(Debug, Clone, Copy)]
pub struct SlotRef {
    /// Record family of the slot.
    pub tag: HandleTag,
    /// Node kind code for tree slots, 0 otherwise.
    pub kind: u16,
    /// Byte offset of the slot's `Start` record inside the main section.
    pub offset: u64,
}

impl SlotRef {
    /// The size in bytes of a serialized reference table row.
    pub const SIZE: usize = 11; // tag(1) + kind(2) + offset(8)

    /// Serializes to a fixed-size byte array (Little Endian).
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = self.tag.as_u8();
        buf[1..3].copy_from_slice(&self.kind.to_le_bytes());
        buf[3..11].copy_from_slice(&self.offset.to_le_bytes());
        buf
    }

    /// Deserializes from a fixed-size byte array.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(TreepackError::Format(
                "Buffer too small for reference table row".into(),
            ));
        }
        let tag = HandleTag::from_u8(bytes[0]).ok_or_else(|| {
            TreepackError::Format(format!("Unknown handle tag {}", bytes[0]))
        })?;
        let kind = u16::from_le_bytes(bytes[1..3].try_into().unwrap_or([0; 2]));
        let offset = u64::from_le_bytes(bytes[3..11].try_into().unwrap_or([0; 8]));
        Ok(Self { tag, kind, offset })
    }
}

// --- VARINTS ---

/// Appends `value` to `buf` as an unsigned LEB128 varint.
pub fn write_uleb(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Reads an unsigned LEB128 varint at `*pos`, advancing it.
///
/// A truncated or over-long varint means the record stream is corrupt;
/// this aborts rather than guessing at alignment.
pub fn read_uleb(bytes: &[u8], pos: &mut usize) -> u64 {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        assert!(
            *pos < bytes.len(),
            "record stream corrupt: varint truncated at byte {pos}",
            pos = *pos
        );
        assert!(shift < 64, "record stream corrupt: varint exceeds 64 bits");
        let byte = bytes[*pos];
        *pos += 1;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return value;
        }
        shift += 7;
    }
}

/// Appends `value` as a zigzag-encoded signed LEB128 varint.
pub fn write_sleb(buf: &mut Vec<u8>, value: i64) {
    let zigzag = ((value << 1) ^ (value >> 63)) as u64;
    write_uleb(buf, zigzag);
}

/// Reads a zigzag-encoded signed LEB128 varint at `*pos`, advancing it.
pub fn read_sleb(bytes: &[u8], pos: &mut usize) -> i64 {
    let zigzag = read_uleb(bytes, pos);
    ((zigzag >> 1) as i64) ^ -((zigzag & 1) as i64)
}
