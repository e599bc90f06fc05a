//! The Read-Side Engine.
//!
//! Handles memory-mapping an image file, validating its global structure
//! and exposing the decompressed sections to the record decoder. Opening
//! is where every recoverable failure lives: once [`ImageReader::open`]
//! returns, the header, section table and reference table are known to be
//! internally consistent, and later stages treat contradictions as
//! corruption rather than as errors to hand back.

use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::Config;
use crate::compression::CompressorRegistry;
use crate::error::{Result, TreepackError};
use crate::format::{
    IMAGE_HEADER_SIZE, ImageHeader, MAGIC_BYTES, SectionEntry, SectionId, SlotRef, crate_version,
};
use crate::strings::StringView;

/// One located section: its table row plus its byte offset in the file.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SectionSlice {
    pub(crate) entry: SectionEntry,
    pub(crate) offset: usize,
}

/// The main handle for reading an image.
///
/// Holds the memory map and the validated layout. Decoding the node data
/// is a separate step, [`ImageReader::read_body`], so layout inspection
/// does not force a full decode.
#[derive(Debug)]
pub struct ImageReader {
    mmap: Mmap,
    header: ImageHeader,
    name: String,
    config: Config,
    registry: CompressorRegistry,
    sections: [SectionSlice; SectionId::COUNT],
    ref_table_offset: usize,
    ref_count: u64,
    file_size: u64,
}

impl ImageReader {
    /// Opens an image file and validates its global structure.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < IMAGE_HEADER_SIZE as u64 {
            return Err(TreepackError::Format("File smaller than image header".into()));
        }

        // Safety: Mmap is fundamentally unsafe as external processes could
        // modify the file. We assume exclusive access or accept the risk
        // for performance (standard practice).
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };

        let header = ImageHeader::from_bytes(&mmap)?;
        if header.magic != MAGIC_BYTES {
            return Err(TreepackError::Format("Invalid magic bytes".into()));
        }
        let (major, _, _) = crate_version();
        if header.major != major {
            return Err(TreepackError::Format(format!(
                "Unsupported image version {}.{}.{} (this build reads major {major})",
                header.major, header.minor, header.patch
            )));
        }

        let strtab_end = (IMAGE_HEADER_SIZE as u64)
            .checked_add(header.strtab_size)
            .filter(|&end| end <= file_size)
            .ok_or_else(|| TreepackError::Format("String table exceeds file bounds".into()))?;

        // Section table: one fixed-size row per section, in id order.
        let table_len = (SectionId::COUNT * SectionEntry::SIZE) as u64;
        if strtab_end + table_len > file_size {
            return Err(TreepackError::Format("File truncated in section table".into()));
        }
        let expected = [SectionId::Includes, SectionId::Main, SectionId::Symtab];
        let mut cursor = strtab_end + table_len;
        let mut sections = [SectionSlice {
            entry: SectionEntry {
                id: SectionId::Includes,
                compression_id: 0,
                stored_len: 0,
            },
            offset: 0,
        }; SectionId::COUNT];
        for (index, slice) in sections.iter_mut().enumerate() {
            let row_start = strtab_end as usize + index * SectionEntry::SIZE;
            let entry = SectionEntry::from_bytes(&mmap[row_start..])?;
            if entry.id != expected[index] {
                return Err(TreepackError::Format(format!(
                    "Section table out of order: row {index} holds {:?}",
                    entry.id
                )));
            }
            *slice = SectionSlice {
                entry,
                offset: cursor as usize,
            };
            cursor = cursor
                .checked_add(entry.stored_len)
                .filter(|&end| end <= file_size)
                .ok_or_else(|| {
                    TreepackError::Format("Section data exceeds file bounds".into())
                })?;
        }

        // Reference table: u64 count, then fixed-size rows to end of file.
        if cursor + 8 > file_size {
            return Err(TreepackError::Format("File truncated in reference table".into()));
        }
        let ref_table_offset = cursor as usize;
        let count_bytes = &mmap[ref_table_offset..ref_table_offset + 8];
        let ref_count = u64::from_le_bytes(count_bytes.try_into().unwrap_or([0; 8]));
        let rows_len = ref_count
            .checked_mul(SlotRef::SIZE as u64)
            .ok_or_else(|| TreepackError::Format("Reference table count overflows".into()))?;
        if cursor + 8 + rows_len != file_size {
            return Err(TreepackError::Format(format!(
                "Reference table size mismatch: {ref_count} rows do not fill the file"
            )));
        }

        let name = path.file_name().map_or_else(
            || path.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        );
        Ok(Self {
            mmap,
            header,
            name,
            config,
            registry: CompressorRegistry::new(),
            sections,
            ref_table_offset,
            ref_count,
            file_size,
        })
    }

    /// The image's name, as include manifests of dependent images cite it.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The writer's version triple recorded in the header.
    pub fn version(&self) -> (u8, u8, u8) {
        (self.header.major, self.header.minor, self.header.patch)
    }

    /// Total size of the image file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Byte size of the string table.
    pub fn strtab_size(&self) -> u64 {
        self.header.strtab_size
    }

    /// Number of cache slots the image's reference table describes.
    pub fn slot_count(&self) -> u64 {
        self.ref_count
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn strings(&self) -> StringView<'_> {
        let start = IMAGE_HEADER_SIZE;
        let end = start + self.header.strtab_size as usize;
        StringView::new(&self.mmap[start..end])
    }

    pub(crate) fn section_slices(&self) -> &[SectionSlice; SectionId::COUNT] {
        &self.sections
    }

    /// The decompressed bytes of one section.
    ///
    /// Uncompressed sections borrow straight from the memory map.
    pub(crate) fn section_bytes(&self, id: SectionId) -> Result<Cow<'_, [u8]>> {
        let slice = self.sections[id.as_u8() as usize];
        let start = slice.offset;
        let end = start + slice.entry.stored_len as usize;
        let raw = &self.mmap[start..end];
        self.registry.get(slice.entry.compression_id)?.decompress(raw)
    }

    /// Parses the reference table into slot order.
    pub(crate) fn slot_refs(&self) -> Result<Vec<SlotRef>> {
        let mut refs = Vec::with_capacity(self.ref_count as usize);
        for index in 0..self.ref_count as usize {
            let start = self.ref_table_offset + 8 + index * SlotRef::SIZE;
            refs.push(SlotRef::from_bytes(&self.mmap[start..])?);
        }
        Ok(refs)
    }
}
