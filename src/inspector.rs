//! Tools for inspecting the physical structure of treepack images,
//! useful for debugging encoder changes and verifying image layout.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::Config;
use crate::error::Result;
use crate::format::{HandleTag, SectionId};
use crate::reader::ImageReader;
use crate::tree::NodeKind;

/// A structural report of a treepack image.
#[derive(Debug, Serialize)]
pub struct ImageReport {
    /// The image's name.
    pub name: String,
    /// Total size of the file on disk.
    pub file_size: u64,
    /// Writer version triple.
    pub version: (u8, u8, u8),
    /// Byte size of the string table.
    pub strtab_size: u64,
    /// One entry per node data section, in file order.
    pub sections: Vec<SectionInfo>,
    /// Number of cache slots the image assigns.
    pub slot_count: u64,
    /// Slot counts per record family.
    pub families: Vec<FamilyInfo>,
    /// Tree slot counts per node kind, most frequent first.
    pub kinds: Vec<KindInfo>,
}

/// Metadata for a single node data section.
#[derive(Debug, Serialize)]
pub struct SectionInfo {
    /// Section name.
    pub name: String,
    /// Compression algorithm applied to the stored bytes.
    pub compression: String,
    /// Stored (possibly compressed) byte length.
    pub stored_size: u64,
}

/// Slot statistics for one record family.
#[derive(Debug, Serialize)]
pub struct FamilyInfo {
    /// The family name.
    pub family: String,
    /// Number of slots holding records of this family.
    pub count: u64,
}

/// Slot statistics for one tree node kind.
#[derive(Debug, Serialize)]
pub struct KindInfo {
    /// The node kind name.
    pub kind: String,
    /// Number of tree slots of this kind.
    pub count: u64,
}

/// The treepack image inspector.
#[derive(Debug)]
pub struct ImageInspector;

impl ImageInspector {
    /// Analyzes an image file and returns a structural report.
    ///
    /// Only the fixed tables are read; the record stream itself is not
    /// decoded, so inspection needs no arena, read set or preload.
    pub fn inspect<P: AsRef<Path>>(path: P) -> Result<ImageReport> {
        let reader = ImageReader::open(path, Config::default())?;
        let sections = reader
            .section_slices()
            .iter()
            .map(|slice| SectionInfo {
                name: section_name(slice.entry.id).to_owned(),
                compression: compression_name(slice.entry.compression_id),
                stored_size: slice.entry.stored_len,
            })
            .collect();

        let references = reader.slot_refs()?;
        let mut family_counts: BTreeMap<&'static str, u64> = BTreeMap::new();
        let mut kind_counts: BTreeMap<String, u64> = BTreeMap::new();
        for reference in &references {
            *family_counts.entry(family_name(reference.tag)).or_insert(0) += 1;
            if reference.tag == HandleTag::Tree {
                let kind = match NodeKind::from_u16(reference.kind) {
                    Some(kind) => kind.name().to_owned(),
                    None => format!("Unknown({})", reference.kind),
                };
                *kind_counts.entry(kind).or_insert(0) += 1;
            }
        }
        let families = family_counts
            .into_iter()
            .map(|(family, count)| FamilyInfo {
                family: family.to_owned(),
                count,
            })
            .collect();
        let mut kinds: Vec<KindInfo> = kind_counts
            .into_iter()
            .map(|(kind, count)| KindInfo { kind, count })
            .collect();
        kinds.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.kind.cmp(&b.kind)));

        Ok(ImageReport {
            name: reader.name().to_owned(),
            file_size: reader.file_size(),
            version: reader.version(),
            strtab_size: reader.strtab_size(),
            sections,
            slot_count: reader.slot_count(),
            families,
            kinds,
        })
    }
}

fn section_name(id: SectionId) -> &'static str {
    match id {
        SectionId::Includes => "Includes",
        SectionId::Main => "Main",
        SectionId::Symtab => "Symtab",
    }
}

fn compression_name(id: u8) -> String {
    match id {
        0 => "None".to_string(),
        1 => "LZ4".to_string(),
        other => format!("Unknown({other})"),
    }
}

fn family_name(tag: HandleTag) -> &'static str {
    match tag {
        HandleTag::Tree => "Tree",
        HandleTag::Scope => "Scope",
        HandleTag::Binding => "Binding",
        HandleTag::LangDecl => "LangDecl",
        HandleTag::LangType => "LangType",
        HandleTag::Function => "Function",
        HandleTag::SortedFields => "SortedFields",
        HandleTag::ClassBinding => "ClassBinding",
        HandleTag::LabelBinding => "LabelBinding",
    }
}

impl std::fmt::Display for ImageReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== TREEPACK IMAGE REPORT ===")?;
        writeln!(f, "Image:        {}", self.name)?;
        writeln!(f, "File Size:    {} bytes", self.file_size)?;
        let (major, minor, patch) = self.version;
        writeln!(f, "Version:      {major}.{minor}.{patch}")?;
        writeln!(f, "String Table: {} bytes", self.strtab_size)?;
        writeln!(f, "\n[SECTIONS]")?;
        for section in &self.sections {
            writeln!(
                f,
                "  {:<10} Size: {}b | Algo: {}",
                section.name, section.stored_size, section.compression
            )?;
        }
        writeln!(f, "\n[CACHE SLOTS] {} total", self.slot_count)?;
        for family in &self.families {
            writeln!(f, "  {:<14} {}", family.family, family.count)?;
        }
        if !self.kinds.is_empty() {
            writeln!(f, "\n[TREE KINDS]")?;
            for kind in &self.kinds {
                writeln!(f, "  {:<28} {}", kind.kind, kind.count)?;
            }
        }
        Ok(())
    }
}
