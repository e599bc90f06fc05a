//! Pluggable compression for node data sections.
//!
//! Sections are composed in memory and compressed as single blocks at
//! flush time; the section table row records which algorithm produced
//! the stored bytes. The string table and the fixed tables around the
//! sections are never compressed, so a reader can locate everything
//! before touching a compressor.

use crate::error::{Result, TreepackError};
use std::borrow::Cow;

/// Interface for section compression algorithms.
///
/// Each compressor is identified by the id byte stored in its section
/// table row. Id 0 is reserved for pass-through.
pub trait Compressor: Send + Sync + std::fmt::Debug {
    /// The unique id recorded in section table rows.
    fn id(&self) -> u8;

    /// Compresses a section body.
    ///
    /// May borrow the input when no transformation happens.
    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>>;

    /// Decompresses a stored section body.
    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>>;
}

// --- No Compression (Pass-through) ---

/// The pass-through strategy (id 0). Stored bytes are the section bytes.
#[derive(Debug, Clone, Copy)]
pub struct NoCompression;

impl Compressor for NoCompression {
    fn id(&self) -> u8 {
        0
    }

    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Borrowed(data))
    }

    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Borrowed(data))
    }
}

// --- LZ4 Implementation ---

#[cfg(feature = "lz4_flex")]
/// LZ4 block compression (id 1), available with the `lz4_flex` feature.
///
/// The stored form carries the uncompressed size prepended, so
/// decompression needs no side channel.
#[derive(Debug, Clone, Copy)]
pub struct Lz4Compressor;

#[cfg(feature = "lz4_flex")]
impl Compressor for Lz4Compressor {
    fn id(&self) -> u8 {
        1
    }

    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Owned(lz4_flex::compress_prepend_size(data)))
    }

    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        let vec = lz4_flex::decompress_size_prepended(data)
            .map_err(|e| TreepackError::Compression(e.to_string()))?;
        Ok(Cow::Owned(vec))
    }
}

// --- REGISTRY ---

/// Maps section table algorithm ids to [`Compressor`] implementations.
#[derive(Debug)]
pub struct CompressorRegistry {
    algorithms: Vec<Option<Box<dyn Compressor>>>,
}

impl CompressorRegistry {
    /// Creates a registry with the built-in algorithms registered:
    ///
    /// *   id 0: [`NoCompression`]
    /// *   id 1: LZ4 (when the `lz4_flex` feature is enabled)
    pub fn new() -> Self {
        let mut reg = Self {
            algorithms: (0..8).map(|_| None).collect(),
        };

        reg.register(Box::new(NoCompression));

        #[cfg(feature = "lz4_flex")]
        reg.register(Box::new(Lz4Compressor));

        reg
    }

    /// Registers a compressor under the slot its `id()` names,
    /// replacing any previous registration.
    pub fn register(&mut self, algo: Box<dyn Compressor>) {
        let id = algo.id() as usize;
        if id >= self.algorithms.len() {
            self.algorithms.resize_with(id + 1, || None);
        }
        let slot = self
            .algorithms
            .get_mut(id)
            .expect("registry resized but slot missing");
        *slot = Some(algo);
    }

    /// Retrieves a compressor by id.
    ///
    /// # Errors
    /// Returns `TreepackError::Compression` if the id is not registered,
    /// e.g. an LZ4 section read by a build without the feature.
    pub fn get(&self, id: u8) -> Result<&dyn Compressor> {
        let idx = usize::from(id);
        if idx < self.algorithms.len()
            && let Some(algo) = self.algorithms.get(idx).and_then(|opt| opt.as_ref())
        {
            return Ok(algo.as_ref());
        }

        Err(TreepackError::Compression(format!(
            "Algorithm id {id} is not registered or available"
        )))
    }
}

impl Default for CompressorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
