//! Centralized error handling for treepack.
//!
//! All recoverable failure conditions are surfaced through the [`Result`]
//! type. The library distinguishes two failure worlds:
//!
//! 1. **Recoverable errors** ([`TreepackError`]): anything the caller can
//!    reasonably react to. Opening a missing image, a magic-byte mismatch,
//!    a truncated file, an undecodable token blob. These are returned as
//!    `Err` values and never panic.
//!
//! 2. **Consistency violations**: a record stream that contradicts itself
//!    mid-decode (an unknown marker byte, a slot bound to two different
//!    objects, a union selector outside the closed set). These indicate a
//!    corrupted image or a bug, there is no sensible way to continue
//!    decoding a compiler state image past them, and they abort with a
//!    descriptive panic message.
//!
//! Errors are `Clone` so they can be stored alongside cached images;
//! I/O errors are wrapped in `Arc` to keep cloning cheap.
//!
//! ## Error propagation with `?`
//!
//! ```rust
//! use treepack::{Result, TreepackError};
//!
//! fn parse_version(raw: &[u8]) -> Result<u8> {
//!     match raw.first() {
//!         Some(&major) => Ok(major),
//!         None => Err(TreepackError::Format("empty header".into())),
//!     }
//! }
//!
//! assert!(parse_version(&[]).is_err());
//! # Ok::<(), TreepackError>(())
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for treepack operations.
///
/// Equivalent to `std::result::Result<T, TreepackError>`; used throughout
/// the library.
pub type Result<T> = std::result::Result<T, TreepackError>;

/// The master error enum covering all recoverable failure domains.
///
/// ## Variants
///
/// - **Io:** low-level I/O failures (file not found, permission denied,
///   disk full)
/// - **Serialization:** token-blob or report encoding/decoding failures
///   (bincode)
/// - **Compression:** section compression/decompression failures
/// - **Format:** image validation failures (wrong magic bytes, version
///   mismatch, truncation, malformed tables)
///
/// ## Examples
///
/// ```rust
/// use treepack::TreepackError;
///
/// fn describe(err: &TreepackError) -> &'static str {
///     match err {
///         TreepackError::Io(_) => "io",
///         TreepackError::Format(_) => "format",
///         _ => "other",
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum TreepackError {
    /// Low-level I/O failure while writing or mapping an image.
    ///
    /// The underlying `io::Error` is wrapped in an `Arc` to make the
    /// error `Clone`.
    Io(Arc<io::Error>),

    /// Serialization or deserialization failure (bincode).
    ///
    /// Raised when an opaque token-cache blob or an inspector report
    /// cannot be encoded or decoded. The string carries the bincode
    /// diagnostic.
    Serialization(String),

    /// Compression algorithm failure.
    ///
    /// Corrupted compressed section data, or an algorithm id this build
    /// does not support (e.g. an LZ4 section read by a build without the
    /// `lz4_flex` feature).
    Compression(String),

    /// The image is invalid, corrupted, or version-incompatible.
    ///
    /// - wrong magic bytes
    /// - major version mismatch
    /// - truncated file (header, tables or sections out of bounds)
    /// - an include manifest that does not match the registered read set
    Format(String),
}

impl fmt::Display for TreepackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O Error: {e}"),
            Self::Serialization(s) => write!(f, "Serialization Error: {s}"),
            Self::Compression(s) => write!(f, "Compression Error: {s}"),
            Self::Format(s) => write!(f, "Format Error: {s}"),
        }
    }
}

impl std::error::Error for TreepackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TreepackError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
