//! Stream tracing.
//!
//! Every primitive the writer emits and the reader consumes can be logged
//! through the [`log`] facade, one line per operation, tagged with the
//! stream name and the transfer direction. Tracing is observation only:
//! no code path may branch on it, and a build with tracing disabled
//! produces byte-identical images.
//!
//! Verbosity is controlled by [`Config::trace_level`](crate::Config):
//!
//! | level | reported                                      |
//! |-------|-----------------------------------------------|
//! | 0     | nothing                                       |
//! | 1     | tree records                                  |
//! | 2     | plus scalars, strings, locations, chains      |
//! | 3     | plus byte blobs, bit packs and absent trees   |

use std::path::Path;

use log::{debug, trace};

use crate::Config;
use crate::format::RecordMarker;
use crate::tree::NodeKind;

/// The stream name used in trace lines for a file at `path`.
pub(crate) fn stream_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Transfer direction of a traced stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Data flowing out to an image.
    Write,
    /// Data flowing in from an image.
    Read,
}

impl Direction {
    fn symbol(self) -> &'static str {
        match self {
            Direction::Write => "<<",
            Direction::Read => ">>",
        }
    }
}

/// Per-stream tracer.
///
/// Owned by a writer or reader and handed every primitive as it happens.
#[derive(Debug)]
pub struct Tracer {
    name: String,
    direction: Direction,
    level: u8,
    log_unimplemented: bool,
}

impl Tracer {
    /// Creates a tracer for the stream `name`.
    pub(crate) fn new(name: impl Into<String>, direction: Direction, config: &Config) -> Self {
        Self {
            name: name.into(),
            direction,
            level: config.trace_level,
            log_unimplemented: config.log_unimplemented,
        }
    }

    fn on(&self, min: u8) -> bool {
        self.level >= min
    }

    fn prefix(&self) -> String {
        format!("{} {}", self.name, self.direction.symbol())
    }

    /// A tree record. Absent trees are only reported at level 3.
    pub fn tree(&self, node: Option<(NodeKind, u32)>) {
        match node {
            Some((kind, id)) if self.on(1) => {
                trace!(target: "treepack", "{} tree {} #{id}", self.prefix(), kind.name());
            }
            None if self.on(3) => {
                trace!(target: "treepack", "{} tree (none)", self.prefix());
            }
            _ => {}
        }
    }

    /// A record marker, with the cache slot when one applies.
    pub fn marker(&self, marker: RecordMarker, slot: Option<u32>) {
        if self.on(2) {
            match slot {
                Some(slot) => trace!(
                    target: "treepack",
                    "{} marker {marker:?} slot {slot}", self.prefix()
                ),
                None => trace!(target: "treepack", "{} marker {marker:?}", self.prefix()),
            }
        }
    }

    /// An unsigned scalar.
    pub fn uint(&self, value: u64) {
        if self.on(2) {
            trace!(target: "treepack", "{} uint {value}", self.prefix());
        }
    }

    /// A signed scalar.
    pub fn int(&self, value: i64) {
        if self.on(2) {
            trace!(target: "treepack", "{} int {value}", self.prefix());
        }
    }

    /// A string, possibly absent.
    pub fn string(&self, value: Option<&str>) {
        if self.on(2) {
            match value {
                Some(s) => trace!(target: "treepack", "{} string {s:?}", self.prefix()),
                None => trace!(target: "treepack", "{} string (none)", self.prefix()),
            }
        }
    }

    /// An opaque byte blob. Only the length is reported.
    pub fn bytes(&self, len: usize) {
        if self.on(3) {
            trace!(target: "treepack", "{} bytes [{len}]", self.prefix());
        }
    }

    /// A source location.
    pub fn location(&self, file: Option<&str>, line: u32, column: u32) {
        if self.on(2) {
            let file = file.unwrap_or("<unknown>");
            trace!(target: "treepack", "{} location {file}:{line}:{column}", self.prefix());
        }
    }

    /// A node chain of `count` elements.
    pub fn chain(&self, count: u32) {
        if self.on(2) {
            trace!(target: "treepack", "{} chain [{count}]", self.prefix());
        }
    }

    /// A bit pack of `words` 64-bit words.
    pub fn bitpack(&self, words: usize) {
        if self.on(3) {
            trace!(target: "treepack", "{} bitpack [{words} words]", self.prefix());
        }
    }

    /// A node kind the engine transports without contents.
    ///
    /// Reported through `debug!` rather than `trace!` so that builds
    /// auditing coverage can surface these without full tracing, but only
    /// when the stream asked for it.
    pub fn unimplemented(&self, kind: NodeKind) {
        if self.log_unimplemented {
            debug!(
                target: "treepack",
                "{} unimplemented tree node {}", self.prefix(), kind.name()
            );
        }
    }
}
