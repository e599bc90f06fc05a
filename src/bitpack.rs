//! Bit-level packing of dense flag and enum field runs.
//!
//! Many records carry long runs of one-bit flags and narrow enums. Writing
//! each as a full byte would double some record sizes, so runs are packed
//! LSB-first into 64-bit words, and the words are emitted as varints.
//!
//! The field/width sequence is a symmetric contract: the decoder must pull
//! exactly the widths the encoder pushed, in the same order. A mismatch is
//! not detectable at this layer; it decodes to garbage. Widths are const
//! generic parameters so a field's width is fixed at the call site and
//! checked at compile time.
//!
//! A value never straddles a word boundary. When a field does not fit in
//! the bits remaining, the current word is flushed and the field starts a
//! fresh word, on both sides of the contract.

use crate::format::{read_uleb, write_uleb};

const WORD_BITS: u32 = 64;

/// Accumulates `(value, width)` pairs for one packed run.
///
/// ```rust
/// use treepack::bitpack::BitPacker;
///
/// let mut bp = BitPacker::new();
/// bp.push::<4>(9);
/// bp.push_bool(true);
/// bp.push_bool(false);
/// let words = bp.into_words();
/// assert_eq!(words, vec![0b01_1001]);
/// ```
#[derive(Debug, Default)]
pub struct BitPacker {
    words: Vec<u64>,
    word: u64,
    pos: u32,
}

impl BitPacker {
    /// Creates an empty packer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Packs `value` into the next `WIDTH` bits.
    ///
    /// `WIDTH` must be between 1 and 32; a value that does not fit in
    /// `WIDTH` bits indicates a caller bug and aborts.
    pub fn push<const WIDTH: u32>(&mut self, value: u32) {
        const {
            assert!(WIDTH >= 1 && WIDTH <= 32);
        }
        assert!(
            WIDTH == 32 || value < (1u32 << WIDTH),
            "bitpack value {value} does not fit in {WIDTH} bits"
        );
        if self.pos + WIDTH > WORD_BITS {
            self.words.push(self.word);
            self.word = 0;
            self.pos = 0;
        }
        self.word |= u64::from(value) << self.pos;
        self.pos += WIDTH;
    }

    /// Packs a single boolean bit.
    pub fn push_bool(&mut self, flag: bool) {
        self.push::<1>(u32::from(flag));
    }

    /// Finishes the run, returning the packed words in emission order.
    pub fn into_words(mut self) -> Vec<u64> {
        if self.pos > 0 {
            self.words.push(self.word);
        }
        self.words
    }
}

/// Writes a finished packed run into `buf` as varint words.
pub fn write_bitpack(buf: &mut Vec<u8>, packer: BitPacker) -> usize {
    let words = packer.into_words();
    for word in &words {
        write_uleb(buf, *word);
    }
    words.len()
}

/// Unpacks a run written by [`BitPacker`], pulling words from the record
/// stream lazily as fields require them.
///
/// The unpacker starts empty; the first `pull` fetches the first word.
#[derive(Debug)]
pub struct BitUnpacker {
    word: u64,
    bits_used: u32,
    fetched: usize,
}

impl BitUnpacker {
    /// Creates an unpacker positioned before the run's first word.
    pub fn new() -> Self {
        Self {
            word: 0,
            bits_used: WORD_BITS,
            fetched: 0,
        }
    }

    /// Pulls the next `WIDTH`-bit field, reading a fresh word from
    /// `bytes` at `*pos` when the current one is exhausted.
    pub fn pull<const WIDTH: u32>(&mut self, bytes: &[u8], pos: &mut usize) -> u32 {
        const {
            assert!(WIDTH >= 1 && WIDTH <= 32);
        }
        if self.bits_used + WIDTH > WORD_BITS {
            self.word = read_uleb(bytes, pos);
            self.bits_used = 0;
            self.fetched += 1;
        }
        let mask = (1u64 << WIDTH) - 1;
        let value = (self.word >> self.bits_used) & mask;
        self.bits_used += WIDTH;
        value as u32
    }

    /// Pulls a single boolean bit.
    pub fn pull_bool(&mut self, bytes: &[u8], pos: &mut usize) -> bool {
        self.pull::<1>(bytes, pos) != 0
    }

    /// Number of words consumed from the stream so far.
    pub fn words_fetched(&self) -> usize {
        self.fetched
    }
}

impl Default for BitUnpacker {
    fn default() -> Self {
        Self::new()
    }
}
