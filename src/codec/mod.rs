//! LZRW3-A block decoder for the PostScript plots embedded in type-221
//! records.
//!
//! # Block layout
//! ```text
//! [ flag: u32 LE ][ payload ... ]
//! ```
//! A flag of `1` means the payload is stored verbatim; `0` means it is a
//! stream of LZRW3-A groups.  Any other flag is a format violation.
//!
//! # Compressed stream
//! Items are governed by 16-bit little-endian control words, consumed lowest
//! bit first.  A clear bit is a literal byte.  A set bit is a two-byte copy
//! item: the low nibble of the first byte is `length - 3` (so 3..=18) and the
//! remaining 12 bits index a hash table of earlier output offsets.  The
//! decoder rebuilds that table exactly as the compressor did, so the codec
//! parameters (hash depth, seed string, multiplier) must match the writer.
//! Nothing in the block records them.
//!
//! # Endianness
//! The flag and control words are little-endian.  This is the only
//! little-endian data in an Mk4 file.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

/// Number of hash-table slots.
pub const HASH_TABLE_LEN: usize = 4096;
/// Copy items reference at most this many bytes.
pub const MAX_COPY_LEN: usize = 18;

const GROUP_ITEMS: usize = 16;
// A full group of 16 copy items needs 32 input bytes.
const BULK_THRESHOLD: usize = 2 * GROUP_ITEMS;
const CONTROL_SENTINEL: u32 = 0x1_0000;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid copy flag: 0x{0:08x}")]
    InvalidFlag(u32),
    #[error("Invalid codec parameters: {0}")]
    InvalidParams(String),
    #[error("Corrupt compressed block: {0}")]
    Corrupt(String),
}

// ── Block flag ───────────────────────────────────────────────────────────────

/// The 4-byte flag at the start of every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFlag {
    Compressed,
    Stored,
}

impl BlockFlag {
    pub const LEN: usize = 4;

    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            0 => Some(BlockFlag::Compressed),
            1 => Some(BlockFlag::Stored),
            _ => None,
        }
    }

    /// Read the flag from the head of `block`.
    pub fn read(block: &[u8]) -> Result<Self, CodecError> {
        if block.len() < Self::LEN {
            let mut padded = [0xffu8; Self::LEN];
            padded[..block.len()].copy_from_slice(block);
            return Err(CodecError::InvalidFlag(LittleEndian::read_u32(&padded)));
        }
        let value = LittleEndian::read_u32(&block[..Self::LEN]);
        Self::from_value(value).ok_or(CodecError::InvalidFlag(value))
    }
}

// ── Parameters ───────────────────────────────────────────────────────────────

/// Codec parameters shared by compressor and decompressor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lzrw3aParams {
    /// Hash bucket width in bits (`0..=12`); each bucket holds `2^depth` slots.
    pub depth:      u32,
    /// Bytes emitted for a copy item whose hash slot was never filled.
    pub seed:       [u8; MAX_COPY_LEN],
    /// Multiplier applied to each 3-byte window before bucketing.
    pub multiplier: u64,
}

impl Default for Lzrw3aParams {
    fn default() -> Self {
        Self {
            depth:      3,
            seed:       *b"123456789012345678",
            multiplier: 40543,
        }
    }
}

impl Lzrw3aParams {
    fn validate(&self) -> Result<(), CodecError> {
        if self.depth > 12 {
            return Err(CodecError::InvalidParams(format!(
                "hash depth {} exceeds 12 bits", self.depth
            )));
        }
        Ok(())
    }
}

// ── Decoder ──────────────────────────────────────────────────────────────────

/// Hash table plus the rotating slot cursor, scoped to one decode call.
struct HashTable {
    slots:    Box<[Option<usize>; HASH_TABLE_LEN]>,
    cycle:    usize,
    depth:    u32,
    mask:     u64,
    dmask:    usize,
    multiply: u64,
}

impl HashTable {
    fn new(params: &Lzrw3aParams) -> Self {
        Self {
            slots:    Box::new([None; HASH_TABLE_LEN]),
            cycle:    0,
            depth:    params.depth,
            mask:     (1u64 << (12 - params.depth)) - 1,
            dmask:    (1usize << params.depth) - 1,
            multiply: params.multiplier,
        }
    }

    fn bucket(&self, window: &[u8]) -> usize {
        let mixed = ((window[0] as u64) << 8) ^ ((window[1] as u64) << 4) ^ window[2] as u64;
        ((((self.multiply.wrapping_mul(mixed)) >> 4) & self.mask) as usize) << self.depth
    }

    fn insert(&mut self, bucket: usize, offset: usize) {
        self.slots[bucket + self.cycle] = Some(offset);
        self.cycle = (self.cycle + 1) & self.dmask;
    }

    /// Hash the 3-byte window of `out` starting at `offset`.
    fn insert_window(&mut self, out: &[u8], offset: usize) -> Result<(), CodecError> {
        let window = out.get(offset..offset + 3).ok_or_else(|| {
            CodecError::Corrupt(format!("hash window at {offset} past output end {}", out.len()))
        })?;
        let bucket = self.bucket(window);
        self.insert(bucket, offset);
        Ok(())
    }
}

fn input_byte(input: &[u8], at: usize) -> Result<u8, CodecError> {
    input.get(at).copied().ok_or_else(|| {
        CodecError::Corrupt(format!("item at offset {at} runs past block end {}", input.len()))
    })
}

/// Decompress a block with the default parameters.
pub fn decompress(block: &[u8]) -> Result<Vec<u8>, CodecError> {
    decompress_with(block, &Lzrw3aParams::default())
}

/// Decompress a block produced with `params`.
///
/// Output length is not recorded in the block; decoding stops when the input
/// is consumed.
pub fn decompress_with(block: &[u8], params: &Lzrw3aParams) -> Result<Vec<u8>, CodecError> {
    match BlockFlag::read(block)? {
        BlockFlag::Stored     => return Ok(block[BlockFlag::LEN..].to_vec()),
        BlockFlag::Compressed => {}
    }
    params.validate()?;

    let input = block;
    let mut pos  = BlockFlag::LEN;
    let mut out  = Vec::with_capacity(input.len() * 2);
    let mut hash = HashTable::new(params);
    let mut control  = 1u32;
    let mut literals = 0usize;

    while pos < input.len() {
        if control == 1 {
            control = input_byte(input, pos)? as u32
                | (input_byte(input, pos + 1)? as u32) << 8
                | CONTROL_SENTINEL;
            pos += 2;
        }

        let items = if pos + BULK_THRESHOLD <= input.len() { GROUP_ITEMS } else { 1 };
        for _ in 0..items {
            if control & 1 != 0 {
                let b0  = input_byte(input, pos)?;
                let b1  = input_byte(input, pos + 1)?;
                pos += 2;
                let len   = (b0 & 0x0f) as usize + 3;
                let index = b1 as usize | ((b0 & 0xf0) as usize) << 4;
                let start = out.len();

                match hash.slots[index] {
                    None => out.extend_from_slice(&params.seed[..len]),
                    // One byte at a time: the source may overlap what this
                    // copy is writing, which repeats the pattern.
                    Some(from) => {
                        for i in from..from + len {
                            let b = out[i];
                            out.push(b);
                        }
                    }
                }

                if literals > 0 {
                    let first = start - literals;
                    hash.insert_window(&out, first)?;
                    if literals == 2 {
                        hash.insert_window(&out, first + 1)?;
                    }
                    literals = 0;
                }
                hash.insert(index & !hash.dmask, start);
            } else {
                out.push(input_byte(input, pos)?);
                pos += 1;
                if literals == 2 {
                    hash.insert_window(&out, out.len() - 3)?;
                } else {
                    literals += 1;
                }
            }
            control >>= 1;
        }
    }

    Ok(out)
}
