//! Word layouts and the tagged run word.
//!
//! A compressed bitmap is a sequence of *blocks* of `PAYLOAD_BITS` bits each
//! (one bit of every machine word is reserved as the fill/literal tag). The
//! logical model is the [`Word`] enum; the bit-packed machine representation
//! only exists at the serialization boundary ([`Word::encode`] /
//! [`Word::decode`]).
//!
//! # Packed layout
//!
//! ```text
//! literal:  [ 0 | payload (W-1 bits)                                  ]
//! fill:     [ 1 | value | pos5 .. pos0 (6 bits each) | counter        ]
//!             ^W-1  ^W-2                               ^0
//! ```
//!
//! Each `pos` field holds `exception position + 1`, zero meaning unused.
//! [`Wah32`] has no position fields at all.

use core::fmt::Debug;

use crate::error::{Error, Result};

/// Width-dependent constants of a WAH-family encoding.
pub trait WordLayout: Copy + Debug + Default + PartialEq + Eq + 'static {
    /// Bits per machine word.
    const WORD_BITS: u32;

    /// Bits of the block counter in a fill word.
    const COUNTER_BITS: u32;

    /// Maximum number of exception positions a fill word can carry.
    const MAX_EXCEPTIONS: u32;

    /// Serialization magic.
    const MAGIC: &'static [u8; 8];

    /// Payload bits per block.
    const PAYLOAD_BITS: u32 = Self::WORD_BITS - 1;

    /// Payload bits per block, widened for length arithmetic.
    const BLOCK_BITS: u64 = Self::PAYLOAD_BITS as u64;

    /// A block with every payload bit set.
    const ALL_ONES: u64 = (1u64 << Self::PAYLOAD_BITS) - 1;

    /// Largest block counter a single fill word can hold.
    const MAX_BLOCKS: u32 = ((1u64 << Self::COUNTER_BITS) - 1) as u32;
}

/// Classic 32-bit WAH: 31-bit blocks, no exception positions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Wah32;

impl WordLayout for Wah32 {
    const WORD_BITS: u32 = 32;
    const COUNTER_BITS: u32 = 30;
    const MAX_EXCEPTIONS: u32 = 0;
    const MAGIC: &'static [u8; 8] = b"WAHBIT32";
}

/// Position-list WAH on 64-bit words: 63-bit blocks, up to six exceptions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Plwah64;

impl WordLayout for Plwah64 {
    const WORD_BITS: u32 = 64;
    const COUNTER_BITS: u32 = 26;
    const MAX_EXCEPTIONS: u32 = 6;
    const MAGIC: &'static [u8; 8] = b"WAHBIT64";
}

const POSITION_BITS: u32 = 6;

/// Mask with the lowest `bits` bits set (`bits <= 64`).
#[inline]
pub(crate) fn low_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// The all-`value` block of layout `L`.
#[inline]
pub fn uniform<L: WordLayout>(value: bool) -> u64 {
    if value {
        L::ALL_ONES
    } else {
        0
    }
}

/// One element of the run sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Word {
    /// One block stored verbatim. Never all-0 or all-1 once normalized.
    Literal(u64),
    /// `blocks` uniform blocks of `value`, followed by one extra block equal
    /// to `uniform(value) ^ exceptions` when `exceptions != 0`.
    Fill {
        /// Bit value of the uniform blocks.
        value: bool,
        /// Number of uniform blocks.
        blocks: u32,
        /// Payload mask of the bits flipped in the trailing block.
        exceptions: u64,
    },
}

impl Word {
    /// A fill without exceptions.
    #[inline]
    pub const fn fill(value: bool, blocks: u32) -> Self {
        Word::Fill {
            value,
            blocks,
            exceptions: 0,
        }
    }

    /// Number of blocks this word spans.
    #[inline]
    pub fn block_count(&self) -> u64 {
        match *self {
            Word::Literal(_) => 1,
            Word::Fill {
                blocks, exceptions, ..
            } => blocks as u64 + u64::from(exceptions != 0),
        }
    }

    /// Number of set bits this word covers.
    #[inline]
    pub fn count_ones<L: WordLayout>(&self) -> u64 {
        match *self {
            Word::Literal(bits) => bits.count_ones() as u64,
            Word::Fill {
                value,
                blocks,
                exceptions,
            } => {
                let uniform_ones = if value { blocks as u64 * L::BLOCK_BITS } else { 0 };
                let tail_ones = match (exceptions, value) {
                    (0, _) => 0,
                    (e, true) => L::BLOCK_BITS - e.count_ones() as u64,
                    (e, false) => e.count_ones() as u64,
                };
                uniform_ones + tail_ones
            }
        }
    }

    /// Returns `true` for a fill of `value` that carries no exceptions.
    #[inline]
    pub fn is_plain_fill(&self, of: bool) -> bool {
        matches!(*self, Word::Fill { value, exceptions: 0, .. } if value == of)
    }

    /// Complements every bit the word covers.
    #[inline]
    pub fn invert<L: WordLayout>(&mut self) {
        match self {
            Word::Literal(bits) => *bits = !*bits & L::ALL_ONES,
            Word::Fill { value, .. } => *value = !*value,
        }
    }

    /// Packs the word into its machine representation.
    pub fn encode<L: WordLayout>(&self) -> u64 {
        let tag = 1u64 << (L::WORD_BITS - 1);
        match *self {
            Word::Literal(bits) => bits & L::ALL_ONES,
            Word::Fill {
                value,
                blocks,
                exceptions,
            } => {
                debug_assert!(blocks <= L::MAX_BLOCKS);
                debug_assert!(exceptions.count_ones() <= L::MAX_EXCEPTIONS);
                let mut raw = tag | blocks as u64;
                if value {
                    raw |= 1u64 << (L::WORD_BITS - 2);
                }
                let mut rest = exceptions;
                let mut field = 0;
                while rest != 0 {
                    let pos = rest.trailing_zeros() as u64;
                    raw |= (pos + 1) << (L::COUNTER_BITS + POSITION_BITS * field);
                    rest &= rest - 1;
                    field += 1;
                }
                raw
            }
        }
    }

    /// Unpacks a machine word, rejecting malformed position lists.
    pub fn decode<L: WordLayout>(raw: u64) -> Result<Self> {
        if raw.checked_shr(L::WORD_BITS).unwrap_or(0) != 0 {
            return Err(Error::InvalidEncoding(alloc::format!(
                "word {raw:#x} wider than {} bits",
                L::WORD_BITS
            )));
        }
        if (raw >> (L::WORD_BITS - 1)) & 1 == 0 {
            return Ok(Word::Literal(raw));
        }

        let value = (raw >> (L::WORD_BITS - 2)) & 1 == 1;
        let blocks = (raw & low_mask(L::COUNTER_BITS)) as u32;
        let mut exceptions = 0u64;
        let mut seen_empty = false;
        for field in 0..L::MAX_EXCEPTIONS {
            let shift = L::COUNTER_BITS + POSITION_BITS * field;
            let slot = (raw >> shift) & low_mask(POSITION_BITS);
            if slot == 0 {
                seen_empty = true;
                continue;
            }
            let pos = slot - 1;
            if seen_empty || pos >= L::BLOCK_BITS || exceptions & (1 << pos) != 0 {
                return Err(Error::InvalidEncoding(alloc::format!(
                    "malformed exception list in fill word {raw:#x}"
                )));
            }
            exceptions |= 1 << pos;
        }

        let used = L::COUNTER_BITS + POSITION_BITS * L::MAX_EXCEPTIONS;
        let unused = (raw >> used) & low_mask(L::WORD_BITS - 2 - used);
        if unused != 0 {
            return Err(Error::InvalidEncoding(alloc::format!(
                "reserved bits set in fill word {raw:#x}"
            )));
        }

        Ok(Word::Fill {
            value,
            blocks,
            exceptions,
        })
    }
}
