//! Uncompressed bitmap: the baseline every compressed layout is measured
//! against.
//!
//! One bit per position, packed into `u64` words, no run structure at all.
//! Every operation is a straight loop over the words, which makes it the
//! reference model for property tests and the baseline in benchmarks.
//!
//! # Historical Context
//!
//! - Bitmap indexes (O'Neil, 1987): one uncompressed bitmap per attribute
//!   value, combined with word-wide AND/OR.
//! - Run-length schemes (BBC 1995, WAH 2002) trade this O(1) random access
//!   for space and operator speed on sparse data.

use alloc::vec::Vec;

use crate::error::{Error, Result};

/// A plain bit vector with the same operator semantics as
/// [`crate::CompressedBitset`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImplicitBitmap {
    data: Vec<u64>,
    len: u64,
}

impl ImplicitBitmap {
    /// Create an empty bitmap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the first `bit_len` bits of `bytes` (bit `i` is bit `i % 8` of
    /// byte `i / 8`).
    pub fn from_bits(bytes: &[u8], bit_len: u64) -> Result<Self> {
        let available = (bytes.len() as u64).saturating_mul(8);
        if bit_len > available {
            return Err(Error::InvalidArgument(alloc::format!(
                "{bit_len} bits requested from a {available}-bit buffer"
            )));
        }
        let mut bitmap = Self::new();
        for i in 0..bit_len {
            bitmap.push((bytes[(i / 8) as usize] >> (i % 8)) & 1 == 1);
        }
        Ok(bitmap)
    }

    /// Number of bits.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Return true if the bitmap has length 0.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Return true if bit at `pos` is set. O(1).
    pub fn get(&self, pos: u64) -> bool {
        if pos >= self.len {
            return false;
        }
        (self.data[(pos / 64) as usize] >> (pos % 64)) & 1 == 1
    }

    /// Overwrite bit `pos`, returning its previous value.
    pub fn set(&mut self, pos: u64, value: bool) -> Result<bool> {
        if pos >= self.len {
            return Err(Error::OutOfRange { pos, len: self.len });
        }
        let old = self.get(pos);
        let word = &mut self.data[(pos / 64) as usize];
        if value {
            *word |= 1 << (pos % 64);
        } else {
            *word &= !(1 << (pos % 64));
        }
        Ok(old)
    }

    /// Append one bit.
    pub fn push(&mut self, bit: bool) {
        if self.len % 64 == 0 {
            self.data.push(0);
        }
        if bit {
            if let Some(last) = self.data.last_mut() {
                *last |= 1 << (self.len % 64);
            }
        }
        self.len += 1;
    }

    /// Append `count` unset bits.
    pub fn add_zeros(&mut self, count: u64) {
        for _ in 0..count {
            self.push(false);
        }
    }

    /// Append `count` set bits.
    pub fn add_ones(&mut self, count: u64) {
        for _ in 0..count {
            self.push(true);
        }
    }

    /// Linear-time population count.
    pub fn count_ones(&self) -> u64 {
        self.data.iter().map(|w| u64::from(w.count_ones())).sum()
    }

    /// Positions of set bits, in increasing order.
    pub fn iter_ones(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.len).filter(move |&i| self.get(i))
    }

    /// Complement every bit below `len`.
    pub fn invert(&mut self) {
        for word in &mut self.data {
            *word = !*word;
        }
        self.mask_tail();
    }

    /// `self = self AND other`; past the shorter end the longer side is kept.
    pub fn and_with(&mut self, other: &Self) {
        self.combine(other, true, false, false);
    }

    /// `self = self OR other`; past the shorter end the longer side is kept.
    pub fn or_with(&mut self, other: &Self) {
        self.combine(other, false, false, false);
    }

    /// `self = self AND NOT other`.
    pub fn and_not_with(&mut self, other: &Self) {
        self.combine(other, true, false, true);
    }

    /// `self = NOT self AND other`.
    pub fn not_and_with(&mut self, other: &Self) {
        self.combine(other, true, true, false);
    }

    /// Bit-by-bit AND (or OR). Operands are negated first; a missing bit
    /// reads as the identity of the operator.
    fn combine(&mut self, other: &Self, and: bool, negate_self: bool, negate_other: bool) {
        let len = self.len.max(other.len);
        let read = |bitmap: &Self, i: u64, negate: bool| {
            if i < bitmap.len {
                bitmap.get(i) ^ negate
            } else {
                and
            }
        };
        let mut out = Self::new();
        for i in 0..len {
            let a = read(self, i, negate_self);
            let b = read(other, i, negate_other);
            out.push(if and { a && b } else { a || b });
        }
        *self = out;
    }

    fn mask_tail(&mut self) {
        let used = self.len % 64;
        if used != 0 {
            if let Some(last) = self.data.last_mut() {
                *last &= (1u64 << used) - 1;
            }
        }
    }
}
