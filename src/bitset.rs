//! Word-aligned hybrid compressed bitset.
//!
//! The bitmap is cut into blocks of `L::PAYLOAD_BITS` bits. Committed blocks
//! live in a normalized run sequence (see [`crate::word`]); the trailing
//! `len % PAYLOAD_BITS` bits stay in an uncommitted *pending* block until
//! enough bits arrive to complete it.
//!
//! # Layout
//!
//! ```text
//! runs:    [fill 0 x1200] [literal] [fill 1 x3 +exc] [literal] ...
//! pending: 0b0000..0110 (len % PAYLOAD_BITS valid bits, LSB first)
//! ```
//!
//! Appends are O(1) amortized. `get`, `set` and `reset` walk the run
//! sequence, so they cost O(runs before the position). Binary operators
//! stream both operands block by block, jumping over fill runs, and are
//! linear in the compressed size of the inputs.

use alloc::vec::Vec;
use core::fmt;

use tracing::{debug, trace};

use crate::builder::{check_normal_form, RunBuilder};
use crate::enumerator::{BitPositions, RunEnumerator, RunState};
use crate::error::{Error, Result};
use crate::word::{low_mask, uniform, Plwah64, Word, WordLayout};

/// A run-length compressed bitset.
///
/// `L` selects the word layout: [`Plwah64`] (default, 63-bit blocks with up
/// to six exception positions per fill) or [`crate::Wah32`].
#[derive(Clone, PartialEq, Eq)]
pub struct CompressedBitset<L: WordLayout = Plwah64> {
    runs: RunBuilder<L>,
    /// Logical length in bits.
    len: u64,
    /// Number of set bits.
    active: u64,
    /// Uncommitted trailing bits, LSB first.
    pending: u64,
}

impl<L: WordLayout> fmt::Debug for CompressedBitset<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressedBitset")
            .field("len", &self.len)
            .field("ones", &self.active)
            .field("runs", &self.runs.words().len())
            .finish()
    }
}

impl<L: WordLayout> Default for CompressedBitset<L> {
    fn default() -> Self {
        Self::with_layout()
    }
}

/// Appends bits in order, one run of equal bits at a time.
///
/// # Panics
///
/// Panics if the length would overflow `u64`.
impl<L: WordLayout> Extend<bool> for CompressedBitset<L> {
    fn extend<I: IntoIterator<Item = bool>>(&mut self, iter: I) {
        let mut iter = iter.into_iter().peekable();
        while let Some(bit) = iter.next() {
            let mut run = 1u64;
            while iter.next_if_eq(&bit).is_some() {
                run += 1;
            }
            let appended = if bit {
                self.add_ones(run)
            } else {
                self.add_zeros(run)
            };
            if let Err(err) = appended {
                panic!("cannot extend bitset: {err}");
            }
        }
    }
}

impl<L: WordLayout> FromIterator<bool> for CompressedBitset<L> {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut bitset = Self::with_layout();
        bitset.extend(iter);
        bitset
    }
}

impl CompressedBitset {
    /// Create an empty bitset with the default [`Plwah64`] layout.
    pub fn new() -> Self {
        Self::with_layout()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    And,
    Or,
}

impl Op {
    #[inline]
    fn apply(self, a: u64, b: u64) -> u64 {
        match self {
            Op::And => a & b,
            Op::Or => a | b,
        }
    }

    /// Value that leaves the other operand unchanged.
    #[inline]
    fn identity(self) -> bool {
        matches!(self, Op::And)
    }
}

/// A contiguous stretch of an operand as seen by a binary operator.
#[derive(Clone, Copy, Debug)]
enum Segment {
    Fill { value: bool, blocks: u64 },
    Block(u64),
}

impl Segment {
    #[inline]
    fn block<L: WordLayout>(self) -> u64 {
        match self {
            Segment::Fill { value, .. } => uniform::<L>(value),
            Segment::Block(block) => block,
        }
    }
}

/// One side of a binary operator: a cursor, an optional negation, and the
/// value its missing bits read as once the operand is exhausted.
struct Operand<'a, L> {
    cursor: RunEnumerator<'a, L>,
    negate: bool,
    padding: bool,
}

impl<'a, L: WordLayout> Operand<'a, L> {
    fn new(bitset: &'a CompressedBitset<L>, negate: bool, padding: bool) -> Self {
        Self {
            cursor: RunEnumerator::new(bitset),
            negate,
            padding,
        }
    }

    fn segment(&self) -> Segment {
        let flip = if self.negate { L::ALL_ONES } else { 0 };
        match self.cursor.state() {
            RunState::Fill { value, remaining } => Segment::Fill {
                value: value ^ self.negate,
                blocks: remaining,
            },
            RunState::Exceptions(block) | RunState::Literal(block) => Segment::Block(block ^ flip),
            RunState::Pending => {
                let valid = low_mask(self.cursor.block_bits());
                let data = (self.cursor.current_word() ^ flip) & valid;
                Segment::Block(data | (uniform::<L>(self.padding) & !valid))
            }
            RunState::Done => Segment::Fill {
                value: self.padding,
                blocks: u64::MAX,
            },
        }
    }

    fn advance(&mut self, blocks: u64) {
        match self.cursor.state() {
            RunState::Fill { .. } => self.cursor.skip_fill(blocks),
            RunState::Done => {}
            _ => {
                debug_assert_eq!(blocks, 1);
                self.cursor.advance();
            }
        }
    }
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    off: usize,
}

impl<'a> ByteReader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.off
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::InvalidEncoding("unexpected end of input".into()));
        }
        let slice = &self.bytes[self.off..self.off + n];
        self.off += n;
        Ok(slice)
    }

    /// Little-endian integer of `n <= 8` bytes.
    fn u64(&mut self, n: usize) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf[..n].copy_from_slice(self.take(n)?);
        Ok(u64::from_le_bytes(buf))
    }
}

/// Byte buffer reader handing out up to 64 bits at a time, LSB first.
struct BitReader<'a> {
    bytes: &'a [u8],
    pos: u64,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read(&mut self, count: u32) -> u64 {
        debug_assert!(count <= 64);
        let mut out = 0u64;
        let mut got = 0u32;
        while got < count {
            let byte = self.bytes[(self.pos / 8) as usize];
            let shift = (self.pos % 8) as u32;
            let take = (8 - shift).min(count - got);
            out |= (u64::from(byte >> shift) & low_mask(take)) << got;
            got += take;
            self.pos += u64::from(take);
        }
        out
    }
}

impl<L: WordLayout> CompressedBitset<L> {
    /// Create an empty bitset for an explicitly chosen layout.
    pub fn with_layout() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty bitset with room for `words` run words.
    pub fn with_capacity(words: usize) -> Self {
        Self {
            runs: RunBuilder::with_capacity(words),
            len: 0,
            active: 0,
            pending: 0,
        }
    }

    /// Build a bitset holding the first `bit_len` bits of `bytes`.
    ///
    /// Bit `i` is bit `i % 8` of byte `i / 8`.
    pub fn from_bits(bytes: &[u8], bit_len: u64) -> Result<Self> {
        let mut bitset = Self::with_layout();
        bitset.add_bits(bytes, bit_len)?;
        Ok(bitset)
    }

    /// Rebuild a bitset from its run words, length and pending block.
    ///
    /// The parts must describe a bitset in normal form.
    pub fn from_parts(words: Vec<Word>, len: u64, pending: u64) -> Result<Self> {
        check_normal_form::<L>(&words)?;
        let mut bitset = Self {
            runs: RunBuilder::from_words(words),
            len,
            active: 0,
            pending,
        };
        bitset.active = bitset.recount();
        bitset.check_invariants()?;
        Ok(bitset)
    }

    /// Serialize to a stable little-endian encoding.
    ///
    /// Format:
    /// - magic: 8 bytes (`L::MAGIC`)
    /// - len: u64
    /// - pending: u64
    /// - word_count: u64, then `word_count` packed words of `L::WORD_BITS`
    pub fn to_bytes(&self) -> Vec<u8> {
        let word_bytes = (L::WORD_BITS / 8) as usize;
        let words = self.runs.words();
        let mut out = Vec::with_capacity(32 + words.len() * word_bytes);
        out.extend_from_slice(L::MAGIC);
        out.extend_from_slice(&self.len.to_le_bytes());
        out.extend_from_slice(&self.pending.to_le_bytes());
        out.extend_from_slice(&(words.len() as u64).to_le_bytes());
        for word in words {
            out.extend_from_slice(&word.encode::<L>().to_le_bytes()[..word_bytes]);
        }
        out
    }

    /// Deserialize a bitset from [`to_bytes`](Self::to_bytes) output.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader { bytes, off: 0 };
        if reader.take(8)? != L::MAGIC {
            return Err(Error::InvalidEncoding(
                "bad magic for CompressedBitset".into(),
            ));
        }
        let len = reader.u64(8)?;
        let pending = reader.u64(8)?;
        let word_count = reader.u64(8)?;

        let word_bytes = (L::WORD_BITS / 8) as usize;
        let word_count = usize::try_from(word_count)
            .ok()
            .filter(|&n| n <= reader.remaining() / word_bytes)
            .ok_or_else(|| Error::InvalidEncoding("word count exceeds input".into()))?;
        let mut words = Vec::with_capacity(word_count);
        for _ in 0..word_count {
            words.push(Word::decode::<L>(reader.u64(word_bytes)?)?);
        }

        if reader.remaining() != 0 {
            return Err(Error::InvalidEncoding(
                "trailing bytes after CompressedBitset".into(),
            ));
        }

        Self::from_parts(words, len, pending)
    }

    /// Split into run words, length and pending block; the inverse of
    /// [`from_parts`](Self::from_parts).
    pub fn into_parts(self) -> (Vec<Word>, u64, u64) {
        (self.runs.into_words(), self.len, self.pending)
    }

    /// Return the total number of bits in the bitset.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Return true if the bitset has length 0.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of set bits, maintained incrementally.
    #[inline]
    pub fn count_ones(&self) -> u64 {
        self.active
    }

    /// Number of unset bits below `len`.
    #[inline]
    pub fn count_zeros(&self) -> u64 {
        self.len - self.active
    }

    /// The committed run sequence, excluding the pending block.
    #[inline]
    pub fn runs(&self) -> &[Word] {
        self.runs.words()
    }

    /// Number of committed run words.
    #[inline]
    pub fn run_count(&self) -> usize {
        self.runs.words().len()
    }

    /// Approximate heap memory usage in bytes.
    pub fn heap_bytes(&self) -> usize {
        self.runs.capacity() * core::mem::size_of::<Word>()
    }

    #[inline]
    pub(crate) fn pending_bits(&self) -> u32 {
        (self.len % L::BLOCK_BITS) as u32
    }

    #[inline]
    pub(crate) fn pending_block(&self) -> u64 {
        self.pending
    }

    #[inline]
    fn committed_len(&self) -> u64 {
        self.len - u64::from(self.pending_bits())
    }

    /// Restore the empty state, keeping the run storage for reuse.
    pub fn clear(&mut self) {
        self.runs.clear();
        self.len = 0;
        self.active = 0;
        self.pending = 0;
    }

    /// Append `count` unset bits.
    pub fn add_zeros(&mut self, count: u64) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let new_len = self.len.checked_add(count).ok_or(Error::CapacityOverflow)?;
        let remain = u64::from(self.pending_bits());
        if remain + count < L::BLOCK_BITS {
            self.len = new_len;
            return Ok(());
        }

        let mut count = count;
        if remain > 0 {
            self.runs.push_block(self.pending);
            self.pending = 0;
            count -= L::BLOCK_BITS - remain;
        }
        self.runs.push_fill(false, count / L::BLOCK_BITS);
        self.len = new_len;
        Ok(())
    }

    /// Append `count` set bits.
    pub fn add_ones(&mut self, count: u64) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let new_len = self.len.checked_add(count).ok_or(Error::CapacityOverflow)?;
        let remain = u64::from(self.pending_bits());
        if remain + count < L::BLOCK_BITS {
            self.pending |= low_mask(count as u32) << remain;
            self.len = new_len;
            self.active += count;
            return Ok(());
        }

        let mut rest = count;
        if remain > 0 {
            self.pending |= L::ALL_ONES & !low_mask(remain as u32);
            self.runs.push_block(self.pending);
            rest -= L::BLOCK_BITS - remain;
        }
        self.runs.push_fill(true, rest / L::BLOCK_BITS);
        self.pending = low_mask((rest % L::BLOCK_BITS) as u32);
        self.len = new_len;
        self.active += count;
        Ok(())
    }

    /// Append the first `bit_len` bits of `bytes` (bit `i` is bit `i % 8` of
    /// byte `i / 8`).
    ///
    /// Bits that complete the pending block are split into runs of equal
    /// bits and appended run by run; once block-aligned, whole blocks are
    /// committed directly.
    pub fn add_bits(&mut self, bytes: &[u8], bit_len: u64) -> Result<()> {
        let available = (bytes.len() as u64).saturating_mul(8);
        if bit_len > available {
            return Err(Error::InvalidArgument(alloc::format!(
                "{bit_len} bits requested from a {available}-bit buffer"
            )));
        }
        let new_len = self.len.checked_add(bit_len).ok_or(Error::CapacityOverflow)?;

        let mut reader = BitReader::new(bytes);
        let mut remaining = bit_len;

        let remain = u64::from(self.pending_bits());
        if remain > 0 {
            let take = (L::BLOCK_BITS - remain).min(remaining);
            self.add_runs_of(reader.read(take as u32), take as u32)?;
            remaining -= take;
        }

        while remaining >= L::BLOCK_BITS {
            let block = reader.read(L::PAYLOAD_BITS);
            self.runs.push_block(block);
            self.active += u64::from(block.count_ones());
            remaining -= L::BLOCK_BITS;
        }
        if remaining > 0 {
            debug_assert_eq!(self.pending, 0);
            self.pending = reader.read(remaining as u32);
            self.active += u64::from(self.pending.count_ones());
        }
        self.len = new_len;
        Ok(())
    }

    /// Dispatches alternating spans of equal bits to `add_zeros`/`add_ones`.
    fn add_runs_of(&mut self, mut word: u64, mut bits: u32) -> Result<()> {
        let mut ones = false;
        while bits > 0 {
            let span = if ones {
                (!word).trailing_zeros()
            } else {
                word.trailing_zeros()
            }
            .min(bits);
            if span > 0 {
                if ones {
                    self.add_ones(u64::from(span))?;
                } else {
                    self.add_zeros(u64::from(span))?;
                }
                word = word.checked_shr(span).unwrap_or(0);
                bits -= span;
            }
            ones = !ones;
        }
        Ok(())
    }

    /// Append unset bits up to `pos`, then a set bit at `pos`.
    ///
    /// When `pos` is already inside the bitset the bit is set in place.
    pub fn add_one_at(&mut self, pos: u64) -> Result<()> {
        if pos < self.len {
            return self.set(pos).map(|_| ());
        }
        if pos == u64::MAX {
            return Err(Error::CapacityOverflow);
        }
        self.add_zeros(pos - self.len)?;
        self.add_ones(1)
    }

    /// Append unset bits until the length is a whole number of blocks.
    pub fn pad_to_block(&mut self) -> Result<()> {
        match self.pending_bits() {
            0 => Ok(()),
            remain => self.add_zeros(L::BLOCK_BITS - u64::from(remain)),
        }
    }

    /// Return true if the bit at `pos` is set. Positions past the end read as
    /// unset.
    pub fn get(&self, pos: u64) -> bool {
        if pos >= self.len {
            return false;
        }
        let committed = self.committed_len();
        if pos >= committed {
            return (self.pending >> (pos - committed)) & 1 == 1;
        }
        let (index, block, bit) = self.locate(pos);
        (block_of::<L>(&self.runs.words()[index], block) >> bit) & 1 == 1
    }

    /// Set the bit at `pos`, returning its previous value.
    pub fn set(&mut self, pos: u64) -> Result<bool> {
        self.assign(pos, true)
    }

    /// Clear the bit at `pos`, returning its previous value.
    pub fn reset(&mut self, pos: u64) -> Result<bool> {
        self.assign(pos, false)
    }

    fn assign(&mut self, pos: u64, value: bool) -> Result<bool> {
        if pos >= self.len {
            return Err(Error::OutOfRange { pos, len: self.len });
        }

        let committed = self.committed_len();
        if pos >= committed {
            let mask = 1u64 << (pos - committed);
            let old = self.pending & mask != 0;
            if old != value {
                self.pending ^= mask;
                self.account_flip(value);
            }
            return Ok(old);
        }

        let (index, block, bit) = self.locate(pos);
        let word = self.runs.words()[index];
        let mask = 1u64 << bit;
        let old = block_of::<L>(&word, block) & mask != 0;
        if old == value {
            return Ok(old);
        }

        match word {
            Word::Literal(bits) => self.runs.replace(index, &[Word::Literal(bits ^ mask)]),
            Word::Fill {
                value: fill,
                blocks,
                exceptions,
            } if block >= u64::from(blocks) => {
                let flipped = exceptions ^ mask;
                if flipped != 0 && flipped.count_ones() <= L::MAX_EXCEPTIONS {
                    self.runs.set_exceptions(index, flipped);
                } else {
                    self.runs.replace(
                        index,
                        &[
                            Word::fill(fill, blocks),
                            Word::Literal(uniform::<L>(fill) ^ flipped),
                        ],
                    );
                }
            }
            Word::Fill {
                value: fill,
                blocks,
                exceptions,
            } => {
                let before = block as u32;
                debug!(index, before, after = blocks - before - 1, "splitting fill run");
                self.runs.replace(
                    index,
                    &[
                        Word::fill(fill, before),
                        Word::Literal(uniform::<L>(fill) ^ mask),
                        Word::Fill {
                            value: fill,
                            blocks: blocks - before - 1,
                            exceptions,
                        },
                    ],
                );
            }
        }
        self.account_flip(value);
        Ok(old)
    }

    #[inline]
    fn account_flip(&mut self, now_set: bool) {
        if now_set {
            self.active += 1;
        } else {
            self.active -= 1;
        }
    }

    /// Finds the committed word holding `pos`: (word index, block within the
    /// word, bit within the block).
    fn locate(&self, pos: u64) -> (usize, u64, u32) {
        let mut block = pos / L::BLOCK_BITS;
        let bit = (pos % L::BLOCK_BITS) as u32;
        for (index, word) in self.runs.words().iter().enumerate() {
            let span = word.block_count();
            if block < span {
                return (index, block, bit);
            }
            block -= span;
        }
        panic!("position {pos} beyond the committed runs");
    }

    /// `self = self AND other`.
    ///
    /// Past the end of the shorter operand the longer one is copied
    /// unchanged; the result is `max(self.len(), other.len())` bits long.
    pub fn and_with(&mut self, other: &Self) {
        self.combine(other, Op::And, false, false);
        debug_assert!(
            self.len != other.len || self.active <= other.active,
            "AND produced more bits than an operand"
        );
    }

    /// `self = self OR other`, with the same length rule as
    /// [`and_with`](Self::and_with).
    pub fn or_with(&mut self, other: &Self) {
        let floor = self.active.max(other.active);
        self.combine(other, Op::Or, false, false);
        debug_assert!(self.active >= floor, "OR lost bits");
    }

    /// `self = self AND NOT other`.
    pub fn and_not_with(&mut self, other: &Self) {
        self.combine(other, Op::And, false, true);
    }

    /// `self = NOT self AND other`.
    pub fn not_and_with(&mut self, other: &Self) {
        self.combine(other, Op::And, true, false);
    }

    fn combine(&mut self, other: &Self, op: Op, negate_self: bool, negate_other: bool) {
        let len = self.len.max(other.len);
        let full_blocks = len / L::BLOCK_BITS;
        let tail_bits = (len % L::BLOCK_BITS) as u32;

        let (runs, active, pending) = {
            let mut lhs = Operand::new(&*self, negate_self, op.identity());
            let mut rhs = Operand::new(other, negate_other, op.identity());
            let mut out = RunBuilder::<L>::with_capacity(self.run_count().max(other.run_count()));
            let mut active = 0u64;
            let mut produced = 0u64;

            while produced < full_blocks {
                match (lhs.segment(), rhs.segment()) {
                    (
                        Segment::Fill {
                            value: a,
                            blocks: na,
                        },
                        Segment::Fill {
                            value: b,
                            blocks: nb,
                        },
                    ) => {
                        let blocks = na.min(nb).min(full_blocks - produced);
                        let value = op.apply(u64::from(a), u64::from(b)) != 0;
                        out.push_fill(value, blocks);
                        if value {
                            active += blocks * L::BLOCK_BITS;
                        }
                        lhs.advance(blocks);
                        rhs.advance(blocks);
                        produced += blocks;
                    }
                    (a, b) => {
                        let block = op.apply(a.block::<L>(), b.block::<L>());
                        out.push_block(block);
                        active += u64::from(block.count_ones());
                        lhs.advance(1);
                        rhs.advance(1);
                        produced += 1;
                    }
                }
            }

            let mut pending = 0;
            if tail_bits > 0 {
                let block = op.apply(lhs.segment().block::<L>(), rhs.segment().block::<L>());
                pending = block & low_mask(tail_bits);
                active += u64::from(pending.count_ones());
            }
            (out, active, pending)
        };

        trace!(
            ?op,
            negate_self,
            negate_other,
            lhs_runs = self.run_count(),
            rhs_runs = other.run_count(),
            out_runs = runs.words().len(),
            len,
            "binary operator"
        );
        self.runs = runs;
        self.len = len;
        self.active = active;
        self.pending = pending;
    }

    /// Complement every bit below `len`.
    pub fn invert(&mut self) {
        self.runs.invert();
        self.pending = !self.pending & low_mask(self.pending_bits());
        self.active = self.len - self.active;
    }

    /// Population count recomputed from the runs and the pending block.
    pub fn recount(&self) -> u64 {
        let committed: u64 = self
            .runs
            .words()
            .iter()
            .map(|word| word.count_ones::<L>())
            .sum();
        committed + u64::from(self.pending.count_ones())
    }

    /// Positions of set bits, in increasing order.
    pub fn iter_set(&self) -> BitPositions<'_, L> {
        BitPositions::new(self, true)
    }

    /// Positions of unset bits below `len`, in increasing order.
    pub fn iter_unset(&self) -> BitPositions<'_, L> {
        BitPositions::new(self, false)
    }

    /// A block-level cursor over this bitset.
    pub fn blocks(&self) -> RunEnumerator<'_, L> {
        RunEnumerator::new(self)
    }

    /// Verify the normal form of the runs and the bookkeeping around them.
    pub fn check_invariants(&self) -> Result<()> {
        let words = self.runs.words();
        check_normal_form::<L>(words)?;

        let committed_blocks = words
            .iter()
            .try_fold(0u64, |acc, word| acc.checked_add(word.block_count()));
        let committed_bits = committed_blocks.and_then(|blocks| blocks.checked_mul(L::BLOCK_BITS));
        if committed_bits != Some(self.committed_len()) {
            return Err(Error::Corrupted(alloc::format!(
                "runs cover {committed_bits:?} bits, expected {}",
                self.committed_len()
            )));
        }
        if self.pending & !low_mask(self.pending_bits()) != 0 {
            return Err(Error::Corrupted(
                "pending block has bits past the end".into(),
            ));
        }
        let ones = self.recount();
        if ones != self.active {
            return Err(Error::Corrupted(alloc::format!(
                "active count {} differs from popcount {ones}",
                self.active
            )));
        }
        Ok(())
    }
}

/// Block `block` of `word`, decoded.
#[inline]
fn block_of<L: WordLayout>(word: &Word, block: u64) -> u64 {
    match *word {
        Word::Literal(bits) => bits,
        Word::Fill {
            value,
            blocks,
            exceptions,
        } => {
            if block < u64::from(blocks) {
                uniform::<L>(value)
            } else {
                uniform::<L>(value) ^ exceptions
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::Wah32;

    fn bits_of<L: WordLayout>(bitset: &CompressedBitset<L>) -> Vec<bool> {
        (0..bitset.len()).map(|i| bitset.get(i)).collect()
    }

    #[test]
    fn test_add_zeros_and_ones_basic() {
        let mut bitset = CompressedBitset::new();
        bitset.add_zeros(3).unwrap();
        bitset.add_ones(2).unwrap();
        assert_eq!(bitset.len(), 5);
        assert_eq!(bitset.count_ones(), 2);
        assert_eq!(bits_of(&bitset), vec![false, false, false, true, true]);
        assert!(!bitset.get(5));
        assert_eq!(bitset.run_count(), 0);
        bitset.check_invariants().unwrap();
    }

    #[test]
    fn test_zero_count_is_noop() {
        let mut bitset = CompressedBitset::new();
        bitset.add_ones(70).unwrap();
        let before = bitset.clone();
        bitset.add_zeros(0).unwrap();
        bitset.add_ones(0).unwrap();
        bitset.add_bits(&[], 0).unwrap();
        assert_eq!(bitset, before);
    }

    #[test]
    fn test_fill_run_coalescing() {
        let mut bitset = CompressedBitset::new();
        bitset.add_zeros(63).unwrap();
        assert_eq!(bitset.runs(), &[Word::fill(false, 1)]);
        bitset.add_zeros(3 * 63).unwrap();
        assert_eq!(bitset.runs(), &[Word::fill(false, 4)]);
        assert!((0..5 * 63).all(|i| !bitset.get(i)));

        bitset.clear();
        bitset.add_ones(63).unwrap();
        bitset.add_ones(3 * 63).unwrap();
        assert_eq!(bitset.runs(), &[Word::fill(true, 4)]);
        for i in 0..5 * 63 {
            assert_eq!(bitset.get(i), i < 4 * 63, "bit {i}");
        }
    }

    #[test]
    fn test_not_short_bitset() {
        let mut bitset = CompressedBitset::<Wah32>::with_layout();
        bitset.add_zeros(3).unwrap();
        bitset.invert();
        assert_eq!(bits_of(&bitset), vec![true; 3]);
        assert!(!bitset.get(3));
        assert_eq!(bitset.count_ones(), 3);
    }

    #[test]
    fn test_set_splits_fill() {
        let mut bitset = CompressedBitset::<Wah32>::with_layout();
        bitset.add_zeros(31 * 10).unwrap();
        assert_eq!(bitset.set(31 * 4 + 7), Ok(false));
        assert_eq!(
            bitset.runs(),
            &[
                Word::fill(false, 4),
                Word::Literal(1 << 7),
                Word::fill(false, 5)
            ]
        );
        assert_eq!(bitset.count_ones(), 1);
        assert_eq!(bitset.set(31 * 4 + 7), Ok(true));

        assert_eq!(bitset.reset(31 * 4 + 7), Ok(true));
        assert_eq!(bitset.runs(), &[Word::fill(false, 10)]);
        assert_eq!(bitset.count_ones(), 0);
        bitset.check_invariants().unwrap();
    }

    #[test]
    fn test_set_records_exception() {
        let mut bitset = CompressedBitset::new();
        bitset.add_zeros(63 * 10).unwrap();
        bitset.set(63 * 9 + 3).unwrap();
        assert_eq!(
            bitset.runs(),
            &[Word::Fill {
                value: false,
                blocks: 9,
                exceptions: 1 << 3
            }]
        );

        // in place while the exception list has room
        for bit in [10, 20, 30, 40, 50] {
            bitset.set(63 * 9 + bit).unwrap();
            assert_eq!(bitset.run_count(), 1);
        }
        // a seventh exception turns the trailing block into a literal
        bitset.set(63 * 9 + 60).unwrap();
        assert_eq!(bitset.run_count(), 2);
        assert_eq!(bitset.count_ones(), 7);
        bitset.check_invariants().unwrap();

        for bit in [3, 10, 20, 30, 40, 50, 60] {
            assert_eq!(bitset.reset(63 * 9 + bit), Ok(true));
        }
        assert_eq!(bitset.runs(), &[Word::fill(false, 10)]);
        bitset.check_invariants().unwrap();
    }

    #[test]
    fn test_set_in_pending_and_out_of_range() {
        let mut bitset = CompressedBitset::new();
        bitset.add_zeros(70).unwrap();
        assert_eq!(bitset.set(65), Ok(false));
        assert!(bitset.get(65));
        assert_eq!(bitset.count_ones(), 1);
        assert_eq!(
            bitset.set(70),
            Err(Error::OutOfRange { pos: 70, len: 70 })
        );
        assert_eq!(bitset.len(), 70);
    }

    #[test]
    fn test_add_one_at() {
        let mut bitset = CompressedBitset::new();
        bitset.add_one_at(100).unwrap();
        bitset.add_one_at(5).unwrap();
        bitset.add_one_at(300).unwrap();
        assert_eq!(bitset.len(), 301);
        assert_eq!(bitset.iter_set().collect::<Vec<_>>(), vec![5, 100, 300]);
        bitset.check_invariants().unwrap();
    }

    #[test]
    fn test_capacity_overflow() {
        let mut bitset = CompressedBitset::new();
        bitset.add_ones(10).unwrap();
        assert_eq!(bitset.add_one_at(u64::MAX), Err(Error::CapacityOverflow));
        assert_eq!(bitset.add_zeros(u64::MAX - 5), Err(Error::CapacityOverflow));
        assert_eq!(bitset.len(), 10);
        assert_eq!(bitset.count_ones(), 10);
    }

    #[test]
    fn test_collect_from_bools() {
        let bits = [true, true, false, true, false, false, false, true];
        let bitset: CompressedBitset<Wah32> = bits.iter().copied().collect();
        assert_eq!(bits_of(&bitset), bits.to_vec());
        assert_eq!(bitset.count_ones(), 4);

        let mut long = CompressedBitset::new();
        long.extend(core::iter::repeat(true).take(200));
        assert_eq!(long.runs(), &[Word::fill(true, 3)]);
        assert_eq!(long.count_ones(), 200);
    }

    #[test]
    fn test_add_bits_rejects_short_buffer() {
        let mut bitset = CompressedBitset::new();
        assert!(matches!(
            bitset.add_bits(&[0xff], 9),
            Err(Error::InvalidArgument(_))
        ));
        assert!(bitset.is_empty());
    }

    #[test]
    fn test_add_bits_unaligned() {
        let mut bitset = CompressedBitset::<Wah32>::with_layout();
        bitset.add_ones(5).unwrap();
        bitset.add_bits(&[0b1100_0101, 0xff, 0x01], 20).unwrap();
        let mut expected = vec![true; 5];
        expected.extend([true, false, true, false, false, false, true, true]);
        expected.extend([true; 8]);
        expected.extend([true, false, false, false]);
        assert_eq!(bits_of(&bitset), expected);
        assert_eq!(bitset.count_ones(), 18);
        bitset.check_invariants().unwrap();
    }

    #[test]
    fn test_binary_ops_equal_length() {
        let a = CompressedBitset::<Wah32>::from_bits(&[0b1100_1010; 16], 128).unwrap();
        let b = CompressedBitset::<Wah32>::from_bits(&[0b1010_0110; 16], 128).unwrap();

        let mut and = a.clone();
        and.and_with(&b);
        let mut or = a.clone();
        or.or_with(&b);
        let mut and_not = a.clone();
        and_not.and_not_with(&b);
        let mut not_and = a.clone();
        not_and.not_and_with(&b);

        for i in 0..128 {
            let (x, y) = (a.get(i), b.get(i));
            assert_eq!(and.get(i), x && y, "and bit {i}");
            assert_eq!(or.get(i), x || y, "or bit {i}");
            assert_eq!(and_not.get(i), x && !y, "and_not bit {i}");
            assert_eq!(not_and.get(i), !x && y, "not_and bit {i}");
        }
        for bitset in [&and, &or, &and_not, &not_and] {
            assert_eq!(bitset.len(), 128);
            bitset.check_invariants().unwrap();
        }
    }

    #[test]
    fn test_binary_ops_on_long_fills() {
        let mut a = CompressedBitset::new();
        a.add_ones(63 * 1000).unwrap();
        a.add_zeros(63 * 1000).unwrap();
        let mut b = CompressedBitset::new();
        b.add_zeros(63 * 500).unwrap();
        b.add_ones(63 * 1000).unwrap();
        b.add_zeros(63 * 500).unwrap();

        let mut and = a.clone();
        and.and_with(&b);
        assert_eq!(and.runs(), &[Word::fill(false, 500), Word::fill(true, 500), Word::fill(false, 1000)]);
        assert_eq!(and.count_ones(), 63 * 500);

        let mut or = a.clone();
        or.or_with(&b);
        assert_eq!(or.runs(), &[Word::fill(true, 1500), Word::fill(false, 500)]);
        assert_eq!(or.count_ones(), 63 * 1500);
    }

    #[test]
    fn test_invert_twice_restores() {
        let mut bitset = CompressedBitset::new();
        bitset.add_bits(&[0x1f, 0x00, 0x00, 0x8c, 0xff, 0x3c], 45).unwrap();
        bitset.add_zeros(500).unwrap();
        bitset.set(300).unwrap();
        let original = bitset.clone();
        bitset.invert();
        assert_eq!(bitset.count_ones(), original.count_zeros());
        bitset.check_invariants().unwrap();
        bitset.invert();
        assert_eq!(bitset, original);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut bitset = CompressedBitset::new();
        bitset.add_zeros(63 * 40 + 5).unwrap();
        bitset.add_bits(&[0xde, 0xad, 0xbe, 0xef], 32).unwrap();
        bitset.set(63 * 39 + 1).unwrap();
        let bytes = bitset.to_bytes();
        assert_eq!(&bytes[..8], b"WAHBIT64");
        let back = CompressedBitset::<Plwah64>::from_bytes(&bytes).unwrap();
        assert_eq!(back, bitset);

        assert!(CompressedBitset::<Wah32>::from_bytes(&bytes).is_err());
        assert!(CompressedBitset::<Plwah64>::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_from_parts_rejects_non_normal_runs() {
        let words = vec![Word::fill(true, 1), Word::fill(true, 1)];
        assert!(matches!(
            CompressedBitset::<Plwah64>::from_parts(words, 126, 0),
            Err(Error::Corrupted(_))
        ));
        let words = vec![Word::fill(true, 2)];
        assert!(CompressedBitset::<Plwah64>::from_parts(words.clone(), 130, 1 << 9).is_err());
        let bitset = CompressedBitset::<Plwah64>::from_parts(words, 130, 0b101).unwrap();
        assert_eq!(bitset.count_ones(), 128);
    }
}
