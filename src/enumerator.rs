//! Block-level cursor over a compressed bitmap, and bit-position iterators.
//!
//! [`RunEnumerator`] walks the run sequence one payload block at a time
//! without decompressing it, which is what the binary operators stream over.
//! [`BitPositions`] builds on it to list set (or unset) positions in
//! increasing order, yielding whole uniform runs without touching their bits.

use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::ops::Range;

use crate::bitset::CompressedBitset;
use crate::word::{low_mask, uniform, Word, WordLayout};

/// Where a [`RunEnumerator`] currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Inside the uniform blocks of a fill; `remaining` counts the current
    /// block too.
    Fill {
        /// Bit value of the run.
        value: bool,
        /// Uniform blocks left in this fill, current one included.
        remaining: u64,
    },
    /// On the trailing block of a fill that carries exception positions.
    Exceptions(u64),
    /// On a literal block.
    Literal(u64),
    /// On the uncommitted partial block at the end of the bitmap.
    Pending,
    /// Past the last bit.
    Done,
}

/// A read-only cursor over the blocks of a [`CompressedBitset`].
#[derive(Clone, Debug)]
pub struct RunEnumerator<'a, L> {
    words: &'a [Word],
    pending: u64,
    pending_bits: u32,
    index: usize,
    offset: u64,
    state: RunState,
    _layout: PhantomData<L>,
}

impl<'a, L: WordLayout> RunEnumerator<'a, L> {
    /// Positions a new cursor on the first block of `bitset`.
    pub fn new(bitset: &'a CompressedBitset<L>) -> Self {
        let mut en = Self {
            words: bitset.runs(),
            pending: bitset.pending_block(),
            pending_bits: bitset.pending_bits(),
            index: 0,
            offset: 0,
            state: RunState::Done,
            _layout: PhantomData,
        };
        en.enter(0);
        en
    }

    /// The current state.
    #[inline]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Returns true once every block has been consumed.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.state == RunState::Done
    }

    /// Bit position of the first bit of the current block.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of meaningful bits in the current block.
    #[inline]
    pub fn block_bits(&self) -> u32 {
        match self.state {
            RunState::Pending => self.pending_bits,
            RunState::Done => 0,
            _ => L::PAYLOAD_BITS,
        }
    }

    /// The current block, decoded. Zero once done.
    #[inline]
    pub fn current_word(&self) -> u64 {
        match self.state {
            RunState::Fill { value, .. } => uniform::<L>(value),
            RunState::Exceptions(block) | RunState::Literal(block) => block,
            RunState::Pending => self.pending,
            RunState::Done => 0,
        }
    }

    /// Moves to the next block.
    pub fn advance(&mut self) {
        match self.state {
            RunState::Fill { value, remaining } => {
                self.offset += L::BLOCK_BITS;
                if remaining > 1 {
                    self.state = RunState::Fill {
                        value,
                        remaining: remaining - 1,
                    };
                } else {
                    self.leave_fill();
                }
            }
            RunState::Exceptions(_) | RunState::Literal(_) => {
                self.offset += L::BLOCK_BITS;
                self.enter(self.index + 1);
            }
            RunState::Pending => {
                self.offset += u64::from(self.pending_bits);
                self.state = RunState::Done;
            }
            RunState::Done => {}
        }
    }

    /// Skips `blocks` uniform blocks of the current fill at once.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is not inside a fill with at least `blocks`
    /// uniform blocks left.
    pub fn skip_fill(&mut self, blocks: u64) {
        let RunState::Fill { value, remaining } = self.state else {
            panic!("skip_fill outside of a fill run: {:?}", self.state);
        };
        assert!(blocks <= remaining, "skipping {blocks} of {remaining} blocks");
        if blocks == 0 {
            return;
        }
        self.offset += blocks * L::BLOCK_BITS;
        if blocks < remaining {
            self.state = RunState::Fill {
                value,
                remaining: remaining - blocks,
            };
        } else {
            self.leave_fill();
        }
    }

    fn leave_fill(&mut self) {
        match self.words[self.index] {
            Word::Fill {
                value, exceptions, ..
            } if exceptions != 0 => {
                self.state = RunState::Exceptions(uniform::<L>(value) ^ exceptions);
            }
            _ => self.enter(self.index + 1),
        }
    }

    fn enter(&mut self, index: usize) {
        self.index = index;
        self.state = match self.words.get(index) {
            Some(&Word::Literal(bits)) => RunState::Literal(bits),
            Some(&Word::Fill {
                value,
                blocks,
                exceptions,
            }) => {
                if blocks > 0 {
                    RunState::Fill {
                        value,
                        remaining: u64::from(blocks),
                    }
                } else if exceptions != 0 {
                    RunState::Exceptions(uniform::<L>(value) ^ exceptions)
                } else {
                    panic!("empty fill word at index {index}");
                }
            }
            None if self.pending_bits > 0 => RunState::Pending,
            None => RunState::Done,
        };
    }
}

/// Increasing positions of the bits equal to a target value.
///
/// Created by [`CompressedBitset::iter_set`] and
/// [`CompressedBitset::iter_unset`].
#[derive(Clone, Debug)]
pub struct BitPositions<'a, L> {
    cursor: RunEnumerator<'a, L>,
    target: bool,
    run: Range<u64>,
    base: u64,
    word: u64,
    remaining: u64,
}

impl<'a, L: WordLayout> BitPositions<'a, L> {
    pub(crate) fn new(bitset: &'a CompressedBitset<L>, target: bool) -> Self {
        let remaining = if target {
            bitset.count_ones()
        } else {
            bitset.count_zeros()
        };
        Self {
            cursor: RunEnumerator::new(bitset),
            target,
            run: 0..0,
            base: 0,
            word: 0,
            remaining,
        }
    }
}

impl<L: WordLayout> Iterator for BitPositions<'_, L> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        loop {
            if let Some(pos) = self.run.next() {
                self.remaining -= 1;
                return Some(pos);
            }
            if self.word != 0 {
                let bit = self.word.trailing_zeros();
                self.word &= self.word - 1;
                self.remaining -= 1;
                return Some(self.base + u64::from(bit));
            }

            match self.cursor.state() {
                RunState::Done => return None,
                RunState::Fill { value, remaining } => {
                    let start = self.cursor.offset();
                    if value == self.target {
                        self.run = start..start + remaining * L::BLOCK_BITS;
                    }
                    self.cursor.skip_fill(remaining);
                }
                _ => {
                    let block = self.cursor.current_word();
                    let block = if self.target { block } else { !block };
                    self.base = self.cursor.offset();
                    self.word = block & low_mask(self.cursor.block_bits());
                    self.cursor.advance();
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

impl<L: WordLayout> FusedIterator for BitPositions<'_, L> {}
