//! Normalizing construction of run sequences.
//!
//! Every mutation of a bitmap funnels through [`RunBuilder`]: appends push
//! blocks at the end, binary operators build a fresh sequence, and positional
//! writes re-push the few words around the edit. Normalization only ever
//! looks at the last word of the sequence, so each push is O(1).

use alloc::vec::Vec;
use core::marker::PhantomData;

use tracing::debug;

use crate::error::{Error, Result};
use crate::word::{uniform, Word, WordLayout};

/// Whether a pushed word kept its shape at the end of the sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Landing {
    /// The word was appended unchanged and its predecessor was untouched.
    Appended,
    /// The word was merged into, absorbed by, or split across its neighbours.
    Merged,
}

/// An append-only run sequence kept in normal form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RunBuilder<L> {
    words: Vec<Word>,
    _layout: PhantomData<L>,
}

impl<L: WordLayout> Default for RunBuilder<L> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl<L: WordLayout> RunBuilder<L> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            words: Vec::with_capacity(capacity),
            _layout: PhantomData,
        }
    }

    /// Wraps an already validated word vector.
    pub(crate) fn from_words(words: Vec<Word>) -> Self {
        Self {
            words,
            _layout: PhantomData,
        }
    }

    pub(crate) fn words(&self) -> &[Word] {
        &self.words
    }

    pub(crate) fn capacity(&self) -> usize {
        self.words.capacity()
    }

    pub(crate) fn clear(&mut self) {
        self.words.clear();
    }

    /// Appends one payload block, canonicalizing trivial blocks into fills.
    pub(crate) fn push_block(&mut self, block: u64) {
        debug_assert!(block <= L::ALL_ONES);
        if block == 0 || block == L::ALL_ONES {
            self.push_fill(block != 0, 1);
        } else {
            self.push_literal(block);
        }
    }

    /// Appends `blocks` uniform blocks of `value`.
    ///
    /// Extends the last fill when it has the same value and no exceptions;
    /// counters that would overflow `MAX_BLOCKS` spill into new fill words.
    pub(crate) fn push_fill(&mut self, value: bool, mut blocks: u64) {
        if blocks == 0 {
            return;
        }
        if let Some(Word::Fill {
            value: last_value,
            blocks: last_blocks,
            exceptions: 0,
        }) = self.words.last_mut()
        {
            if *last_value == value {
                let room = u64::from(L::MAX_BLOCKS - *last_blocks);
                let take = room.min(blocks);
                *last_blocks += take as u32;
                blocks -= take;
            }
        }
        while blocks > 0 {
            if let Some(Word::Fill {
                value: last_value,
                blocks: last_blocks,
                exceptions: 0,
            }) = self.words.last()
            {
                if *last_value == value && *last_blocks == L::MAX_BLOCKS {
                    debug!(value, spill = blocks, "fill counter saturated");
                }
            }
            let take = blocks.min(u64::from(L::MAX_BLOCKS));
            self.words.push(Word::fill(value, take as u32));
            blocks -= take;
        }
    }

    /// Appends a non-trivial literal block, folding it into the previous fill
    /// as exceptions when few enough bits differ.
    fn push_literal(&mut self, bits: u64) {
        if bits == 0 || bits == L::ALL_ONES {
            self.push_fill(bits != 0, 1);
            return;
        }
        if let Some(Word::Fill {
            value,
            blocks,
            exceptions,
        }) = self.words.last_mut()
        {
            if *exceptions == 0 && *blocks > 0 {
                let diff = bits ^ uniform::<L>(*value);
                if diff.count_ones() <= L::MAX_EXCEPTIONS {
                    *exceptions = diff;
                    return;
                }
            }
        }
        self.words.push(Word::Literal(bits));
    }

    /// Appends an arbitrary word, normalizing it against the current tail.
    pub(crate) fn push_word(&mut self, word: Word) -> Landing {
        let before = self.words.len();
        let previous = self.words.last().copied();
        match word {
            Word::Literal(bits) => self.push_literal(bits),
            Word::Fill {
                value,
                blocks,
                exceptions,
            } => {
                self.push_fill(value, u64::from(blocks));
                if exceptions != 0 {
                    self.push_literal(uniform::<L>(value) ^ exceptions);
                }
            }
        }
        let unchanged_prefix = before == 0 || self.words.get(before - 1).copied() == previous;
        if self.words.len() == before + 1 && self.words[before] == word && unchanged_prefix {
            Landing::Appended
        } else {
            Landing::Merged
        }
    }

    /// Replaces the word at `index` with `pieces` and renormalizes forward.
    ///
    /// The suffix is re-pushed only until one of its words lands unchanged;
    /// from there on it was already normalized against that word.
    pub(crate) fn replace(&mut self, index: usize, pieces: &[Word]) {
        let mut rest = self.words.split_off(index + 1).into_iter();
        self.words.truncate(index);
        for &piece in pieces {
            self.push_word(piece);
        }
        while let Some(word) = rest.next() {
            if self.push_word(word) == Landing::Appended {
                self.words.extend(rest.by_ref());
                break;
            }
        }
    }

    /// Overwrites the exception mask of the fill at `index` in place.
    ///
    /// Only valid when the fill already carries exceptions and the new mask
    /// is non-empty and within `MAX_EXCEPTIONS`; neighbours are unaffected.
    pub(crate) fn set_exceptions(&mut self, index: usize, mask: u64) {
        match &mut self.words[index] {
            Word::Fill { exceptions, .. } if *exceptions != 0 => {
                debug_assert!(mask != 0 && mask.count_ones() <= L::MAX_EXCEPTIONS);
                *exceptions = mask;
            }
            other => panic!("word {index} is not an exception-carrying fill: {other:?}"),
        }
    }

    /// Complements every word in place; normal form is preserved.
    pub(crate) fn invert(&mut self) {
        for word in &mut self.words {
            word.invert::<L>();
        }
    }

    pub(crate) fn into_words(self) -> Vec<Word> {
        self.words
    }
}

/// Verifies that `words` is in normal form for layout `L`.
pub(crate) fn check_normal_form<L: WordLayout>(words: &[Word]) -> Result<()> {
    let corrupted = |index: usize, what: &str| {
        Err(Error::Corrupted(alloc::format!("word {index}: {what}")))
    };

    for (index, word) in words.iter().enumerate() {
        match *word {
            Word::Literal(bits) => {
                if bits > L::ALL_ONES {
                    return corrupted(index, "literal wider than a block");
                }
                if bits == 0 || bits == L::ALL_ONES {
                    return corrupted(index, "literal holds a uniform block");
                }
            }
            Word::Fill {
                blocks, exceptions, ..
            } => {
                if blocks == 0 {
                    return corrupted(index, "fill with an empty counter");
                }
                if blocks > L::MAX_BLOCKS {
                    return corrupted(index, "fill counter exceeds its field");
                }
                if exceptions > L::ALL_ONES || exceptions.count_ones() > L::MAX_EXCEPTIONS {
                    return corrupted(index, "too many exception positions");
                }
            }
        }

        let Some(&Word::Fill {
            value,
            blocks,
            exceptions: 0,
        }) = index.checked_sub(1).map(|prev| &words[prev])
        else {
            continue;
        };
        match *word {
            Word::Fill { value: next, .. } if next == value && blocks < L::MAX_BLOCKS => {
                return corrupted(index, "fill not merged into preceding fill");
            }
            Word::Literal(bits)
                if (bits ^ uniform::<L>(value)).count_ones() <= L::MAX_EXCEPTIONS =>
            {
                return corrupted(index, "literal not absorbed as exceptions");
            }
            _ => {}
        }
    }
    Ok(())
}
