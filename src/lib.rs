//! # WAH Compressed Bitmaps
//!
//! *Bitmaps you can AND and OR without decompressing them.*
//!
//! ## Intuition First
//!
//! A bitmap index over a million rows is mostly long stretches of zeros with
//! a few ones sprinkled in. Storing every bit wastes memory, and ANDing two
//! such bitmaps word by word wastes time on stretches where nothing happens.
//!
//! Word-aligned hybrid (WAH) compression cuts the bitmap into machine-word
//! sized blocks. A block with mixed bits is stored verbatim (a *literal*);
//! a stretch of identical blocks is stored as one *fill* word with a counter.
//! Because every word still lines up with a block boundary, two compressed
//! bitmaps can be combined by walking both run sequences in lockstep,
//! consuming whole fills at once.
//!
//! ## The Problem
//!
//! General-purpose compressors (gzip, LZ77) squeeze bitmaps well but must be
//! decompressed before any query. Byte-aligned schemes (BBC) compress better
//! than WAH but spend most of their operator time on bit fiddling across byte
//! boundaries. WAH gives up some compression ratio for operators that run at
//! memory speed on the compressed form.
//!
//! ## Historical Context
//!
//! ```text
//! 1995  Antoshenkov  Byte-aligned bitmap code (BBC), used in Oracle
//! 2002  Wu et al.    Word-aligned hybrid code: fills and literals on words
//! 2006  Wu et al.    Optimal bounds for WAH bitmap index operations
//! 2010  Deliège      Position-list WAH: fold a sparse literal into its fill
//! 2016  Lemire       Roaring overtakes run-length bitmaps in many workloads
//! ```
//!
//! Deliège and Pedersen observed that most literals following a fill differ
//! from it in only a handful of bits. PLWAH stores those bit positions in the
//! unused high bits of the fill counter, removing the literal entirely.
//!
//! ## Mathematical Formulation
//!
//! With word width $W$, each block carries $B = W - 1$ payload bits. A bitmap
//! of $n$ bits is $\lfloor n / B \rfloor$ committed blocks plus $n \bmod B$
//! pending bits. The run sequence is a list of words:
//!
//! - **Literal** $\ell$: one block, $0 < \ell < 2^B - 1$.
//! - **Fill** $(v, k, E)$: $k$ blocks of all-$v$ bits, followed, when
//!   $E \neq \emptyset$, by one block equal to all-$v$ with the positions in
//!   $E$ flipped ($|E| \le 6$ on 64-bit words).
//!
//! A greedy left-to-right builder keeps the sequence in a unique normal form,
//! so two bitmaps with the same bits have the same words.
//!
//! ## Complexity Analysis
//!
//! - **Append** (`add_zeros`, `add_ones`, `add_bits`): $O(1)$ amortized per
//!   block.
//! - **Binary operators**: $O(r_a + r_b)$ for run counts $r_a, r_b$,
//!   independent of the number of bits.
//! - **Random access** (`get`, `set`, `reset`): $O(r)$; runs are walked from
//!   the front.
//! - **Space**: at most one word per block, one word per fill otherwise.
//!
//! ## What Could Go Wrong
//!
//! 1. **Random writes**: setting a bit inside a fill splits it into up to
//!    three words. Bitmaps built by scattered writes lose their compression.
//! 2. **Dense random data**: every block becomes a literal and the encoding
//!    costs $W / (W - 1)$ of the raw size.
//! 3. **Counter overflow**: a fill holds at most $2^{26} - 1$ blocks on
//!    64-bit words; longer runs spill into additional fill words.
//!
//! ## Implementation Notes
//!
//! This crate provides:
//! - **`CompressedBitset`**: append, random access, AND/OR/AND-NOT, NOT,
//!   population count and a stable byte encoding.
//! - **`RunEnumerator`**: a block-level cursor over the run sequence.
//! - **`Wah32`** / **`Plwah64`**: the two word layouts.
//! - **`ImplicitBitmap`**: an uncompressed baseline with identical semantics.
//!
//! Without the default `std` feature the crate is `no_std` and needs only
//! `alloc`.
//!
//! ## References
//!
//! - Wu, K., Otoo, E. J., & Shoshani, A. (2002). "Compressing bitmap indexes
//!   for faster search operations."
//! - Wu, K., Otoo, E. J., & Shoshani, A. (2006). "Optimizing bitmap indices
//!   with efficient compression."
//! - Deliège, F., & Pedersen, T. B. (2010). "Position list word aligned
//!   hybrid: optimizing space and performance for compressed bitmaps."

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

pub mod bitset;
mod builder;
pub mod enumerator;
pub mod error;
pub mod implicit;
pub mod word;

pub use bitset::CompressedBitset;
pub use enumerator::{BitPositions, RunEnumerator, RunState};
pub use error::{Error, Result};
pub use implicit::ImplicitBitmap;
pub use word::{Plwah64, Wah32, Word, WordLayout};
