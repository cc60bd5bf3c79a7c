//! Error types for compressed bitmap operations.

use alloc::string::String;
use thiserror::Error;

/// Error variants for compressed bitmap operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// An argument was rejected before any state was touched.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A positional write addressed a bit at or beyond the bitmap length.
    #[error("position {pos} out of range for bitmap of length {len}")]
    OutOfRange {
        /// The requested bit position.
        pos: u64,
        /// The bitmap length at the time of the call.
        len: u64,
    },

    /// The logical length would exceed `u64::MAX` bits.
    #[error("bitmap length overflow")]
    CapacityOverflow,

    /// A serialized bitmap could not be decoded.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// A run sequence violates the normal form.
    #[error("corrupted run sequence: {0}")]
    Corrupted(String),
}

/// A specialized Result type for bitmap operations.
pub type Result<T> = core::result::Result<T, Error>;
