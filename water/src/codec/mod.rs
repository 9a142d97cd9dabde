//! Compact on-disk encoding of the per-vertex shoreline tables.
//!
//! Two layers:
//! - [`rle`]: escape-byte run-length encoding of fixed-width values
//! - [`persisted`]: the versioned envelope holding both RLE streams,
//!   serialized with bincode and compressed with lz4
//!
//! ## File layout
//! A table file is a single lz4 block (size-prefixed) wrapping a bincode
//! `TableEnvelope`. The envelope starts with the `u32` format version,
//! followed by the vertex count and the rigidity and alpha RLE streams.
//! The version is therefore the first field after decompression, not the
//! first bytes of the file.

pub mod persisted;
pub mod rle;

pub use persisted::{decode_tables, encode_tables};
pub use rle::{decode, decode_exact, encode, RleElement};

/// Errors raised while reading persisted table data.
///
/// All of these mean "stale or corrupt": the owning surface discards the
/// payload and recomputes its tables.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Truncated RLE stream at byte {offset}")]
    Truncated { offset: usize },

    #[error("Zero-length run record at byte {offset}")]
    ZeroRun { offset: usize },

    #[error("Version mismatch: expected {expected}, got {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Length mismatch: expected {expected} values, decoded {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("Compression error: {0}")]
    Compression(#[from] std::io::Error),

    #[error("Envelope error: {0}")]
    Envelope(#[from] bincode::Error),
}
