//! Error types for the Cross-Spectrum codec.
//!
//! Decoding and encoding fail independently, so each direction has its own
//! enum.  Every structural violation aborts the whole `load`/`dump` call;
//! there is no partial-file result.

use std::io;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::spectrum::Channel;

/// Error returned by a caller-supplied channel transform.
pub type TransformError = Box<dyn std::error::Error + Send + Sync>;

// ── Shape ────────────────────────────────────────────────────────────────────

/// Spectrum dimensions that cannot be decoded or encoded.
#[derive(Error, Debug)]
pub enum ShapeError {
    #[error("Negative {axis} cell count: {count}")]
    NegativeCells { axis: &'static str, count: i32 },

    /// A size computed from the dimensions does not fit in memory sizes.
    #[error("{rows} x {columns} overflows the addressable size")]
    Overflow { rows: usize, columns: usize },

    /// A transform returned a row of a different length.
    #[error("Transform changed {channel} row {row} from {expected} to {found} values")]
    RowLength { channel: Channel, row: usize, expected: usize, found: usize },

    /// A row was routed to a matrix of the other kind.
    #[error("{channel} is not a {expected} channel")]
    ChannelKind { channel: Channel, expected: &'static str },

    #[error("Matrix layout: {0}")]
    Layout(#[from] ndarray::ShapeError),
}

// ── Decode ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum DecodeError {
    /// The version tag is not one this build can decode.  Raised before any
    /// byte past the tag is consumed.
    #[error("Unsupported Cross-Spectrum version: {0}")]
    UnsupportedVersion(i16),

    /// The source ended before a field was complete.
    #[error("Truncated input: field at offset {offset} needs {needed} byte(s)")]
    TruncatedInput { offset: u64, needed: usize },

    /// The tagged-block section did not add up to its declared size.
    #[error(
        "Malformed block section at offset {offset}: {remaining} byte(s) left, \
         next block needs {declared}"
    )]
    MalformedBlockSection { offset: u64, remaining: u32, declared: u64 },

    /// Negative or unrepresentable range/doppler cell counts, or a row whose
    /// length no longer matches the header.
    #[error("Invalid spectrum shape: {0}")]
    InvalidShape(#[from] ShapeError),

    /// A fixed-width text field is not ASCII.
    #[error("Invalid text at offset {offset}: {bytes:02x?}")]
    Encoding { offset: u64, bytes: Vec<u8> },

    /// A declared size is larger than the configured [`ReadOptions`] allow.
    ///
    /// [`ReadOptions`]: crate::csfile::ReadOptions
    #[error("{what} of {size} bytes exceeds the limit of {max} bytes")]
    LimitExceeded { what: &'static str, size: u64, max: u64 },

    /// The caller's transform rejected a row.
    #[error("Transform failed on {channel} row {row}: {source}")]
    Transform {
        channel: Channel,
        row:     usize,
        #[source]
        source:  TransformError,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Encode ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Unsupported Cross-Spectrum version: {0}")]
    UnsupportedVersion(i16),

    /// A text field is not ASCII or does not fill its fixed width.
    #[error("Cannot encode {value:?} as {width}-byte ASCII")]
    Encoding { value: String, width: usize },

    /// Negative range/doppler cell counts in the header.
    #[error("Invalid spectrum shape: {0}")]
    InvalidShape(#[from] ShapeError),

    /// A channel matrix disagrees with the header dimensions.
    #[error("{channel} has shape {found:?}, header requires {expected:?}")]
    ShapeMismatch {
        channel:  Channel,
        expected: (usize, usize),
        found:    (usize, usize),
    },

    /// `cskind >= 2` requires a quality channel.
    #[error("Header cskind {0} requires a quality channel but the spectrum has none")]
    MissingQuality(i16),

    #[error("Timestamp {0} is outside the 1904-based u32 range")]
    TimestampOutOfRange(NaiveDateTime),

    /// The serialized header does not fit its on-disk size fields.
    #[error("Header of {0} bytes does not fit the on-disk size fields")]
    HeaderTooLarge(u64),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
