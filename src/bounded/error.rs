//! Error type shared by the bounded writer and reader.

use thiserror::Error;

use crate::splice::{ReaderError, WriterError};

/// Errors produced by [`BoundedWriter`](super::BoundedWriter) and
/// [`BoundedReader`](super::BoundedReader).
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum BoundsError {
    /// An operation needed an attached splice object but none was attached.
    #[error("no splice writer or reader is attached")]
    NotAttached,
    /// An attach ran while a splice object was already attached.
    #[error("a splice writer or reader is already attached")]
    AlreadyAttached,
    /// The writer latched into blocked state after a deferred partial
    /// commit; only detach is allowed.
    #[error("writer is blocked after a held partial commit")]
    Blocked,
    /// A fetch or commit would cross the innermost group bound.
    #[error("request for {requested} bytes exceeds the {available} left in the current group")]
    BoundsViolation {
        /// Bytes the operation asked for.
        requested: usize,
        /// Bytes left before the innermost group bound.
        available: usize,
    },
    /// A group close or completion check ran before the bound was reached.
    #[error("{remaining} bytes of the current group are unprocessed")]
    GroupNotExhausted {
        /// Bytes left before the bound being checked.
        remaining: usize,
    },
    /// A group open would exceed the supported nesting depth.
    #[error("group nesting exceeds the supported depth of {max}")]
    TooManyGroups {
        /// Supported nesting depth.
        max: usize,
    },
    /// The underlying splice writer failed.
    #[error("splice writer: {0}")]
    Writer(#[from] WriterError),
    /// The underlying splice reader failed.
    #[error("splice reader: {0}")]
    Reader(#[from] ReaderError),
}
