//! Error types for the splice writer and reader.
//!
//! These enums distinguish caller bugs (calling an operation in the wrong
//! state, committing more than was fetched) from recoverable progress
//! signals (`SpaceLeft`, `OutOfData`, `DataLeft`) that leave the object in a
//! well-defined state and ask the caller to supply another buffer or retry.

use thiserror::Error;

/// Errors produced by [`SpliceWriter`](super::SpliceWriter).
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum WriterError {
    /// An operation that requires providing state ran while consuming.
    #[error("writer is not in providing state")]
    NotProviding,
    /// An operation that requires consuming state ran while providing.
    #[error("writer is not in consuming state")]
    NotConsuming,
    /// A fetch could not be served from the output buffer or the queue.
    #[error("write chunk of {desired} bytes exceeds the {available} available")]
    OutOfSpace {
        /// Chunk size the consumer asked for.
        desired: usize,
        /// Bytes that could still be handed out.
        available: usize,
    },
    /// A partial commit tried to omit more than the uncommitted tail.
    #[error("cannot omit {omit} bytes from commit, only {uncommitted} are uncommitted")]
    OmitOutOfRange {
        /// Tail length the caller asked to leave uncommitted.
        omit: usize,
        /// Bytes fetched but not yet committed.
        uncommitted: usize,
    },
    /// A patch addressed bytes beyond the fetched region.
    #[error("patch of {len} bytes at offset {offset} exceeds the {fetched} bytes fetched")]
    PatchOutOfRange {
        /// Logical offset of the patch.
        offset: usize,
        /// Patch length.
        len: usize,
        /// Bytes handed out so far in this cycle.
        fetched: usize,
    },
    /// The provider reclaimed a buffer the consumer has not filled.
    #[error("{unused} bytes of the output buffer are still unused")]
    SpaceLeft {
        /// Committed bytes missing from a full output buffer.
        unused: usize,
    },
}

/// Errors produced by [`SpliceReader`](super::SpliceReader).
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ReaderError {
    /// An operation that requires producing state ran while consuming.
    #[error("reader is not in producing state")]
    NotProducing,
    /// An operation that requires consuming state ran while producing.
    #[error("reader is not in consuming state")]
    NotConsuming,
    /// A fetch could not be served from the current fragment.
    #[error("read chunk of {desired} bytes exceeds the {available} available")]
    OutOfData {
        /// Chunk size the consumer asked for.
        desired: usize,
        /// Bytes that could still be served.
        available: usize,
    },
    /// A fetch after resuming did not replay the pre-pause request sequence.
    #[error("fetch of {desired} bytes does not match the {expected} bytes buffered before pausing")]
    InconsistentRequest {
        /// Chunk size the consumer asked for.
        desired: usize,
        /// Chunk size that would line up with the accumulator.
        expected: usize,
    },
    /// Uncommitted or unread fragment data remained at reclaim time.
    #[error("fragment data is left to be consumed")]
    DataLeft,
    /// A fragment boundary was hit but the reader has no accumulator.
    #[error("pausing requires an accumulator but none is configured")]
    NeedAccumulator,
    /// The accumulator cannot hold the backup plus the pending request.
    #[error("accumulator of {capacity} bytes cannot back up {needed} bytes")]
    AccumulatorTooSmall {
        /// Configured accumulator capacity.
        capacity: usize,
        /// Bytes the backup would require.
        needed: usize,
    },
}
