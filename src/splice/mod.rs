//! Buffer splicing between a provider of record-sized buffers and a consumer
//! of variable-size reads and writes.
//!
//! A [`SpliceWriter`] lets a consumer request contiguous write chunks of any
//! size while the provider hands in fixed-size backing buffers one at a
//! time. Writes that do not fit the current buffer spill into an optional
//! overflow queue, which is drained into subsequent buffers. A
//! [`SpliceReader`] is the symmetric read-side adapter: it serves contiguous
//! read chunks out of provider fragments, backing up a partially-read
//! fragment into an optional accumulator when a request crosses a fragment
//! boundary.
//!
//! Both sides share the same two-phase rhythm: the provider *feeds* a
//! buffer, the consumer *fetches* chunks and *commits* the ones it intends
//! to keep, and the provider finally *reclaims* the buffer. Uncommitted
//! bytes are dropped at reclaim time, which is what makes retrying a failed
//! multi-chunk operation safe.

pub mod error;
mod reader;
mod writer;

pub use error::{ReaderError, WriterError};
pub use reader::{ReadFeed, ReclaimedFrag, SpliceReader};
pub use writer::{Reclaimed, SpliceWriter, WriteFeed};

#[cfg(test)]
mod reader_tests;
