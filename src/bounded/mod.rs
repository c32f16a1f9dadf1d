//! Logical message bounds and nested group bounds over a splice writer or
//! reader.
//!
//! A bounded writer or reader wraps its splice counterpart with a stack of
//! size-bounded *groups*: the root group is the total message size, inner
//! groups are length-prefixed substructures. Every fetch is checked against
//! the innermost open group, so a parser or serializer cannot run past a
//! declared length by construction.
//!
//! The underlying splice object is attached by value and handed back at
//! detach, so the bookkeeping survives record boundaries: detach before
//! releasing the record, reattach when the next record arrives, and the
//! fetch and commit offsets continue where they left off. On the write side
//! an attached writer can additionally *hold* commits, which defers all
//! committing to the caller; this is what allows reserving a header whose
//! length field is only known once the message body is complete.

pub mod error;
mod reader;
mod writer;

pub use error::BoundsError;
pub use reader::BoundedReader;
pub use writer::{BoundedWriter, Detached, Passthrough};

/// Maximum nesting depth of groups, including the root group.
pub const MAX_GROUPS: usize = 5;

#[cfg(test)]
mod reader_tests;
#[cfg(test)]
mod writer_tests;
