#![doc(html_root_url = "https://docs.rs/byteloom/latest")]
//! Public API for the `byteloom` library.
//!
//! This crate provides the buffering backbone between a record-oriented
//! transport layer and a message-oriented protocol engine, such as a (D)TLS
//! handshake state machine. It is sans-IO: no sockets, no timers, no
//! cryptography. The record layer below is an abstract collaborator
//! ([`content::RecordLayer`]), and all progress that depends on the transport
//! is signalled through recoverable status codes rather than blocking.
//!
//! Three layers build on each other:
//!
//! - [`splice`] adapts a stream of fixed-size provider buffers to
//!   variable-size consumer writes and reads, splicing a single message
//!   across several buffers and coalescing several small messages into one.
//! - [`bounded`] imposes logical message bounds and nested group bounds on a
//!   splice writer or reader, and can hold commits back until the final
//!   message length is known.
//! - [`content`] drives record-content framing on top of both: handshake
//!   headers, alerts, and change-cipher-spec, including pausing a handshake
//!   message across record boundaries.

pub mod bounded;
pub mod byte_order;
pub mod content;
pub mod splice;

pub use bounded::{BoundedReader, BoundedWriter, BoundsError, Detached, Passthrough};
pub use content::{
    AlertIn,
    AlertLevel,
    ContentError,
    ContentType,
    Epoch,
    HandshakeIn,
    HandshakeParams,
    MessageLayer,
    RecordError,
    RecordIn,
    RecordLayer,
    TransportMode,
};
pub use splice::{
    ReadFeed,
    ReaderError,
    Reclaimed,
    ReclaimedFrag,
    SpliceReader,
    SpliceWriter,
    WriteFeed,
    WriterError,
};
