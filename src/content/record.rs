//! Record layer collaborator contract.
//!
//! The content layer never touches a transport. It asks an implementation of
//! [`RecordLayer`] for record-content readers and writers, uses them for the
//! duration of one message, and hands them back. Ownership transfer through
//! `start`/`done` makes use-after-release unrepresentable.

use thiserror::Error;

use crate::splice::{ReaderError, SpliceReader, SpliceWriter, WriterError};

/// Identifier of the cryptographic context a record belongs to. Passed
/// through unchanged between the record layer and the caller.
pub type Epoch = u16;

/// Record content types, numbered as on the (D)TLS wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    /// Change-cipher-spec message.
    Ccs = 20,
    /// Alert message.
    Alert = 21,
    /// Handshake message, possibly one fragment of it.
    Handshake = 22,
    /// Application data.
    App = 23,
    /// Acknowledgement message.
    Ack = 25,
}

/// Whether record boundaries respect message boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportMode {
    /// Stream transport: messages and even their headers may span record
    /// boundaries, and the content layer reassembles them transparently.
    Stream,
    /// Datagram transport: every record carries whole messages or whole
    /// handshake fragments; anything split across records is malformed.
    Datagram,
}

/// An incoming record opened by [`RecordLayer::read_start`].
#[derive(Debug)]
pub struct RecordIn {
    /// Content type of the record.
    pub content_type: ContentType,
    /// Epoch the record was protected under.
    pub epoch: Epoch,
    /// Reader over the record content. Must be returned through
    /// [`RecordLayer::read_done`].
    pub reader: SpliceReader,
}

/// Errors surfaced by a record layer implementation.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    /// No incoming record is available; try again once the transport has
    /// delivered more data.
    #[error("no incoming record available")]
    WantRead,
    /// Outgoing records cannot be accepted right now; flush and retry.
    #[error("record layer cannot accept more data")]
    WantWrite,
    /// The record layer rejected the request.
    #[error("record layer rejected the request: {0}")]
    Rejected(&'static str),
    /// A splice writer operation failed inside the record layer.
    #[error("splice writer: {0}")]
    Writer(#[from] WriterError),
    /// A splice reader operation failed inside the record layer.
    #[error("splice reader: {0}")]
    Reader(#[from] ReaderError),
}

/// Supplier of record-content readers and writers.
///
/// Contract: at most one reader and one writer are out at any time. A
/// reader obtained from `read_start` must come back through `read_done`
/// before the next `read_start`; the writer contract is symmetric. The
/// layer below owns buffer management, protection, and transport IO.
pub trait RecordLayer {
    /// Open the next available incoming record.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::WantRead`] when no record is available.
    fn read_start(&mut self) -> Result<RecordIn, RecordError>;

    /// Release the reader of the current incoming record.
    ///
    /// # Errors
    ///
    /// Returns an error when the record cannot be closed, for example when
    /// unprocessed data remains and the reader cannot back it up.
    fn read_done(&mut self, reader: SpliceReader) -> Result<(), RecordError>;

    /// Open an outgoing record of the given content type and epoch.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::WantWrite`] when no record buffer is
    /// available.
    fn write_start(
        &mut self,
        content_type: ContentType,
        epoch: Epoch,
    ) -> Result<SpliceWriter, RecordError>;

    /// Release the writer of the current outgoing record, marking its
    /// committed content ready for dispatch.
    ///
    /// # Errors
    ///
    /// Returns an error when the record cannot be closed.
    fn write_done(&mut self, writer: SpliceWriter) -> Result<(), RecordError>;

    /// Deliver all pending outgoing records to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::WantWrite`] when the transport cannot take
    /// the data yet.
    fn write_flush(&mut self) -> Result<(), RecordError>;
}
