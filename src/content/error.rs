//! Error type of the content layer.

use thiserror::Error;

use super::record::RecordError;
use crate::bounded::BoundsError;
use crate::splice::{ReaderError, WriterError};

/// Errors produced by [`MessageLayer`](super::MessageLayer).
///
/// `Retry` is the recoverable progress signal: the current record could not
/// take or yield the message, has been released, and the same call should
/// be repeated once the record layer has made progress. The content errors
/// (`InvalidContent`, `UnfinishedHandshake`, `Internal`) are fatal; the
/// layer state is unspecified after them and the caller must tear down.
#[derive(Debug, Error)]
pub enum ContentError {
    /// A message is already open on this half.
    #[error("a message is already open")]
    ChannelOpen,
    /// No message, or no message of the requested type, is open.
    #[error("no matching message is open")]
    ChannelClosed,
    /// The record content is malformed.
    #[error("invalid message content: {0}")]
    InvalidContent(&'static str),
    /// A handshake message was closed before being fully written or read.
    #[error("handshake message is not fully processed")]
    UnfinishedHandshake,
    /// Another content type was opened while a handshake message is paused.
    #[error("cannot interleave other content into a paused handshake")]
    NoInterleaving,
    /// The current record was released; repeat the call after the record
    /// layer has made progress.
    #[error("record boundary reached, retry after record layer progress")]
    Retry,
    /// Parameters of a handshake continuation do not match the paused
    /// message.
    #[error("continuation parameters do not match the paused handshake")]
    ContinuationMismatch,
    /// Fragment parameters are inconsistent with the message length.
    #[error("invalid handshake fragment parameters")]
    InvalidFragment,
    /// A length does not fit the 24-bit wire field.
    #[error("handshake length {len} exceeds the wire format limit")]
    OversizedMessage {
        /// The offending length.
        len: usize,
    },
    /// Pausing is only defined on stream transports.
    #[error("pausing handshake messages requires a stream transport")]
    PausingNotSupported,
    /// Internal bookkeeping was violated.
    #[error("internal state error")]
    Internal,
    /// The record layer failed.
    #[error("record layer: {0}")]
    Record(#[from] RecordError),
    /// A splice writer operation failed.
    #[error("splice writer: {0}")]
    Writer(#[from] WriterError),
    /// A splice reader operation failed.
    #[error("splice reader: {0}")]
    Reader(#[from] ReaderError),
    /// A bounded writer or reader operation failed.
    #[error("bounds: {0}")]
    Bounds(#[from] BoundsError),
}
