//! Outgoing half of the content layer.
//!
//! One outgoing message is assembled at a time: a `write_*` call opens the
//! message, the caller fills its body, and [`MessageLayer::dispatch`]
//! closes it. Handshake messages reserve their header bytes up front but
//! commit them only at dispatch, so a message that turns out not to fit
//! can be aborted without leaking an empty fragment into the record.
//! When the message length is deferred, the bounded writer runs in hold
//! mode and the header is backfilled with the committed body length at
//! dispatch time.

use std::mem;

use log::{debug, trace};

use super::MessageLayer;
use super::error::ContentError;
use super::header::{
    self,
    ALERT_LEN,
    CCS_LEN,
    CCS_VALUE,
    DATAGRAM_HANDSHAKE_HEADER_LEN,
    STREAM_HANDSHAKE_HEADER_LEN,
};
use super::record::{ContentType, Epoch, RecordLayer, TransportMode};
use super::types::{AlertLevel, FragmentOut, HandshakeParams};
use crate::bounded::{BoundedWriter, Detached, Passthrough};
use crate::byte_order::U24_MAX;
use crate::splice::{SpliceWriter, WriterError};

/// Write-half state.
#[derive(Debug)]
pub(super) struct Outgoing {
    /// Content type of the open message, if any.
    open: Option<ContentType>,
    /// Record writer of the open message, for all types whose body is
    /// written directly. Handshake writers live inside the bounded writer.
    writer: Option<SpliceWriter>,
    /// A record layer flush is owed before the next message opens.
    clearing: bool,
    hs: OutgoingHs,
}

/// Handshake sub-state of the write half.
#[derive(Debug)]
enum OutgoingHs {
    Idle,
    Active { bounds: BoundedWriter, header: OutHeader },
    Paused { bounds: BoundedWriter, header: OutHeader },
}

/// Announced handshake framing kept for the lifetime of one message.
#[derive(Clone, Copy, Debug)]
struct OutHeader {
    msg_type: u8,
    epoch: Epoch,
    len: Option<usize>,
    seq_nr: u16,
    frag_offset: usize,
    frag_len: Option<usize>,
    /// Logical offset of the reserved header bytes in the current record
    /// writer, when the header still awaits its length fields.
    reserved_at: Option<usize>,
}

impl Outgoing {
    pub(super) fn new() -> Self {
        Self {
            open: None,
            writer: None,
            clearing: false,
            hs: OutgoingHs::Idle,
        }
    }
}

impl<L: RecordLayer> MessageLayer<L> {
    /// Content type of the currently open outgoing message, if any.
    #[must_use]
    pub fn outgoing_type(&self) -> Option<ContentType> { self.outgoing.open }

    /// Request that all pending records are delivered to the transport.
    ///
    /// # Errors
    ///
    /// Forwards record layer errors; the flush stays owed and is retried
    /// before the next message opens.
    pub fn flush(&mut self) -> Result<(), ContentError> {
        self.outgoing.clearing = true;
        self.check_clear()
    }

    fn check_clear(&mut self) -> Result<(), ContentError> {
        if !self.outgoing.clearing {
            return Ok(());
        }
        self.records.write_flush()?;
        self.outgoing.clearing = false;
        Ok(())
    }

    /// Open a record writer for a message of the given type.
    fn prepare_write(
        &mut self,
        content_type: ContentType,
        epoch: Epoch,
    ) -> Result<(), ContentError> {
        if self.outgoing.open.is_some() {
            return Err(ContentError::ChannelOpen);
        }
        if !self.allow_interleaving
            && content_type != ContentType::Handshake
            && matches!(self.outgoing.hs, OutgoingHs::Paused { .. })
        {
            return Err(ContentError::NoInterleaving);
        }

        self.check_clear()?;

        let writer = self.records.write_start(content_type, epoch)?;
        self.outgoing.writer = Some(writer);
        self.outgoing.open = Some(content_type);
        trace!("outgoing record: type {content_type:?}, epoch {epoch}");
        Ok(())
    }

    /// Close the current record and ask for a flush before retrying.
    fn retry_after_flush(&mut self, writer: SpliceWriter) -> Result<(), ContentError> {
        debug!("record out of space; requesting flush and retry");
        self.outgoing.clearing = true;
        self.outgoing.open = None;
        self.records.write_done(writer)?;
        Err(ContentError::Retry)
    }

    /// Open an outgoing alert message.
    ///
    /// The alert bytes are written immediately; [`MessageLayer::dispatch`]
    /// commits them into the record.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::ChannelOpen`] while a message is open,
    /// [`ContentError::NoInterleaving`] while a handshake is paused, and
    /// [`ContentError::Retry`] when the record had no room (a flush was
    /// requested; call again).
    pub fn write_alert(
        &mut self,
        epoch: Epoch,
        level: AlertLevel,
        description: u8,
    ) -> Result<(), ContentError> {
        self.prepare_write(ContentType::Alert, epoch)?;
        let mut writer = self.outgoing.writer.take().ok_or(ContentError::Internal)?;

        match writer.fetch(ALERT_LEN) {
            Ok(chunk) => {
                chunk[0] = level as u8;
                chunk[1] = description;
            }
            Err(WriterError::OutOfSpace { .. }) => return self.retry_after_flush(writer),
            Err(err) => return Err(err.into()),
        }

        self.outgoing.writer = Some(writer);
        Ok(())
    }

    /// Open an outgoing change-cipher-spec message.
    ///
    /// # Errors
    ///
    /// As for [`MessageLayer::write_alert`].
    pub fn write_ccs(&mut self, epoch: Epoch) -> Result<(), ContentError> {
        self.prepare_write(ContentType::Ccs, epoch)?;
        let mut writer = self.outgoing.writer.take().ok_or(ContentError::Internal)?;

        match writer.fetch(CCS_LEN) {
            Ok(chunk) => chunk[0] = CCS_VALUE,
            Err(WriterError::OutOfSpace { .. }) => return self.retry_after_flush(writer),
            Err(err) => return Err(err.into()),
        }

        self.outgoing.writer = Some(writer);
        Ok(())
    }

    /// Open an outgoing application data record and return its writer.
    ///
    /// The caller writes and commits through the splice writer directly;
    /// [`MessageLayer::dispatch`] closes the record.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::ChannelOpen`] while a message is open and
    /// [`ContentError::NoInterleaving`] while a handshake is paused.
    pub fn write_app(&mut self, epoch: Epoch) -> Result<&mut SpliceWriter, ContentError> {
        self.prepare_write(ContentType::App, epoch)?;
        self.outgoing.writer.as_mut().ok_or(ContentError::Internal)
    }

    /// Open an outgoing handshake message, or resume a paused one, and
    /// return the bounded writer for its body.
    ///
    /// With `params.len` set, the header is written immediately and body
    /// commits pass straight through to the record. With `params.len` of
    /// `None`, the header bytes are reserved, commits are held, and the
    /// header is backfilled with the committed body length at dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::ContinuationMismatch`] when resuming with
    /// different parameters, [`ContentError::InvalidFragment`] and
    /// [`ContentError::OversizedMessage`] on bad parameters, and
    /// [`ContentError::Retry`] when the header did not fit the record (a
    /// flush was requested; call again).
    pub fn write_handshake(
        &mut self,
        params: &HandshakeParams,
    ) -> Result<&mut BoundedWriter, ContentError> {
        if let OutgoingHs::Paused { header, .. } = &self.outgoing.hs
            && (header.epoch != params.epoch
                || header.msg_type != params.msg_type
                || header.len != params.len)
        {
            return Err(ContentError::ContinuationMismatch);
        }

        let fragment = self.validate_handshake_params(params)?;
        self.prepare_write(ContentType::Handshake, params.epoch)?;

        match mem::replace(&mut self.outgoing.hs, OutgoingHs::Idle) {
            OutgoingHs::Idle => self.open_outgoing_handshake(params, fragment)?,
            OutgoingHs::Paused { mut bounds, header } => {
                let writer = self.outgoing.writer.take().ok_or(ContentError::Internal)?;
                let bound_known = match self.mode {
                    TransportMode::Stream => header.len.is_some(),
                    TransportMode::Datagram => header.frag_len.is_some(),
                };
                let mode = if bound_known {
                    Passthrough::Pass
                } else {
                    Passthrough::Hold
                };
                bounds.attach(writer, mode)?;
                self.outgoing.hs = OutgoingHs::Active { bounds, header };
            }
            OutgoingHs::Active { .. } => return Err(ContentError::Internal),
        }

        let OutgoingHs::Active { bounds, .. } = &mut self.outgoing.hs else {
            return Err(ContentError::Internal);
        };
        Ok(bounds)
    }

    /// Access the bounded writer of the open outgoing handshake message.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::ChannelClosed`] without an open handshake
    /// message.
    pub fn handshake_writer(&mut self) -> Result<&mut BoundedWriter, ContentError> {
        if self.outgoing.open != Some(ContentType::Handshake) {
            return Err(ContentError::ChannelClosed);
        }
        let OutgoingHs::Active { bounds, .. } = &mut self.outgoing.hs else {
            return Err(ContentError::Internal);
        };
        Ok(bounds)
    }

    fn validate_handshake_params(
        &self,
        params: &HandshakeParams,
    ) -> Result<FragmentOut, ContentError> {
        if let Some(len) = params.len
            && len > U24_MAX as usize
        {
            return Err(ContentError::OversizedMessage { len });
        }

        match self.mode {
            // Stream transports carry whole messages; fragment parameters
            // are meaningless and ignored.
            TransportMode::Stream => Ok(FragmentOut {
                seq_nr: 0,
                offset: 0,
                len: params.len,
            }),
            TransportMode::Datagram => {
                let fragment = params.fragment.ok_or(ContentError::InvalidFragment)?;
                if params.len.is_none() && (fragment.offset != 0 || fragment.len.is_some()) {
                    return Err(ContentError::InvalidFragment);
                }
                if let (Some(len), Some(frag_len)) = (params.len, fragment.len)
                    && fragment.offset + frag_len > len
                {
                    return Err(ContentError::InvalidFragment);
                }
                if let Some(frag_len) = fragment.len
                    && frag_len > U24_MAX as usize
                {
                    return Err(ContentError::OversizedMessage { len: frag_len });
                }
                if fragment.offset > U24_MAX as usize {
                    return Err(ContentError::OversizedMessage {
                        len: fragment.offset,
                    });
                }
                Ok(fragment)
            }
        }
    }

    fn open_outgoing_handshake(
        &mut self,
        params: &HandshakeParams,
        fragment: FragmentOut,
    ) -> Result<(), ContentError> {
        let hdr_len = match self.mode {
            TransportMode::Stream => STREAM_HANDSHAKE_HEADER_LEN,
            TransportMode::Datagram => DATAGRAM_HANDSHAKE_HEADER_LEN,
        };

        let mut writer = self.outgoing.writer.take().ok_or(ContentError::Internal)?;
        let mut hdr = OutHeader {
            msg_type: params.msg_type,
            epoch: params.epoch,
            len: params.len,
            seq_nr: fragment.seq_nr,
            frag_offset: fragment.offset,
            frag_len: fragment.len,
            reserved_at: Some(writer.fetched()),
        };

        // Reserve the header bytes. They are written now when the lengths
        // are known, but committed only at dispatch so an aborted message
        // leaves no trace in the record.
        let encoded = encoded_header(self.mode, &hdr);
        match writer.fetch(hdr_len) {
            Ok(chunk) => {
                if let Some(bytes) = &encoded {
                    chunk.copy_from_slice(&bytes[..hdr_len]);
                    hdr.reserved_at = None;
                }
            }
            Err(WriterError::OutOfSpace { .. }) => return self.retry_after_flush(writer),
            Err(err) => return Err(err.into()),
        }

        let bound = match self.mode {
            TransportMode::Stream => hdr.len,
            TransportMode::Datagram => hdr.frag_len,
        };
        let mut bounds = BoundedWriter::new(bound);
        let mode = if bound.is_some() {
            Passthrough::Pass
        } else {
            Passthrough::Hold
        };
        bounds.attach(writer, mode)?;
        trace!(
            "handshake message opened: type {}, len {:?}, policy {mode:?}",
            hdr.msg_type, hdr.len
        );

        self.outgoing.hs = OutgoingHs::Active { bounds, header: hdr };
        Ok(())
    }

    /// Close the open outgoing message and hand the record back.
    ///
    /// For handshake messages this is the point where a deferred length is
    /// learned, the header backfilled, and header plus body committed in
    /// one step.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::ChannelClosed`] without an open message and
    /// [`ContentError::UnfinishedHandshake`] when the announced handshake
    /// length has not been fully written; the message then stays open.
    pub fn dispatch(&mut self) -> Result<(), ContentError> {
        match self.outgoing.open {
            Some(ContentType::Handshake) => self.dispatch_handshake()?,
            Some(ContentType::Alert | ContentType::Ccs) => {
                let mut writer = self.outgoing.writer.take().ok_or(ContentError::Internal)?;
                writer.commit()?;
                self.records.write_done(writer)?;
            }
            Some(ContentType::App) => {
                // Application data is committed by the caller through the
                // record writer.
                let writer = self.outgoing.writer.take().ok_or(ContentError::Internal)?;
                self.records.write_done(writer)?;
            }
            Some(ContentType::Ack) | None => return Err(ContentError::ChannelClosed),
        }

        self.outgoing.open = None;
        trace!("outgoing message dispatched");
        Ok(())
    }

    fn dispatch_handshake(&mut self) -> Result<(), ContentError> {
        let OutgoingHs::Active { mut bounds, mut header } =
            mem::replace(&mut self.outgoing.hs, OutgoingHs::Idle)
        else {
            return Err(ContentError::Internal);
        };

        if bounds.check_done().is_err() {
            self.outgoing.hs = OutgoingHs::Active { bounds, header };
            return Err(ContentError::UnfinishedHandshake);
        }

        let Detached {
            mut writer,
            committed,
            uncommitted,
        } = bounds.detach()?;

        // A deferred length is now known: it is exactly what got
        // committed.
        if header.len.is_none() {
            if committed > U24_MAX as usize {
                return Err(ContentError::OversizedMessage { len: committed });
            }
            header.len = Some(committed);
        }
        if self.mode == TransportMode::Datagram && header.frag_len.is_none() {
            header.frag_len = Some(committed);
        }

        if let Some(at) = header.reserved_at.take() {
            let encoded = encoded_header(self.mode, &header).ok_or(ContentError::Internal)?;
            let hdr_len = match self.mode {
                TransportMode::Stream => STREAM_HANDSHAKE_HEADER_LEN,
                TransportMode::Datagram => DATAGRAM_HANDSHAKE_HEADER_LEN,
            };
            writer.patch(at, &encoded[..hdr_len])?;
            debug!("backfilled handshake header with length {committed}");
        }

        // One commit finalises the header and the committed body prefix.
        writer.commit_partial(uncommitted)?;
        self.records.write_done(writer)?;
        Ok(())
    }

    /// Suspend the open outgoing handshake message at a record boundary.
    ///
    /// The committed body prefix and the header are sealed into the current
    /// record; the next [`MessageLayer::write_handshake`] with matching
    /// parameters resumes the message.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::PausingNotSupported`] on datagram transports
    /// and [`ContentError::ChannelClosed`] without an open handshake
    /// message of known length.
    pub fn pause_handshake(&mut self) -> Result<(), ContentError> {
        if self.mode != TransportMode::Stream {
            return Err(ContentError::PausingNotSupported);
        }
        if self.outgoing.open != Some(ContentType::Handshake) {
            return Err(ContentError::ChannelClosed);
        }
        if let OutgoingHs::Active { header, .. } = &self.outgoing.hs
            && header.len.is_none()
        {
            // A deferred-length message cannot pause: the header cannot be
            // backfilled before the final fragment.
            return Err(ContentError::ChannelClosed);
        }

        let OutgoingHs::Active { mut bounds, header } =
            mem::replace(&mut self.outgoing.hs, OutgoingHs::Idle)
        else {
            return Err(ContentError::Internal);
        };

        let Detached {
            mut writer,
            committed,
            uncommitted,
        } = bounds.detach()?;

        // Commit even when commits were passed through: the header bytes
        // are not committed by the body commits and must be sealed here.
        writer.commit_partial(uncommitted)?;
        self.records.write_done(writer)?;

        trace!("outgoing handshake paused at offset {committed}");
        self.outgoing.hs = OutgoingHs::Paused { bounds, header };
        self.outgoing.open = None;
        Ok(())
    }

    /// Abandon the open outgoing handshake message.
    ///
    /// Only legal before any body bytes were committed; the reserved header
    /// bytes are dropped with the record writer's uncommitted tail.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::ChannelClosed`] without an open handshake
    /// message and [`ContentError::Internal`] when parts of the message
    /// were already committed.
    pub fn write_abort_handshake(&mut self) -> Result<(), ContentError> {
        if self.outgoing.open != Some(ContentType::Handshake) {
            return Err(ContentError::ChannelClosed);
        }

        let OutgoingHs::Active { mut bounds, .. } =
            mem::replace(&mut self.outgoing.hs, OutgoingHs::Idle)
        else {
            return Err(ContentError::Internal);
        };

        let detached = bounds.detach()?;
        if detached.committed != 0 {
            return Err(ContentError::Internal);
        }

        debug!("aborting outgoing handshake message");
        self.records.write_done(detached.writer)?;
        self.outgoing.open = None;
        Ok(())
    }
}

/// Encode the handshake header once all its length fields are known.
///
/// Field ranges were validated against the 24-bit wire limit when the
/// message was opened.
fn encoded_header(
    mode: TransportMode,
    header: &OutHeader,
) -> Option<[u8; DATAGRAM_HANDSHAKE_HEADER_LEN]> {
    let mut buf = [0; DATAGRAM_HANDSHAKE_HEADER_LEN];
    match mode {
        TransportMode::Stream => {
            let len = u32::try_from(header.len?).ok()?;
            header::encode_stream_handshake_header(header.msg_type, len, &mut buf);
        }
        TransportMode::Datagram => {
            let len = u32::try_from(header.len?).ok()?;
            let frag_len = u32::try_from(header.frag_len?).ok()?;
            let frag_offset = u32::try_from(header.frag_offset).ok()?;
            header::encode_datagram_handshake_header(
                header.msg_type,
                len,
                header.seq_nr,
                frag_offset,
                frag_len,
                &mut buf,
            );
        }
    }
    Some(buf)
}
