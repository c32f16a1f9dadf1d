//! Incoming half of the content layer.
//!
//! One incoming message is processed at a time. [`MessageLayer::read`]
//! opens the next record, parses the content framing, and exposes the
//! message through the typed accessors; [`MessageLayer::read_consume`]
//! closes it. Handshake bodies are read through a [`BoundedReader`] that
//! carries the message bounds, so a message spanning several records on a
//! stream transport keeps a single consistent reading position across
//! [`MessageLayer::read_pause_handshake`] / resume cycles.

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
    ParsedHandshakeHeader,
    STREAM_HANDSHAKE_HEADER_LEN,
};
use super::record::{ContentType, Epoch, RecordIn, RecordLayer, TransportMode};
use super::types::{AlertIn, AlertLevel, AppIn, CcsIn, Fragment, HandshakeIn};
use crate::bounded::BoundedReader;
use crate::splice::{ReaderError, SpliceReader};

/// Read-half state.
#[derive(Debug)]
pub(super) struct Incoming {
    /// Content type of the open message, if any.
    open: Option<ContentType>,
    /// Record reader of the open message, for all types whose body is read
    /// directly. Handshake readers live inside the bounded reader instead.
    reader: Option<SpliceReader>,
    /// Epoch of the open message.
    epoch: Epoch,
    /// Parsed alert, valid while an alert message is open.
    alert: Option<(AlertLevel, u8)>,
    hs: IncomingHs,
}

/// Handshake sub-state of the read half.
#[derive(Debug)]
enum IncomingHs {
    Idle,
    Active { bounds: BoundedReader, info: HsInfo },
    Paused { bounds: BoundedReader, info: HsInfo },
}

/// Parsed handshake framing kept for the lifetime of one message.
#[derive(Clone, Copy, Debug)]
struct HsInfo {
    msg_type: u8,
    len: usize,
    epoch: Epoch,
    fragment: Option<Fragment>,
}

impl Incoming {
    pub(super) fn new() -> Self {
        Self {
            open: None,
            reader: None,
            epoch: 0,
            alert: None,
            hs: IncomingHs::Idle,
        }
    }
}

impl<L: RecordLayer> MessageLayer<L> {
    /// Open the next incoming message.
    ///
    /// Returns the content type of the message now open for reading. For
    /// handshake messages this parses the handshake header (or resumes a
    /// paused message) and arms the bounded reader returned by
    /// [`MessageLayer::incoming_handshake`].
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::ChannelOpen`] while a message is open,
    /// [`ContentError::Retry`] when a stream record boundary interrupted an
    /// alert or handshake header (the record was released; call again),
    /// [`ContentError::InvalidContent`] on malformed content, and record
    /// layer errors such as [`super::RecordError::WantRead`].
    pub fn read(&mut self) -> Result<ContentType, ContentError> {
        if self.incoming.open.is_some() {
            return Err(ContentError::ChannelOpen);
        }

        let RecordIn {
            content_type,
            epoch,
            mut reader,
        } = self.records.read_start()?;
        trace!("incoming record: type {content_type:?}, epoch {epoch}");

        match content_type {
            ContentType::App => {
                self.incoming.reader = Some(reader);
            }
            ContentType::Ack => {
                debug!("rejecting unsupported ack record");
                return Err(ContentError::InvalidContent("ack records are not supported"));
            }
            ContentType::Alert => match parse_alert(&mut reader) {
                Ok(alert) => {
                    self.incoming.alert = Some(alert);
                    self.incoming.reader = Some(reader);
                }
                Err(err) => return self.recover_at_boundary(reader, err, "alert spans records"),
            },
            ContentType::Ccs => {
                // Empty records of this type never reach us, so a boundary
                // cannot interrupt the single payload byte.
                parse_ccs(&mut reader)?;
                self.incoming.reader = Some(reader);
            }
            ContentType::Handshake => self.open_incoming_handshake(reader, epoch)?,
        }

        self.incoming.open = Some(content_type);
        self.incoming.epoch = epoch;
        Ok(content_type)
    }

    /// Content type of the currently open incoming message, if any.
    #[must_use]
    pub fn incoming_type(&self) -> Option<ContentType> { self.incoming.open }

    fn open_incoming_handshake(
        &mut self,
        mut reader: SpliceReader,
        epoch: Epoch,
    ) -> Result<(), ContentError> {
        match mem::replace(&mut self.incoming.hs, IncomingHs::Idle) {
            IncomingHs::Idle => {
                let parsed = match parse_handshake_header(self.mode, &mut reader) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        return self
                            .recover_at_boundary(reader, err, "handshake header spans records")
                            .map(|_| ());
                    }
                };

                let (bound, fragment) = match self.mode {
                    TransportMode::Stream => (parsed.len, None),
                    TransportMode::Datagram => {
                        if parsed.frag_offset + parsed.frag_len > parsed.len {
                            return Err(ContentError::InvalidContent(
                                "handshake fragment exceeds the message length",
                            ));
                        }
                        let fragment = Fragment {
                            seq_nr: parsed.seq_nr,
                            offset: parsed.frag_offset,
                            len: parsed.frag_len,
                        };
                        (parsed.frag_len, Some(fragment))
                    }
                };
                trace!(
                    "handshake header: type {}, len {}, reading bound {bound}",
                    parsed.msg_type, parsed.len
                );

                let info = HsInfo {
                    msg_type: parsed.msg_type,
                    len: parsed.len,
                    epoch,
                    fragment,
                };
                let mut bounds = BoundedReader::new(bound);
                bounds.attach(reader)?;
                self.incoming.hs = IncomingHs::Active { bounds, info };
            }
            IncomingHs::Paused { mut bounds, info } => {
                // The epoch cannot change while a handshake message is
                // paused; the record layer enforces this.
                if info.epoch != epoch {
                    self.incoming.hs = IncomingHs::Paused { bounds, info };
                    return Err(ContentError::Internal);
                }
                bounds.attach(reader)?;
                self.incoming.hs = IncomingHs::Active { bounds, info };
            }
            IncomingHs::Active { .. } => return Err(ContentError::Internal),
        }
        Ok(())
    }

    /// Handle a parse failure: a record boundary is recoverable on stream
    /// transports and malformed content on datagram transports.
    fn recover_at_boundary(
        &mut self,
        reader: SpliceReader,
        err: ContentError,
        what: &'static str,
    ) -> Result<ContentType, ContentError> {
        if matches!(err, ContentError::Reader(ReaderError::OutOfData { .. })) {
            return match self.mode {
                TransportMode::Stream => {
                    debug!("{what}; releasing record and retrying");
                    self.records.read_done(reader)?;
                    Err(ContentError::Retry)
                }
                TransportMode::Datagram => Err(ContentError::InvalidContent(what)),
            };
        }
        Err(err)
    }

    /// Close the open incoming message.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::ChannelClosed`] without an open message and
    /// [`ContentError::UnfinishedHandshake`] when a handshake body has not
    /// been fully read and committed; the message then stays open.
    pub fn read_consume(&mut self) -> Result<(), ContentError> {
        match self.incoming.open {
            Some(ContentType::Handshake) => {
                let IncomingHs::Active { mut bounds, info } =
                    mem::replace(&mut self.incoming.hs, IncomingHs::Idle)
                else {
                    return Err(ContentError::Internal);
                };
                if bounds.check_done().is_err() {
                    self.incoming.hs = IncomingHs::Active { bounds, info };
                    return Err(ContentError::UnfinishedHandshake);
                }
                let reader = bounds.detach()?;
                self.records.read_done(reader)?;
            }
            Some(_) => {
                let reader = self.incoming.reader.take().ok_or(ContentError::Internal)?;
                self.records.read_done(reader)?;
            }
            None => return Err(ContentError::ChannelClosed),
        }

        self.incoming.alert = None;
        self.incoming.open = None;
        trace!("incoming message consumed");
        Ok(())
    }

    /// Suspend the open incoming handshake message at a record boundary.
    ///
    /// The record is released while the bounded reader keeps the position
    /// within the message; the next handshake record resumes it.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::PausingNotSupported`] on datagram transports
    /// and [`ContentError::ChannelClosed`] without an open handshake
    /// message.
    pub fn read_pause_handshake(&mut self) -> Result<(), ContentError> {
        if self.mode != TransportMode::Stream {
            return Err(ContentError::PausingNotSupported);
        }
        if self.incoming.open != Some(ContentType::Handshake) {
            return Err(ContentError::ChannelClosed);
        }

        let IncomingHs::Active { mut bounds, info } =
            mem::replace(&mut self.incoming.hs, IncomingHs::Idle)
        else {
            return Err(ContentError::Internal);
        };
        let reader = bounds.detach()?;
        self.records.read_done(reader)?;

        trace!("incoming handshake paused at offset {}", bounds.committed());
        self.incoming.hs = IncomingHs::Paused { bounds, info };
        self.incoming.open = None;
        Ok(())
    }

    /// Access the open incoming handshake message.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::ChannelClosed`] without an open handshake
    /// message.
    pub fn incoming_handshake(&mut self) -> Result<HandshakeIn<'_>, ContentError> {
        if self.incoming.open != Some(ContentType::Handshake) {
            return Err(ContentError::ChannelClosed);
        }
        let IncomingHs::Active { bounds, info } = &mut self.incoming.hs else {
            return Err(ContentError::Internal);
        };
        Ok(HandshakeIn {
            msg_type: info.msg_type,
            len: info.len,
            epoch: info.epoch,
            fragment: info.fragment,
            reader: bounds,
        })
    }

    /// The open incoming alert.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::ChannelClosed`] without an open alert.
    pub fn incoming_alert(&self) -> Result<AlertIn, ContentError> {
        if self.incoming.open != Some(ContentType::Alert) {
            return Err(ContentError::ChannelClosed);
        }
        let (level, description) = self.incoming.alert.ok_or(ContentError::Internal)?;
        Ok(AlertIn {
            epoch: self.incoming.epoch,
            level,
            description,
        })
    }

    /// The open incoming change-cipher-spec message.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::ChannelClosed`] without an open message.
    pub fn incoming_ccs(&self) -> Result<CcsIn, ContentError> {
        if self.incoming.open != Some(ContentType::Ccs) {
            return Err(ContentError::ChannelClosed);
        }
        Ok(CcsIn {
            epoch: self.incoming.epoch,
        })
    }

    /// Access the open incoming application data record.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::ChannelClosed`] without an open record.
    pub fn incoming_app(&mut self) -> Result<AppIn<'_>, ContentError> {
        if self.incoming.open != Some(ContentType::App) {
            return Err(ContentError::ChannelClosed);
        }
        let epoch = self.incoming.epoch;
        let reader = self.incoming.reader.as_mut().ok_or(ContentError::Internal)?;
        Ok(AppIn { epoch, reader })
    }
}

fn parse_alert(reader: &mut SpliceReader) -> Result<(AlertLevel, u8), ContentError> {
    let buf = reader.fetch(ALERT_LEN)?;
    let level_byte = buf[0];
    let description = buf[1];
    reader.commit()?;

    let level = AlertLevel::from_wire(level_byte)
        .ok_or(ContentError::InvalidContent("unknown alert level"))?;
    Ok((level, description))
}

fn parse_ccs(reader: &mut SpliceReader) -> Result<(), ContentError> {
    let buf = reader.fetch(CCS_LEN)?;
    let value = buf[0];
    reader.commit()?;

    if value != CCS_VALUE {
        return Err(ContentError::InvalidContent("bad change-cipher-spec value"));
    }
    Ok(())
}

fn parse_handshake_header(
    mode: TransportMode,
    reader: &mut SpliceReader,
) -> Result<ParsedHandshakeHeader, ContentError> {
    let parsed = match mode {
        TransportMode::Stream => {
            let buf = reader.fetch(STREAM_HANDSHAKE_HEADER_LEN)?;
            header::parse_stream_handshake_header(buf)
        }
        TransportMode::Datagram => {
            let buf = reader.fetch(DATAGRAM_HANDSHAKE_HEADER_LEN)?;
            header::parse_datagram_handshake_header(buf)
        }
    };
    reader.commit()?;
    Ok(parsed)
}
