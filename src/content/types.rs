//! User-facing message descriptions exchanged with the content layer.

use super::record::Epoch;
use crate::bounded::BoundedReader;
use crate::splice::SpliceReader;

/// Severity of an alert message, as encoded on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertLevel {
    /// The peer is tearing the connection down.
    Fatal = 1,
    /// The peer reports a non-fatal condition.
    Warning = 2,
}

impl AlertLevel {
    /// Decode an alert level byte; any other value is malformed.
    #[must_use]
    pub const fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Fatal),
            2 => Some(Self::Warning),
            _ => None,
        }
    }
}

/// A received alert message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlertIn {
    /// Epoch the alert was protected under.
    pub epoch: Epoch,
    /// Alert severity.
    pub level: AlertLevel,
    /// Protocol-defined alert description code.
    pub description: u8,
}

/// A received change-cipher-spec message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CcsIn {
    /// Epoch the message was protected under.
    pub epoch: Epoch,
}

/// Access to a received application data record.
#[derive(Debug)]
pub struct AppIn<'a> {
    /// Epoch the record was protected under.
    pub epoch: Epoch,
    /// Reader over the record content.
    pub reader: &'a mut SpliceReader,
}

/// Fragment information of a received datagram handshake message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fragment {
    /// Sequence number of the handshake message.
    pub seq_nr: u16,
    /// Offset of this fragment within the full message.
    pub offset: usize,
    /// Length of this fragment.
    pub len: usize,
}

/// Access to a received handshake message or fragment.
#[derive(Debug)]
pub struct HandshakeIn<'a> {
    /// Handshake message type byte.
    pub msg_type: u8,
    /// Total length of the handshake message body.
    pub len: usize,
    /// Epoch the message was protected under.
    pub epoch: Epoch,
    /// Fragment information on datagram transports.
    pub fragment: Option<Fragment>,
    /// Bounded reader over the message body, limited to the message length
    /// on stream transports and to the fragment length on datagram
    /// transports.
    pub reader: &'a mut BoundedReader,
}

/// Fragment parameters of an outgoing datagram handshake message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FragmentOut {
    /// Sequence number of the handshake message.
    pub seq_nr: u16,
    /// Offset of this fragment within the full message.
    pub offset: usize,
    /// Length of this fragment, or `None` to take the length of whatever
    /// gets written before dispatch.
    pub len: Option<usize>,
}

/// Parameters of an outgoing handshake message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandshakeParams {
    /// Handshake message type byte.
    pub msg_type: u8,
    /// Epoch to protect the message under.
    pub epoch: Epoch,
    /// Total length of the message body, or `None` to defer the header
    /// length field until dispatch.
    pub len: Option<usize>,
    /// Fragment parameters; required on datagram transports, ignored on
    /// stream transports.
    pub fragment: Option<FragmentOut>,
}
