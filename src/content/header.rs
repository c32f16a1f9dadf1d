//! Wire formats of record-content headers.
//!
//! All multi-byte fields are network byte order. Handshake headers:
//!
//! ```text
//! stream:    type:u8 @0 | length:u24 @1
//! datagram:  type:u8 @0 | length:u24 @1 | seq:u16 @4 | frag_off:u24 @7 |
//!            frag_len:u24 @10
//! ```
//!
//! The datagram header is 13 bytes; byte 6 is reserved and zero. An alert
//! is `level:u8 | description:u8`; a change-cipher-spec message is the
//! single byte `0x01`.

use crate::byte_order::{read_network_u16, read_network_u24, write_network_u16, write_network_u24};

/// Handshake header length on a stream transport.
pub const STREAM_HANDSHAKE_HEADER_LEN: usize = 4;
/// Handshake header length on a datagram transport.
pub const DATAGRAM_HANDSHAKE_HEADER_LEN: usize = 13;
/// Length of an alert message.
pub const ALERT_LEN: usize = 2;
/// Length of a change-cipher-spec message.
pub const CCS_LEN: usize = 1;
/// The only valid change-cipher-spec payload byte.
pub const CCS_VALUE: u8 = 1;

/// Parsed handshake header fields, with datagram fragment information when
/// present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct ParsedHandshakeHeader {
    pub(super) msg_type: u8,
    pub(super) len: usize,
    pub(super) seq_nr: u16,
    pub(super) frag_offset: usize,
    pub(super) frag_len: usize,
}

/// Parse a stream handshake header from its four wire bytes.
pub(super) fn parse_stream_handshake_header(buf: &[u8]) -> ParsedHandshakeHeader {
    let len = read_network_u24([buf[1], buf[2], buf[3]]) as usize;
    ParsedHandshakeHeader {
        msg_type: buf[0],
        len,
        seq_nr: 0,
        frag_offset: 0,
        frag_len: len,
    }
}

/// Parse a datagram handshake header from its thirteen wire bytes.
///
/// Fragment consistency (`frag_offset + frag_len <= len`) is checked by the
/// caller, which owns the error mapping.
pub(super) fn parse_datagram_handshake_header(buf: &[u8]) -> ParsedHandshakeHeader {
    ParsedHandshakeHeader {
        msg_type: buf[0],
        len: read_network_u24([buf[1], buf[2], buf[3]]) as usize,
        seq_nr: read_network_u16([buf[4], buf[5]]),
        frag_offset: read_network_u24([buf[7], buf[8], buf[9]]) as usize,
        frag_len: read_network_u24([buf[10], buf[11], buf[12]]) as usize,
    }
}

/// Encode a stream handshake header into `dst`.
pub(super) fn encode_stream_handshake_header(msg_type: u8, len: u32, dst: &mut [u8]) {
    dst[0] = msg_type;
    dst[1..4].copy_from_slice(&write_network_u24(len));
}

/// Encode a datagram handshake header into `dst`.
pub(super) fn encode_datagram_handshake_header(
    msg_type: u8,
    len: u32,
    seq_nr: u16,
    frag_offset: u32,
    frag_len: u32,
    dst: &mut [u8],
) {
    dst[0] = msg_type;
    dst[1..4].copy_from_slice(&write_network_u24(len));
    dst[4..6].copy_from_slice(&write_network_u16(seq_nr));
    dst[6] = 0;
    dst[7..10].copy_from_slice(&write_network_u24(frag_offset));
    dst[10..13].copy_from_slice(&write_network_u24(frag_len));
}
