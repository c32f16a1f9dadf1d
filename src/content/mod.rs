//! Record-content framing on top of an abstract record layer.
//!
//! [`MessageLayer`] parses and emits the message framing that lives inside
//! records: handshake headers, alerts, and change-cipher-spec. It owns one
//! incoming and one outgoing half, each of which serialises message
//! processing through an explicit open-channel state. Handshake messages
//! get a bounded reader or writer that carries the message bounds across
//! record boundaries, which is what enables pausing a long handshake
//! message mid-record on stream transports and backfilling a header whose
//! length is only known at dispatch time.
//!
//! The layer below is any implementation of [`RecordLayer`]; the layer
//! above is a protocol engine that reacts to the message types surfaced by
//! [`MessageLayer::read`].

pub mod error;
pub mod header;
mod incoming;
mod outgoing;
pub mod record;
mod types;

pub use error::ContentError;
pub use record::{ContentType, Epoch, RecordError, RecordIn, RecordLayer, TransportMode};
pub use types::{
    AlertIn,
    AlertLevel,
    AppIn,
    CcsIn,
    Fragment,
    FragmentOut,
    HandshakeIn,
    HandshakeParams,
};

use incoming::Incoming;
use outgoing::Outgoing;


/// Drives record-content framing over a record layer.
///
/// The incoming and outgoing halves are independent; each processes one
/// message at a time. See the module documentation for the data flow and
/// [`ContentError`] for the recovery contract.
#[derive(Debug)]
pub struct MessageLayer<L: RecordLayer> {
    records: L,
    mode: TransportMode,
    allow_interleaving: bool,
    incoming: Incoming,
    outgoing: Outgoing,
}

impl<L: RecordLayer> MessageLayer<L> {
    /// Create a message layer over `records`.
    ///
    /// Interleaving other content types into a paused handshake message is
    /// refused by default; see [`MessageLayer::allow_interleaving`].
    #[must_use]
    pub fn new(records: L, mode: TransportMode) -> Self {
        Self {
            records,
            mode,
            allow_interleaving: false,
            incoming: Incoming::new(),
            outgoing: Outgoing::new(),
        }
    }

    /// Permit dispatching other content types while an outgoing handshake
    /// message is paused.
    #[must_use]
    pub fn allow_interleaving(mut self) -> Self {
        self.allow_interleaving = true;
        self
    }

    /// Transport mode the layer was created with.
    #[must_use]
    pub const fn mode(&self) -> TransportMode { self.mode }

    /// Give the record layer back, dropping any open message state.
    #[must_use]
    pub fn into_records(self) -> L { self.records }
}
