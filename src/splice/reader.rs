//! Read-side buffer splicer.
//!
//! `SpliceReader` serves contiguous read chunks out of provider fragments.
//! When an exact-size fetch cannot be satisfied because the fragment ends
//! mid-request, the reader remembers the shortfall; at reclaim time the
//! unconsumed fragment tail is backed up into the accumulator, and the next
//! fragments are gathered there until the original request can be served
//! contiguously. This is what lets a message parser simply retry the same
//! fetch after the next fragment arrives.

use std::mem;

use log::trace;

use super::error::ReaderError;

/// Outcome of feeding a fragment to the reader.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadFeed {
    /// The fragment was adopted; the reader is now consuming.
    Ready,
    /// The fragment was absorbed into the accumulator and handed back; the
    /// pending request still needs more data from the next fragment.
    Buffered(Vec<u8>),
}

/// Fragment and pause flag returned by a successful reclaim.
#[derive(Debug, PartialEq, Eq)]
pub struct ReclaimedFrag {
    /// The fragment handed in by the last feed.
    pub frag: Vec<u8>,
    /// Whether unserved data was backed up into the accumulator; the reader
    /// expects the logical continuation in the next fragment.
    pub paused: bool,
}

/// Per-cycle bookkeeping while a fragment is adopted.
#[derive(Debug)]
struct Cycle {
    frag: Vec<u8>,
    /// Logical offset of the fragment behind accumulated data, when an
    /// accumulator is in play.
    frag_offset: usize,
    /// Offset up to which the consumer declared its reads final.
    committed: usize,
    /// Offset of the farthest byte handed out to the consumer.
    end: usize,
    /// Shortfall of the last failed exact fetch, to be satisfied after the
    /// next feed.
    pending: usize,
}

/// Splices consumer reads across provider fragments.
///
/// # Examples
///
/// ```
/// use byteloom::splice::{ReadFeed, SpliceReader};
///
/// let mut reader = SpliceReader::with_accumulator(8);
/// assert_eq!(reader.feed(vec![0xAA]).expect("feed"), ReadFeed::Ready);
///
/// // A 2-byte request cannot be served by the 1-byte fragment.
/// assert!(reader.fetch(2).is_err());
/// let reclaimed = reader.reclaim().expect("reclaim");
/// assert!(reclaimed.paused);
///
/// // The next fragment completes the request.
/// assert_eq!(reader.feed(vec![0xBB]).expect("feed"), ReadFeed::Ready);
/// assert_eq!(reader.fetch(2).expect("fetch"), &[0xAA, 0xBB]);
/// ```
#[derive(Debug)]
pub struct SpliceReader {
    acc: Option<Vec<u8>>,
    /// Bytes of the accumulator holding gathered data.
    acc_avail: usize,
    state: State,
}

#[derive(Debug)]
enum State {
    /// Waiting for a fragment; `acc_remaining` bytes are still missing
    /// before the pending request can be served.
    Producing { acc_remaining: usize },
    Consuming(Cycle),
}

impl SpliceReader {
    /// Create a reader without an accumulator.
    ///
    /// Requests crossing a fragment boundary fail with
    /// [`ReaderError::NeedAccumulator`] at reclaim time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            acc: None,
            acc_avail: 0,
            state: State::Producing { acc_remaining: 0 },
        }
    }

    /// Create a reader with an accumulator of `capacity` bytes.
    ///
    /// The capacity bounds how much unconsumed fragment data plus request
    /// shortfall can be carried across a fragment boundary.
    #[must_use]
    pub fn with_accumulator(capacity: usize) -> Self {
        Self {
            acc: (capacity > 0).then(|| vec![0; capacity]),
            acc_avail: 0,
            state: State::Producing { acc_remaining: 0 },
        }
    }

    /// Whether the reader is waiting for a fragment.
    #[must_use]
    pub const fn is_producing(&self) -> bool { matches!(self.state, State::Producing { .. }) }

    /// Adopt `frag` as the current fragment.
    ///
    /// When a prior reclaim left a pending request, the fragment is first
    /// copied into the accumulator. If it still does not complete the
    /// pending request it is handed back as [`ReadFeed::Buffered`] and the
    /// reader keeps waiting.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::NotProducing`] when a fragment is already
    /// adopted.
    pub fn feed(&mut self, frag: Vec<u8>) -> Result<ReadFeed, ReaderError> {
        let State::Producing { acc_remaining } = &self.state else {
            return Err(ReaderError::NotProducing);
        };
        let acc_remaining = *acc_remaining;

        let mut frag_offset = 0;
        if let Some(acc) = self.acc.as_mut() {
            let gathered = self.acc_avail;
            let copy = acc_remaining.min(frag.len());
            acc[gathered..gathered + copy].copy_from_slice(&frag[..copy]);
            trace!("gathered {copy} fragment bytes into accumulator at offset {gathered}");

            if acc_remaining > copy {
                self.acc_avail = gathered + copy;
                self.state = State::Producing {
                    acc_remaining: acc_remaining - copy,
                };
                return Ok(ReadFeed::Buffered(frag));
            }

            frag_offset = gathered;
            self.acc_avail = gathered + copy;
        }

        self.state = State::Consuming(Cycle {
            frag,
            frag_offset,
            committed: 0,
            end: 0,
            pending: 0,
        });
        Ok(ReadFeed::Ready)
    }

    /// Hand out a read chunk of exactly `desired` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::NotConsuming`] without a fed fragment,
    /// [`ReaderError::OutOfData`] when the fragment ends before `desired`
    /// bytes (the shortfall is remembered for the next fragment), and
    /// [`ReaderError::InconsistentRequest`] when a fetch after resuming
    /// does not line up with the data gathered in the accumulator.
    pub fn fetch(&mut self, desired: usize) -> Result<&[u8], ReaderError> {
        self.fetch_inner(desired, false)
    }

    /// Hand out a read chunk of up to `desired` bytes.
    ///
    /// The returned chunk is shortened to what the fragment can still
    /// serve, possibly to zero length.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::NotConsuming`] without a fed fragment and
    /// [`ReaderError::InconsistentRequest`] as for [`SpliceReader::fetch`].
    pub fn fetch_up_to(&mut self, desired: usize) -> Result<&[u8], ReaderError> {
        self.fetch_inner(desired, true)
    }

    fn fetch_inner(&mut self, mut desired: usize, may_truncate: bool) -> Result<&[u8], ReaderError> {
        let acc_avail = self.acc_avail;
        let State::Consuming(cycle) = &mut self.state else {
            return Err(ReaderError::NotConsuming);
        };

        let frag_offset = if self.acc.is_some() { cycle.frag_offset } else { 0 };
        let end = cycle.end;

        // Still serving gathered data from the accumulator.
        if end < frag_offset {
            if frag_offset - end < desired && acc_avail - end != desired {
                // A request reaching past the gathered data can only be
                // served when it replays the exact pre-pause fetch, which
                // ends at the accumulator boundary.
                return Err(ReaderError::InconsistentRequest {
                    desired,
                    expected: acc_avail - end,
                });
            }
            let acc = self.acc.as_ref().ok_or(ReaderError::NotConsuming)?;
            cycle.end = end + desired;
            cycle.pending = 0;
            return Ok(&acc[end..end + desired]);
        }

        let frag_fetched = end - frag_offset;
        let frag_remaining = cycle.frag.len() - frag_fetched;
        if frag_remaining < desired {
            if !may_truncate {
                if frag_remaining > 0 {
                    cycle.pending = desired - frag_remaining;
                    trace!("fetch short by {} bytes, remembering shortfall", cycle.pending);
                }
                return Err(ReaderError::OutOfData {
                    desired,
                    available: frag_remaining,
                });
            }
            desired = frag_remaining;
        }

        cycle.end = end + desired;
        cycle.pending = 0;
        Ok(&cycle.frag[frag_fetched..frag_fetched + desired])
    }

    /// Mark all fetched bytes as final.
    ///
    /// Committed accumulator data is discarded; once reads have progressed
    /// into the fragment the accumulator is dropped entirely.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::NotConsuming`] without a fed fragment.
    pub fn commit(&mut self) -> Result<(), ReaderError> {
        let State::Consuming(cycle) = &mut self.state else {
            return Err(ReaderError::NotConsuming);
        };

        let end = cycle.end;
        let Some(acc) = self.acc.as_mut() else {
            cycle.committed = end;
            return Ok(());
        };

        let frag_offset = cycle.frag_offset;
        if end >= frag_offset {
            // Reads progressed into the fragment; the gathered prefix has
            // been fully consumed.
            self.acc_avail = 0;
            cycle.frag_offset = 0;
            cycle.committed = end - frag_offset;
            cycle.end = end - frag_offset;
        } else {
            acc.copy_within(end..self.acc_avail, 0);
            self.acc_avail -= end;
            cycle.frag_offset = frag_offset - end;
            cycle.committed = 0;
            cycle.end = 0;
        }
        Ok(())
    }

    /// Take the fragment back from the reader.
    ///
    /// When the last exact fetch fell short, the unconsumed fragment tail
    /// is backed up into the accumulator and [`ReclaimedFrag::paused`] is
    /// set; the reader then expects the logical continuation in the next
    /// fed fragment.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::NotConsuming`] without a fed fragment,
    /// [`ReaderError::DataLeft`] when committed reads have not exhausted the
    /// fragment, [`ReaderError::NeedAccumulator`] when a backup is needed
    /// but no accumulator is configured, and
    /// [`ReaderError::AccumulatorTooSmall`] when the backup does not fit.
    pub fn reclaim(&mut self) -> Result<ReclaimedFrag, ReaderError> {
        let State::Consuming(cycle) = &mut self.state else {
            return Err(ReaderError::NotConsuming);
        };

        let pending = cycle.pending;
        let committed = cycle.committed;
        let frag_len = cycle.frag.len();
        let frag_offset = if self.acc.is_some() { cycle.frag_offset } else { 0 };

        if pending == 0 {
            if committed < frag_offset || committed - frag_offset < frag_len {
                cycle.end = committed;
                return Err(ReaderError::DataLeft);
            }

            let frag = mem::take(&mut cycle.frag);
            self.state = State::Producing { acc_remaining: 0 };
            return Ok(ReclaimedFrag { frag, paused: false });
        }

        let Some(acc) = self.acc.as_mut() else {
            return Err(ReaderError::NeedAccumulator);
        };
        let capacity = acc.len();

        let (backup_offset, backup_len) = if committed < frag_offset {
            // The gathered accumulator data is still being consumed; the
            // whole fragment must be preserved behind it.
            let needed = frag_offset + frag_len + pending;
            if capacity < needed {
                cycle.end = committed;
                cycle.pending = 0;
                return Err(ReaderError::AccumulatorTooSmall { capacity, needed });
            }
            (0, frag_len)
        } else {
            let backup_len = frag_len - committed;
            let needed = frag_offset + backup_len + pending;
            if capacity < needed {
                cycle.end = committed;
                cycle.pending = 0;
                return Err(ReaderError::AccumulatorTooSmall { capacity, needed });
            }
            (committed, backup_len)
        };

        acc[frag_offset..frag_offset + backup_len]
            .copy_from_slice(&cycle.frag[backup_offset..backup_offset + backup_len]);
        trace!("backed up {backup_len} fragment bytes, {pending} more pending");
        self.acc_avail = frag_offset + backup_len;

        let frag = mem::take(&mut cycle.frag);
        self.state = State::Producing {
            acc_remaining: pending,
        };
        Ok(ReclaimedFrag { frag, paused: true })
    }
}

impl Default for SpliceReader {
    fn default() -> Self { Self::new() }
}
