//! Write-side buffer splicer.
//!
//! `SpliceWriter` alternates between two phases. In *providing* state the
//! provider feeds an output buffer; in *consuming* state the consumer
//! fetches write chunks, fills them, and commits. A consumer chunk that does
//! not fit the remaining output buffer is served from the overflow queue
//! instead, with the overlapping prefix copied back into the output buffer
//! at commit time so the provider always reclaims a fully contiguous
//! buffer.

use std::mem;

use log::trace;

use super::error::WriterError;

/// Outcome of feeding an output buffer to the writer.
#[derive(Debug, PartialEq, Eq)]
pub enum WriteFeed {
    /// The buffer was adopted; the writer is now consuming.
    Accepted,
    /// The buffer was completely filled with queued data and handed back.
    /// The writer stays in providing state and needs another buffer.
    Saturated(Vec<u8>),
}

/// Buffer and byte counts returned by a successful reclaim.
#[derive(Debug, PartialEq, Eq)]
pub struct Reclaimed {
    /// The output buffer handed in by the last feed. The first `written`
    /// bytes hold committed data.
    pub out: Vec<u8>,
    /// Committed bytes residing in `out`.
    pub written: usize,
    /// Committed bytes held back in the queue, to be drained into the next
    /// buffers fed to the writer.
    pub queued: usize,
}

/// Cursor into the queue while draining it in providing state.
#[derive(Clone, Copy, Debug, Default)]
struct Drain {
    /// Offset of the next queued byte to copy out.
    next: usize,
    /// Queued bytes not yet drained.
    remaining: usize,
}

/// Per-cycle bookkeeping while an output buffer is adopted.
#[derive(Debug)]
struct Cycle {
    out: Vec<u8>,
    /// Offset up to which the consumer declared its writes final.
    committed: usize,
    /// Offset of the farthest byte handed out to the consumer.
    end: usize,
    /// Once fetches spill into the queue: number of bytes that appear both
    /// at the tail of `out` and at the head of the queue. The physical copy
    /// into `out` happens at commit time.
    overlap: usize,
}

/// Splices consumer writes across provider buffers.
///
/// # Examples
///
/// ```
/// use byteloom::splice::{SpliceWriter, WriteFeed};
///
/// let mut writer = SpliceWriter::with_queue(16);
/// assert_eq!(writer.feed(vec![0; 8]).expect("feed"), WriteFeed::Accepted);
///
/// let chunk = writer.fetch(12).expect("queue absorbs the overflow");
/// chunk.copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
/// writer.commit().expect("commit");
///
/// let reclaimed = writer.reclaim(false).expect("reclaim");
/// assert_eq!(reclaimed.written, 8);
/// assert_eq!(reclaimed.queued, 4);
/// assert_eq!(&reclaimed.out[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
/// ```
#[derive(Debug)]
pub struct SpliceWriter {
    queue: Option<Vec<u8>>,
    state: State,
}

#[derive(Debug)]
enum State {
    Providing(Drain),
    Consuming(Cycle),
}

impl SpliceWriter {
    /// Create a writer without an overflow queue.
    ///
    /// Fetches larger than the remaining output buffer fail with
    /// [`WriterError::OutOfSpace`] or truncate, depending on the fetch
    /// variant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: None,
            state: State::Providing(Drain::default()),
        }
    }

    /// Create a writer with an overflow queue of `capacity` bytes.
    ///
    /// A capacity of zero behaves like [`SpliceWriter::new`].
    #[must_use]
    pub fn with_queue(capacity: usize) -> Self {
        Self {
            queue: (capacity > 0).then(|| vec![0; capacity]),
            state: State::Providing(Drain::default()),
        }
    }

    /// Whether the writer is waiting for an output buffer.
    #[must_use]
    pub const fn is_providing(&self) -> bool { matches!(self.state, State::Providing(_)) }

    /// Adopt `buf` as the current output buffer.
    ///
    /// Queued data from earlier cycles is copied into the front of `buf`
    /// first. If the queued data fills `buf` completely, the buffer is
    /// returned as [`WriteFeed::Saturated`] and the writer stays in
    /// providing state awaiting another buffer.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::NotProviding`] when an output buffer is
    /// already adopted.
    pub fn feed(&mut self, mut buf: Vec<u8>) -> Result<WriteFeed, WriterError> {
        let State::Providing(drain) = &self.state else {
            return Err(WriterError::NotProviding);
        };
        let drain = *drain;

        let mut copied = 0;
        if let Some(queue) = &self.queue
            && drain.remaining > 0
        {
            copied = drain.remaining.min(buf.len());
            buf[..copied].copy_from_slice(&queue[drain.next..drain.next + copied]);
            trace!("drained {copied} of {} queued bytes into fed buffer", drain.remaining);

            if copied < drain.remaining {
                self.state = State::Providing(Drain {
                    next: drain.next + copied,
                    remaining: drain.remaining - copied,
                });
                return Ok(WriteFeed::Saturated(buf));
            }
        }

        self.state = State::Consuming(Cycle {
            out: buf,
            committed: copied,
            end: copied,
            overlap: 0,
        });
        Ok(WriteFeed::Accepted)
    }

    /// Hand out a write chunk of exactly `desired` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::NotConsuming`] without a fed buffer and
    /// [`WriterError::OutOfSpace`] when neither the output buffer nor the
    /// queue can serve the full request.
    pub fn fetch(&mut self, desired: usize) -> Result<&mut [u8], WriterError> {
        self.fetch_inner(desired, false)
    }

    /// Hand out a write chunk of up to `desired` bytes.
    ///
    /// The returned chunk is shortened to whatever the output buffer or the
    /// queue can still serve, possibly to zero length.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::NotConsuming`] without a fed buffer.
    pub fn fetch_up_to(&mut self, desired: usize) -> Result<&mut [u8], WriterError> {
        self.fetch_inner(desired, true)
    }

    fn fetch_inner(
        &mut self,
        mut desired: usize,
        may_truncate: bool,
    ) -> Result<&mut [u8], WriterError> {
        let queue_len = self.queue.as_ref().map_or(0, Vec::len);
        let State::Consuming(cycle) = &mut self.state else {
            return Err(WriterError::NotConsuming);
        };
        let out_len = cycle.out.len();

        // Already serving from the queue.
        if cycle.end > out_len {
            let used = cycle.overlap + (cycle.end - out_len);
            let available = queue_len - used;
            if available < desired {
                if !may_truncate {
                    return Err(WriterError::OutOfSpace { desired, available });
                }
                desired = available;
            }
            cycle.end += desired;
            let queue = self.queue.as_mut().ok_or(WriterError::OutOfSpace {
                desired,
                available: 0,
            })?;
            return Ok(&mut queue[used..used + desired]);
        }

        let available = out_len - cycle.end;
        if available >= desired {
            let start = cycle.end;
            cycle.end += desired;
            return Ok(&mut cycle.out[start..start + desired]);
        }

        // The output buffer is too small. Switch to serving from the queue
        // when one is present and actually larger than the remainder.
        if queue_len > available {
            if may_truncate {
                desired = desired.min(queue_len);
            }
            let oversized = cycle.end.checked_add(desired).is_none() || desired > queue_len;
            if oversized {
                return Err(WriterError::OutOfSpace {
                    desired,
                    available: queue_len,
                });
            }

            cycle.overlap = available;
            cycle.end += desired;
            trace!("fetch spills into queue, overlap {available}");
            let queue = self.queue.as_mut().ok_or(WriterError::OutOfSpace {
                desired,
                available: 0,
            })?;
            return Ok(&mut queue[..desired]);
        }

        if !may_truncate {
            return Err(WriterError::OutOfSpace { desired, available });
        }
        let start = cycle.end;
        cycle.end = out_len;
        Ok(&mut cycle.out[start..out_len])
    }

    /// Mark all fetched bytes as final.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::NotConsuming`] without a fed buffer.
    pub fn commit(&mut self) -> Result<(), WriterError> { self.commit_partial(0) }

    /// Mark all fetched bytes except the last `omit` as final.
    ///
    /// When committed data extends past the output buffer into the queue,
    /// the overlapping queue prefix is copied into the tail of the output
    /// buffer so the buffer is contiguous up to its end.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::NotConsuming`] without a fed buffer and
    /// [`WriterError::OmitOutOfRange`] when `omit` exceeds the uncommitted
    /// tail.
    pub fn commit_partial(&mut self, omit: usize) -> Result<(), WriterError> {
        let State::Consuming(cycle) = &mut self.state else {
            return Err(WriterError::NotConsuming);
        };

        let uncommitted = cycle.end - cycle.committed;
        if omit > uncommitted {
            return Err(WriterError::OmitOutOfRange { omit, uncommitted });
        }

        let new_commit = cycle.end - omit;
        let out_len = cycle.out.len();

        if cycle.end > out_len
            && cycle.committed < out_len
            && new_commit > out_len - cycle.overlap
            && let Some(queue) = &self.queue
        {
            let copy = (new_commit - (out_len - cycle.overlap)).min(cycle.overlap);
            let tail = out_len - cycle.overlap;
            cycle.out[tail..tail + copy].copy_from_slice(&queue[..copy]);
            trace!("commit copied {copy} overlap bytes into the output buffer");
        }

        if new_commit < out_len {
            cycle.overlap = 0;
        }
        cycle.end = new_commit;
        cycle.committed = new_commit;
        Ok(())
    }

    /// Overwrite part of the already-fetched region.
    ///
    /// `offset` is a logical offset from the start of the current cycle.
    /// The addressed bytes may live in the output buffer, in the queue, or
    /// straddle the switchover point; the patch is routed accordingly. Used
    /// to backfill headers whose length field is only known after the body
    /// has been written.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::NotConsuming`] without a fed buffer and
    /// [`WriterError::PatchOutOfRange`] when the region extends past the
    /// fetched bytes.
    pub fn patch(&mut self, offset: usize, data: &[u8]) -> Result<(), WriterError> {
        let State::Consuming(cycle) = &mut self.state else {
            return Err(WriterError::NotConsuming);
        };

        if offset.checked_add(data.len()).is_none_or(|end| end > cycle.end) {
            return Err(WriterError::PatchOutOfRange {
                offset,
                len: data.len(),
                fetched: cycle.end,
            });
        }

        let out_len = cycle.out.len();
        // Logical offsets below `split` live in the output buffer, offsets
        // at or above it map to the front of the queue.
        let split = if cycle.end > out_len {
            out_len - cycle.overlap
        } else {
            out_len
        };

        let in_out = data.len().min(split.saturating_sub(offset));
        if in_out > 0 {
            cycle.out[offset..offset + in_out].copy_from_slice(&data[..in_out]);
        }
        if in_out < data.len() {
            let queue = self.queue.as_mut().ok_or(WriterError::PatchOutOfRange {
                offset,
                len: data.len(),
                fetched: cycle.end,
            })?;
            let start = offset + in_out - split;
            queue[start..start + data.len() - in_out].copy_from_slice(&data[in_out..]);
        }
        Ok(())
    }

    /// Take the output buffer back from the writer.
    ///
    /// Uncommitted fetched bytes are dropped. Committed bytes beyond the
    /// output buffer remain queued and are reported in
    /// [`Reclaimed::queued`]; they drain into the next fed buffers.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::NotConsuming`] without a fed buffer. When the
    /// buffer is not fully committed and `force` is false, returns
    /// [`WriterError::SpaceLeft`] and stays in consuming state so the
    /// consumer can keep writing.
    pub fn reclaim(&mut self, force: bool) -> Result<Reclaimed, WriterError> {
        let State::Consuming(cycle) = &mut self.state else {
            return Err(WriterError::NotConsuming);
        };

        let committed = cycle.committed;
        let out_len = cycle.out.len();

        if committed <= out_len {
            cycle.overlap = 0;
            if committed < out_len && !force {
                cycle.end = committed;
                return Err(WriterError::SpaceLeft {
                    unused: out_len - committed,
                });
            }

            let out = mem::take(&mut cycle.out);
            self.state = State::Providing(Drain::default());
            trace!("reclaimed buffer, {committed} bytes written");
            Ok(Reclaimed {
                out,
                written: committed,
                queued: 0,
            })
        } else {
            let queued = committed - out_len;
            let next = cycle.overlap;
            let out = mem::take(&mut cycle.out);
            self.state = State::Providing(Drain {
                next,
                remaining: queued,
            });
            trace!("reclaimed buffer, {out_len} bytes written, {queued} queued");
            Ok(Reclaimed {
                out,
                written: out_len,
                queued,
            })
        }
    }

    /// Committed bytes of the current cycle.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::NotConsuming`] without a fed buffer.
    pub fn committed(&self) -> Result<usize, WriterError> {
        match &self.state {
            State::Consuming(cycle) => Ok(cycle.committed),
            State::Providing(_) => Err(WriterError::NotConsuming),
        }
    }

    /// Bytes handed out to the consumer in the current cycle, or zero while
    /// providing. The next fetch starts at this logical offset.
    #[must_use]
    pub const fn fetched(&self) -> usize {
        match &self.state {
            State::Consuming(cycle) => cycle.end,
            State::Providing(_) => 0,
        }
    }

    /// Committed bytes still waiting in the queue for a buffer to drain
    /// into.
    #[must_use]
    pub const fn queued_remaining(&self) -> usize {
        match &self.state {
            State::Providing(drain) => drain.remaining,
            State::Consuming(_) => 0,
        }
    }
}

impl Default for SpliceWriter {
    fn default() -> Self { Self::new() }
}
