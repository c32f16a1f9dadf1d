//! Shared utilities for integration tests.
//!
//! Provides an in-memory [`RecordLayer`] with configurable record size,
//! writer overflow queue, and reader accumulator. Outgoing records merge
//! consecutive same-type messages into one record and split overflowing
//! messages across records, which is what exercises the splicing paths of
//! the layers under test. Incoming records are scripted byte vectors.

use std::collections::VecDeque;

use byteloom::content::{ContentType, Epoch, RecordError, RecordIn, RecordLayer};
use byteloom::splice::{ReadFeed, SpliceReader, SpliceWriter, WriteFeed};

/// A record captured on the outgoing side, as it would go on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutRecord {
    pub content_type: ContentType,
    pub epoch: Epoch,
    pub payload: Vec<u8>,
}

/// In-memory record layer backed by fixed-size record buffers.
#[derive(Debug)]
pub struct MemoryRecordLayer {
    record_size: usize,
    writer: Option<SpliceWriter>,
    reader: Option<SpliceReader>,
    /// Content type and epoch of the record the writer currently has open.
    open_out: Option<(ContentType, Epoch)>,
    /// Records flushed to the "wire".
    pub flushed: Vec<OutRecord>,
    /// Scripted incoming records.
    pub inbound: VecDeque<OutRecord>,
    /// Number of flush calls observed.
    pub flush_calls: usize,
}

impl MemoryRecordLayer {
    /// Create a layer with `record_size`-byte records, a writer queue and a
    /// reader accumulator of the given capacities (zero disables them).
    #[must_use]
    pub fn new(record_size: usize, queue_capacity: usize, accumulator_capacity: usize) -> Self {
        Self {
            record_size,
            writer: Some(SpliceWriter::with_queue(queue_capacity)),
            reader: Some(SpliceReader::with_accumulator(accumulator_capacity)),
            open_out: None,
            flushed: Vec::new(),
            inbound: VecDeque::new(),
            flush_calls: 0,
        }
    }

    /// Queue an incoming record.
    pub fn push_inbound(&mut self, content_type: ContentType, epoch: Epoch, payload: Vec<u8>) {
        self.inbound.push_back(OutRecord {
            content_type,
            epoch,
            payload,
        });
    }

    /// Concatenated payloads of all flushed records of one content type.
    #[must_use]
    pub fn flushed_payload(&self, content_type: ContentType) -> Vec<u8> {
        self.flushed
            .iter()
            .filter(|record| record.content_type == content_type)
            .flat_map(|record| record.payload.iter().copied())
            .collect()
    }

    /// Close the open outgoing record: reclaim the buffer, capture the
    /// written bytes, and drain any queued spill into follow-up records.
    fn close_out_record(&mut self) -> Result<(), RecordError> {
        let Some((content_type, epoch)) = self.open_out.take() else {
            return Ok(());
        };
        let writer = self.writer.as_mut().ok_or(RecordError::Rejected(
            "writer is checked out during close",
        ))?;

        let reclaimed = writer.reclaim(true)?;
        if reclaimed.written > 0 {
            self.flushed.push(OutRecord {
                content_type,
                epoch,
                payload: reclaimed.out[..reclaimed.written].to_vec(),
            });
        }
        let mut queued = reclaimed.queued;

        // Queued spill belongs to the record type that overflowed.
        while queued > 0 {
            match writer.feed(vec![0; self.record_size])? {
                WriteFeed::Saturated(full) => {
                    queued -= full.len();
                    self.flushed.push(OutRecord {
                        content_type,
                        epoch,
                        payload: full,
                    });
                }
                WriteFeed::Accepted => {
                    let drained = writer.reclaim(true)?;
                    queued -= drained.written;
                    self.flushed.push(OutRecord {
                        content_type,
                        epoch,
                        payload: drained.out[..drained.written].to_vec(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl RecordLayer for MemoryRecordLayer {
    fn read_start(&mut self) -> Result<RecordIn, RecordError> {
        let mut reader = self
            .reader
            .take()
            .ok_or(RecordError::Rejected("reader already checked out"))?;

        loop {
            let Some(record) = self.inbound.pop_front() else {
                self.reader = Some(reader);
                return Err(RecordError::WantRead);
            };
            let content_type = record.content_type;
            let epoch = record.epoch;
            match reader.feed(record.payload) {
                Ok(ReadFeed::Ready) => {
                    return Ok(RecordIn {
                        content_type,
                        epoch,
                        reader,
                    });
                }
                // The whole record went into the accumulator; continue with
                // the next one.
                Ok(ReadFeed::Buffered(_)) => {}
                Err(err) => {
                    self.reader = Some(reader);
                    return Err(err.into());
                }
            }
        }
    }

    fn read_done(&mut self, mut reader: SpliceReader) -> Result<(), RecordError> {
        let result = reader.reclaim();
        self.reader = Some(reader);
        result?;
        Ok(())
    }

    fn write_start(
        &mut self,
        content_type: ContentType,
        epoch: Epoch,
    ) -> Result<SpliceWriter, RecordError> {
        // Records are bound to one content type and epoch; close the open
        // record when they change or when it has no room left.
        if self
            .open_out
            .is_some_and(|open| open != (content_type, epoch))
        {
            self.close_out_record()?;
        }
        if self.open_out.is_some()
            && let Some(writer) = &self.writer
            && writer.committed().unwrap_or(0) >= self.record_size
        {
            self.close_out_record()?;
        }

        let mut writer = self
            .writer
            .take()
            .ok_or(RecordError::Rejected("writer already checked out"))?;

        if self.open_out.is_none() {
            match writer.feed(vec![0; self.record_size]) {
                Ok(WriteFeed::Accepted) => {}
                Ok(WriteFeed::Saturated(_)) => {
                    self.writer = Some(writer);
                    return Err(RecordError::Rejected(
                        "queued data exceeds a whole record at open",
                    ));
                }
                Err(err) => {
                    self.writer = Some(writer);
                    return Err(err.into());
                }
            }
            self.open_out = Some((content_type, epoch));
        }

        Ok(writer)
    }

    fn write_done(&mut self, writer: SpliceWriter) -> Result<(), RecordError> {
        // The record stays open so consecutive same-type messages coalesce;
        // it is sealed by the next type switch or flush.
        self.writer = Some(writer);
        Ok(())
    }

    fn write_flush(&mut self) -> Result<(), RecordError> {
        self.close_out_record()?;
        self.flush_calls += 1;
        Ok(())
    }
}
