//! Bounded read-side accounting.

use log::trace;

use super::{MAX_GROUPS, error::BoundsError};
use crate::splice::SpliceReader;

/// Imposes a hierarchical size-bounded view over a [`SpliceReader`].
///
/// Unlike the write side there is no commit policy: reader commits always
/// forward to the splice reader. The bounded reader's job is to carry the
/// message-global fetch and commit offsets across record boundaries while
/// the splice reader is detached and reattached.
///
/// # Examples
///
/// ```
/// use byteloom::bounded::BoundedReader;
/// use byteloom::splice::SpliceReader;
///
/// let mut reader = SpliceReader::new();
/// reader.feed(vec![1, 2, 3, 4]).expect("feed");
///
/// let mut bounded = BoundedReader::new(4);
/// bounded.attach(reader).expect("attach");
/// assert_eq!(bounded.fetch(4).expect("fetch"), &[1, 2, 3, 4]);
/// bounded.commit().expect("commit");
/// assert!(bounded.check_done().is_ok());
/// ```
#[derive(Debug)]
pub struct BoundedReader {
    reader: Option<SpliceReader>,
    grp_end: [usize; MAX_GROUPS],
    cur_grp: usize,
    ofs_fetch: usize,
    ofs_commit: usize,
}

impl BoundedReader {
    /// Create a bounded reader whose root group spans `bound` logical
    /// bytes.
    #[must_use]
    pub fn new(bound: usize) -> Self {
        let mut grp_end = [0; MAX_GROUPS];
        grp_end[0] = bound;
        Self {
            reader: None,
            grp_end,
            cur_grp: 0,
            ofs_fetch: 0,
            ofs_commit: 0,
        }
    }

    /// Bind a splice reader.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::AlreadyAttached`] when a reader is attached.
    pub fn attach(&mut self, reader: SpliceReader) -> Result<(), BoundsError> {
        if self.reader.is_some() {
            return Err(BoundsError::AlreadyAttached);
        }
        self.reader = Some(reader);
        Ok(())
    }

    /// Unbind the splice reader.
    ///
    /// Uncommitted logical bytes are dropped from the accounting so a
    /// reattached reader resumes at the committed offset.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::NotAttached`] without an attached reader.
    pub fn detach(&mut self) -> Result<SpliceReader, BoundsError> {
        let reader = self.reader.take().ok_or(BoundsError::NotAttached)?;
        trace!("detached reader at commit offset {}", self.ofs_commit);
        self.ofs_fetch = self.ofs_commit;
        Ok(reader)
    }

    /// Hand out a read chunk of exactly `desired` bytes, checked against
    /// the innermost group bound.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::NotAttached`] without an attached reader,
    /// [`BoundsError::BoundsViolation`] when the chunk would cross the
    /// group bound, and forwards splice reader errors; in particular
    /// [`crate::splice::ReaderError::OutOfData`] signals that the current
    /// record is exhausted.
    pub fn fetch(&mut self, desired: usize) -> Result<&[u8], BoundsError> {
        let available = self.grp_end[self.cur_grp] - self.ofs_fetch;
        if desired > available {
            return Err(BoundsError::BoundsViolation {
                requested: desired,
                available,
            });
        }
        let reader = self.reader.as_mut().ok_or(BoundsError::NotAttached)?;
        let chunk = reader.fetch(desired)?;
        self.ofs_fetch += desired;
        Ok(chunk)
    }

    /// Hand out a read chunk of up to `desired` bytes.
    ///
    /// The request is clipped to the group bound before delegating, and the
    /// splice reader may shorten it further.
    ///
    /// # Errors
    ///
    /// As for [`BoundedReader::fetch`], minus the bounds check.
    pub fn fetch_up_to(&mut self, desired: usize) -> Result<&[u8], BoundsError> {
        let available = self.grp_end[self.cur_grp] - self.ofs_fetch;
        let reader = self.reader.as_mut().ok_or(BoundsError::NotAttached)?;
        let chunk = reader.fetch_up_to(desired.min(available))?;
        let served = chunk.len();
        self.ofs_fetch += served;
        Ok(chunk)
    }

    /// Mark all fetched logical bytes as final.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::NotAttached`] without an attached reader and
    /// forwards splice reader errors.
    pub fn commit(&mut self) -> Result<(), BoundsError> {
        let reader = self.reader.as_mut().ok_or(BoundsError::NotAttached)?;
        reader.commit()?;
        self.ofs_commit = self.ofs_fetch;
        Ok(())
    }

    /// Open a nested group of `size` logical bytes.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::TooManyGroups`] at the nesting limit and
    /// [`BoundsError::BoundsViolation`] when the group would exceed the
    /// enclosing one.
    pub fn group_open(&mut self, size: usize) -> Result<(), BoundsError> {
        if self.cur_grp >= MAX_GROUPS - 1 {
            return Err(BoundsError::TooManyGroups { max: MAX_GROUPS });
        }
        let available = self.grp_end[self.cur_grp] - self.ofs_fetch;
        if size > available {
            return Err(BoundsError::BoundsViolation {
                requested: size,
                available,
            });
        }
        self.cur_grp += 1;
        self.grp_end[self.cur_grp] = self.ofs_fetch + size;
        Ok(())
    }

    /// Close the innermost group.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::GroupNotExhausted`] when fetches have not
    /// reached the group bound.
    pub fn group_close(&mut self) -> Result<(), BoundsError> {
        let remaining = self.grp_end[self.cur_grp] - self.ofs_fetch;
        if remaining != 0 {
            return Err(BoundsError::GroupNotExhausted { remaining });
        }
        self.cur_grp = self.cur_grp.saturating_sub(1);
        Ok(())
    }

    /// Check that the message is complete: all groups closed and the full
    /// root size committed.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::GroupNotExhausted`] otherwise.
    pub fn check_done(&self) -> Result<(), BoundsError> {
        if self.cur_grp > 0 {
            return Err(BoundsError::GroupNotExhausted {
                remaining: self.grp_end[self.cur_grp] - self.ofs_fetch,
            });
        }
        if self.ofs_commit != self.grp_end[0] {
            return Err(BoundsError::GroupNotExhausted {
                remaining: self.grp_end[0] - self.ofs_commit,
            });
        }
        Ok(())
    }

    /// Logical bytes committed so far.
    #[must_use]
    pub const fn committed(&self) -> usize { self.ofs_commit }

    /// Logical bytes handed out so far.
    #[must_use]
    pub const fn fetched(&self) -> usize { self.ofs_fetch }
}
