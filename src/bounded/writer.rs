//! Bounded write-side accounting.

use log::trace;

use super::{MAX_GROUPS, error::BoundsError};
use crate::splice::SpliceWriter;

/// Bound marking a group as open-ended.
const UNBOUNDED: usize = usize::MAX;

/// Commit propagation policy of an attached writer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Passthrough {
    /// Commits are forwarded to the splice writer immediately.
    Pass,
    /// Commits are only accounted; the caller commits the splice writer
    /// after detaching, typically once a deferred header has been filled in.
    Hold,
    /// A partial commit was requested while holding. Further fetches and
    /// commits are refused until the writer is detached.
    Blocked,
}

/// Splice writer and byte counts returned by a detach.
#[derive(Debug)]
pub struct Detached {
    /// The splice writer that was attached.
    pub writer: SpliceWriter,
    /// Logical bytes committed through the bounded writer.
    pub committed: usize,
    /// Logical bytes fetched but never committed. After a detach these are
    /// dropped from the logical accounting; the caller decides whether to
    /// commit or omit them on the splice writer.
    pub uncommitted: usize,
}

/// Imposes a hierarchical size-bounded view over a [`SpliceWriter`].
///
/// # Examples
///
/// ```
/// use byteloom::bounded::{BoundedWriter, Passthrough};
/// use byteloom::splice::SpliceWriter;
///
/// let mut writer = SpliceWriter::new();
/// writer.feed(vec![0; 32]).expect("feed");
///
/// let mut bounded = BoundedWriter::new(Some(10));
/// bounded.attach(writer, Passthrough::Pass).expect("attach");
///
/// bounded.fetch(10).expect("within bounds");
/// bounded.commit().expect("commit");
/// assert!(bounded.check_done().is_ok());
/// ```
#[derive(Debug)]
pub struct BoundedWriter {
    writer: Option<SpliceWriter>,
    /// Stack of logical end offsets, weakly descending from the root bound.
    grp_end: [usize; MAX_GROUPS],
    cur_grp: usize,
    ofs_fetch: usize,
    ofs_commit: usize,
    passthrough: Passthrough,
}

impl BoundedWriter {
    /// Create a bounded writer whose root group spans `bound` logical
    /// bytes, or is open-ended when `bound` is `None`.
    #[must_use]
    pub fn new(bound: Option<usize>) -> Self {
        let mut grp_end = [0; MAX_GROUPS];
        grp_end[0] = bound.unwrap_or(UNBOUNDED);
        Self {
            writer: None,
            grp_end,
            cur_grp: 0,
            ofs_fetch: 0,
            ofs_commit: 0,
            passthrough: Passthrough::Pass,
        }
    }

    /// Bind a splice writer with the given commit policy.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::AlreadyAttached`] when a writer is attached.
    pub fn attach(&mut self, writer: SpliceWriter, mode: Passthrough) -> Result<(), BoundsError> {
        if self.writer.is_some() {
            return Err(BoundsError::AlreadyAttached);
        }
        self.passthrough = mode;
        self.writer = Some(writer);
        Ok(())
    }

    /// Unbind the splice writer, reporting the logical commit accounting.
    ///
    /// Uncommitted logical bytes are dropped from the accounting so a
    /// reattached writer resumes at the committed offset.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::NotAttached`] without an attached writer.
    pub fn detach(&mut self) -> Result<Detached, BoundsError> {
        let writer = self.writer.take().ok_or(BoundsError::NotAttached)?;
        let committed = self.ofs_commit;
        let uncommitted = self.ofs_fetch - self.ofs_commit;
        self.ofs_fetch = self.ofs_commit;
        trace!("detached writer, {committed} committed, {uncommitted} uncommitted");
        Ok(Detached {
            writer,
            committed,
            uncommitted,
        })
    }

    /// Hand out a write chunk of exactly `desired` bytes, checked against
    /// the innermost group bound.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::NotAttached`] or [`BoundsError::Blocked`] in
    /// those states, [`BoundsError::BoundsViolation`] when the chunk would
    /// cross the group bound, and forwards splice writer errors.
    pub fn fetch(&mut self, desired: usize) -> Result<&mut [u8], BoundsError> {
        self.ensure_usable()?;
        let available = self.grp_end[self.cur_grp] - self.ofs_fetch;
        if desired > available {
            return Err(BoundsError::BoundsViolation {
                requested: desired,
                available,
            });
        }
        let writer = self.writer.as_mut().ok_or(BoundsError::NotAttached)?;
        let chunk = writer.fetch(desired)?;
        self.ofs_fetch += desired;
        Ok(chunk)
    }

    /// Hand out a write chunk of up to `desired` bytes.
    ///
    /// The request is clipped to the group bound before delegating, and the
    /// splice writer may shorten it further.
    ///
    /// # Errors
    ///
    /// As for [`BoundedWriter::fetch`], minus the bounds check.
    pub fn fetch_up_to(&mut self, desired: usize) -> Result<&mut [u8], BoundsError> {
        self.ensure_usable()?;
        let available = self.grp_end[self.cur_grp] - self.ofs_fetch;
        let writer = self.writer.as_mut().ok_or(BoundsError::NotAttached)?;
        let chunk = writer.fetch_up_to(desired.min(available))?;
        let served = chunk.len();
        self.ofs_fetch += served;
        Ok(chunk)
    }

    /// Mark all fetched logical bytes as final.
    ///
    /// # Errors
    ///
    /// As for [`BoundedWriter::commit_partial`].
    pub fn commit(&mut self) -> Result<(), BoundsError> { self.commit_partial(0) }

    /// Mark all fetched logical bytes except the last `omit` as final.
    ///
    /// With [`Passthrough::Pass`] the commit is forwarded to the splice
    /// writer. With [`Passthrough::Hold`] it is only accounted; a partial
    /// hold commit latches the writer into [`Passthrough::Blocked`].
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::NotAttached`] or [`BoundsError::Blocked`] in
    /// those states and [`BoundsError::BoundsViolation`] when `omit`
    /// exceeds the uncommitted logical bytes.
    pub fn commit_partial(&mut self, omit: usize) -> Result<(), BoundsError> {
        self.ensure_usable()?;

        let uncommitted = self.ofs_fetch - self.ofs_commit;
        if omit > uncommitted {
            return Err(BoundsError::BoundsViolation {
                requested: omit,
                available: uncommitted,
            });
        }
        let new_commit = self.ofs_fetch - omit;

        match self.passthrough {
            Passthrough::Pass => {
                let writer = self.writer.as_mut().ok_or(BoundsError::NotAttached)?;
                writer.commit_partial(omit)?;
                self.ofs_fetch = new_commit;
            }
            Passthrough::Hold if omit > 0 => {
                trace!("partial commit while holding, blocking writer");
                self.passthrough = Passthrough::Blocked;
            }
            Passthrough::Hold | Passthrough::Blocked => {}
        }

        self.ofs_commit = new_commit;
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

    /// Check that the message is complete: all groups closed and, for a
    /// bounded root, the full size committed.
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
        if self.grp_end[0] != UNBOUNDED && self.ofs_commit != self.grp_end[0] {
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

    /// Current commit propagation policy.
    #[must_use]
    pub const fn passthrough(&self) -> Passthrough { self.passthrough }

    fn ensure_usable(&self) -> Result<(), BoundsError> {
        if self.writer.is_none() {
            return Err(BoundsError::NotAttached);
        }
        if self.passthrough == Passthrough::Blocked {
            return Err(BoundsError::Blocked);
        }
        Ok(())
    }
}
