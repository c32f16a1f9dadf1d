//! Unit tests for the bounded writer.

use rstest::rstest;

use super::{BoundedWriter, BoundsError, MAX_GROUPS, Passthrough};
use crate::splice::SpliceWriter;

fn attached(bound: Option<usize>, mode: Passthrough) -> BoundedWriter {
    let mut writer = SpliceWriter::new();
    writer.feed(vec![0; 64]).expect("feed");
    let mut bounded = BoundedWriter::new(bound);
    bounded.attach(writer, mode).expect("attach");
    bounded
}

#[test]
fn operations_require_an_attached_writer() {
    let mut bounded = BoundedWriter::new(Some(10));
    assert_eq!(bounded.fetch(1), Err(BoundsError::NotAttached));
    assert_eq!(bounded.commit(), Err(BoundsError::NotAttached));
    assert!(bounded.detach().is_err());
}

#[test]
fn double_attach_is_rejected() {
    let mut bounded = attached(Some(10), Passthrough::Pass);
    let other = SpliceWriter::new();
    assert!(matches!(
        bounded.attach(other, Passthrough::Pass),
        Err(BoundsError::AlreadyAttached)
    ));
}

#[test]
fn fetch_is_checked_against_the_root_bound() {
    let mut bounded = attached(Some(10), Passthrough::Pass);
    assert_eq!(
        bounded.fetch(11),
        Err(BoundsError::BoundsViolation {
            requested: 11,
            available: 10
        })
    );
    bounded.fetch(10).expect("exactly the bound");
    assert_eq!(
        bounded.fetch(1),
        Err(BoundsError::BoundsViolation {
            requested: 1,
            available: 0
        })
    );
}

#[test]
fn truncating_fetch_is_clipped_to_the_bound() {
    let mut bounded = attached(Some(6), Passthrough::Pass);
    let chunk = bounded.fetch_up_to(10).expect("fetch_up_to");
    assert_eq!(chunk.len(), 6);
    assert_eq!(bounded.fetched(), 6);
}

#[test]
fn nested_groups_enforce_their_bounds() {
    let mut bounded = attached(Some(50), Passthrough::Pass);
    bounded.group_open(30).expect("outer group");
    bounded.fetch(10).expect("fetch");
    bounded.group_open(15).expect("inner group");
    bounded.fetch(15).expect("fetch");
    bounded.commit().expect("commit");
    bounded.group_close().expect("inner close");

    // The outer group still has 5 unprocessed bytes.
    assert_eq!(
        bounded.group_close(),
        Err(BoundsError::GroupNotExhausted { remaining: 5 })
    );
    bounded.fetch(5).expect("fetch");
    bounded.commit().expect("commit");
    bounded.group_close().expect("outer close");

    // Root completion needs the remaining 20 bytes.
    assert!(bounded.check_done().is_err());
    bounded.fetch(20).expect("fetch");
    bounded.commit().expect("commit");
    assert!(bounded.check_done().is_ok());
}

#[test]
fn group_open_cannot_exceed_the_enclosing_group() {
    let mut bounded = attached(Some(10), Passthrough::Pass);
    bounded.fetch(4).expect("fetch");
    assert_eq!(
        bounded.group_open(7),
        Err(BoundsError::BoundsViolation {
            requested: 7,
            available: 6
        })
    );
}

#[test]
fn group_nesting_depth_is_bounded() {
    let mut bounded = attached(Some(40), Passthrough::Pass);
    for _ in 0..MAX_GROUPS - 1 {
        bounded.group_open(8).expect("group");
    }
    assert_eq!(
        bounded.group_open(1),
        Err(BoundsError::TooManyGroups { max: MAX_GROUPS })
    );
}

#[test]
fn offsets_stay_ordered_and_bounded() {
    let mut bounded = attached(Some(20), Passthrough::Pass);
    bounded.fetch(5).expect("fetch");
    assert!(bounded.committed() <= bounded.fetched());
    bounded.group_open(10).expect("group");
    bounded.fetch(4).expect("fetch");
    bounded.commit().expect("commit");
    assert_eq!(bounded.committed(), 9);
    assert_eq!(bounded.fetched(), 9);
    assert!(bounded.fetched() <= 20);
}

#[test]
fn pass_mode_forwards_commits_to_the_splice_writer() {
    let mut writer = SpliceWriter::new();
    writer.feed(vec![0; 16]).expect("feed");
    let mut bounded = BoundedWriter::new(Some(8));
    bounded.attach(writer, Passthrough::Pass).expect("attach");

    bounded.fetch(8).expect("fetch");
    bounded.commit().expect("commit");

    let detached = bounded.detach().expect("detach");
    assert_eq!(detached.committed, 8);
    assert_eq!(detached.uncommitted, 0);
    assert_eq!(detached.writer.committed().expect("splice committed"), 8);
}

#[test]
fn hold_mode_keeps_the_splice_writer_uncommitted() {
    let mut writer = SpliceWriter::new();
    writer.feed(vec![0; 16]).expect("feed");
    let mut bounded = BoundedWriter::new(None);
    bounded.attach(writer, Passthrough::Hold).expect("attach");

    bounded.fetch(8).expect("fetch");
    bounded.commit().expect("commit");
    assert_eq!(bounded.committed(), 8);

    let detached = bounded.detach().expect("detach");
    assert_eq!(detached.committed, 8);
    assert_eq!(detached.uncommitted, 0);
    // Nothing was forwarded; the caller commits after detach.
    assert_eq!(detached.writer.committed().expect("splice committed"), 0);
}

#[test]
fn partial_commit_while_holding_blocks_the_writer() {
    let mut bounded = attached(None, Passthrough::Hold);
    bounded.fetch(10).expect("fetch");
    bounded.commit_partial(4).expect("partial commit");
    assert_eq!(bounded.passthrough(), Passthrough::Blocked);

    assert_eq!(bounded.fetch(1), Err(BoundsError::Blocked));
    assert_eq!(bounded.commit(), Err(BoundsError::Blocked));

    // Detach still works and reports the held accounting.
    let detached = bounded.detach().expect("detach");
    assert_eq!(detached.committed, 6);
    assert_eq!(detached.uncommitted, 4);
}

#[test]
fn reattach_resets_the_commit_policy() {
    let mut bounded = attached(None, Passthrough::Hold);
    bounded.fetch(4).expect("fetch");
    bounded.commit_partial(1).expect("partial commit");
    assert_eq!(bounded.passthrough(), Passthrough::Blocked);

    let detached = bounded.detach().expect("detach");
    bounded
        .attach(detached.writer, Passthrough::Pass)
        .expect("reattach");
    assert_eq!(bounded.passthrough(), Passthrough::Pass);
    // The fetch offset rewound to the committed offset at detach.
    assert_eq!(bounded.fetched(), 3);
}

#[rstest]
#[case::known_bound(Some(12))]
#[case::open_ended(None)]
fn omit_beyond_uncommitted_is_rejected(#[case] bound: Option<usize>) {
    let mut bounded = attached(bound, Passthrough::Pass);
    bounded.fetch(3).expect("fetch");
    assert_eq!(
        bounded.commit_partial(4),
        Err(BoundsError::BoundsViolation {
            requested: 4,
            available: 3
        })
    );
}

#[test]
fn open_ended_root_completes_at_any_committed_size() {
    let mut bounded = attached(None, Passthrough::Hold);
    bounded.fetch(7).expect("fetch");
    bounded.commit().expect("commit");
    assert!(bounded.check_done().is_ok());
}

#[test]
fn commit_is_idempotent() {
    let mut bounded = attached(Some(10), Passthrough::Pass);
    bounded.fetch(6).expect("fetch");
    bounded.commit().expect("first commit");
    bounded.commit().expect("second commit");
    assert_eq!(bounded.committed(), 6);
    bounded.commit_partial(0).expect("commit_partial(0)");
    assert_eq!(bounded.committed(), 6);
}
