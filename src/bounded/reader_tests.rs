//! Unit tests for the bounded reader.

use super::{BoundedReader, BoundsError, MAX_GROUPS};
use crate::splice::{ReaderError, SpliceReader};

fn attached(bound: usize, frag: Vec<u8>) -> BoundedReader {
    let mut reader = SpliceReader::new();
    reader.feed(frag).expect("feed");
    let mut bounded = BoundedReader::new(bound);
    bounded.attach(reader).expect("attach");
    bounded
}

#[test]
fn operations_require_an_attached_reader() {
    let mut bounded = BoundedReader::new(4);
    assert_eq!(bounded.fetch(1), Err(BoundsError::NotAttached));
    assert_eq!(bounded.commit(), Err(BoundsError::NotAttached));
    assert!(bounded.detach().is_err());
}

#[test]
fn fetch_is_checked_against_the_root_bound() {
    let mut bounded = attached(3, vec![1, 2, 3, 4, 5]);
    assert_eq!(
        bounded.fetch(4),
        Err(BoundsError::BoundsViolation {
            requested: 4,
            available: 3
        })
    );
    assert_eq!(bounded.fetch(3).expect("fetch"), &[1, 2, 3]);
}

#[test]
fn record_boundary_surfaces_as_out_of_data() {
    let mut bounded = attached(10, vec![1, 2]);
    assert!(matches!(
        bounded.fetch(5),
        Err(BoundsError::Reader(ReaderError::OutOfData { .. }))
    ));
    // The failed fetch did not advance the logical offset.
    assert_eq!(bounded.fetched(), 0);
}

#[test]
fn message_bounds_survive_detach_and_reattach() {
    // A 6-byte message arrives split 4/2 across two fragments.
    let mut bounded = attached(6, vec![1, 2, 3, 4]);
    assert_eq!(bounded.fetch(4).expect("fetch"), &[1, 2, 3, 4]);
    bounded.commit().expect("commit");

    let mut reader = bounded.detach().expect("detach");
    reader.reclaim().expect("reclaim");
    reader.feed(vec![5, 6]).expect("feed");
    bounded.attach(reader).expect("reattach");

    assert_eq!(bounded.fetch(2).expect("fetch"), &[5, 6]);
    bounded.commit().expect("commit");
    assert!(bounded.check_done().is_ok());
}

#[test]
fn uncommitted_fetches_are_dropped_at_detach() {
    let mut bounded = attached(6, vec![1, 2, 3, 4]);
    assert_eq!(bounded.fetch(2).expect("fetch"), &[1, 2]);
    bounded.commit().expect("commit");
    let _ = bounded.fetch(2).expect("uncommitted fetch");

    bounded.detach().expect("detach");
    assert_eq!(bounded.fetched(), 2);
    assert_eq!(bounded.committed(), 2);
}

#[test]
fn nested_groups_enforce_their_bounds() {
    let mut bounded = attached(8, vec![0; 8]);
    bounded.group_open(4).expect("group");
    bounded.fetch(4).expect("fetch");
    bounded.group_close().expect("close");

    assert_eq!(
        bounded.group_open(5),
        Err(BoundsError::BoundsViolation {
            requested: 5,
            available: 4
        })
    );

    let mut bounded = attached(8, vec![0; 8]);
    for _ in 0..MAX_GROUPS - 1 {
        bounded.group_open(2).expect("group");
    }
    assert_eq!(
        bounded.group_open(1),
        Err(BoundsError::TooManyGroups { max: MAX_GROUPS })
    );
}

#[test]
fn check_done_requires_the_full_root_size() {
    let mut bounded = attached(4, vec![1, 2, 3, 4]);
    bounded.fetch(2).expect("fetch");
    bounded.commit().expect("commit");
    assert_eq!(
        bounded.check_done(),
        Err(BoundsError::GroupNotExhausted { remaining: 2 })
    );
    bounded.fetch(2).expect("fetch");
    bounded.commit().expect("commit");
    assert!(bounded.check_done().is_ok());
}
