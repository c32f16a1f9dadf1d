//! Unit tests for the read-side buffer splicer.

use rstest::rstest;

use super::{ReadFeed, ReaderError, SpliceReader};

#[test]
fn feed_requires_producing_state() {
    let mut reader = SpliceReader::new();
    reader.feed(vec![1, 2, 3]).expect("feed");
    assert_eq!(reader.feed(vec![4]), Err(ReaderError::NotProducing));
}

#[test]
fn fetch_requires_consuming_state() {
    let mut reader = SpliceReader::new();
    assert_eq!(reader.fetch(1), Err(ReaderError::NotConsuming));
    assert_eq!(reader.commit(), Err(ReaderError::NotConsuming));
    assert!(reader.reclaim().is_err());
}

#[test]
fn fetch_serves_from_the_fragment() {
    let mut reader = SpliceReader::new();
    reader.feed(vec![1, 2, 3, 4, 5]).expect("feed");

    assert_eq!(reader.fetch(2).expect("fetch"), &[1, 2]);
    assert_eq!(reader.fetch(3).expect("fetch"), &[3, 4, 5]);
    reader.commit().expect("commit");

    let reclaimed = reader.reclaim().expect("reclaim");
    assert!(!reclaimed.paused);
    assert_eq!(reclaimed.frag, vec![1, 2, 3, 4, 5]);
}

#[test]
fn truncating_fetch_returns_the_remainder() {
    let mut reader = SpliceReader::new();
    reader.feed(vec![1, 2, 3]).expect("feed");
    assert_eq!(reader.fetch_up_to(8).expect("fetch_up_to"), &[1, 2, 3]);
}

#[test]
fn exact_fetch_at_fragment_end_fails_without_pausing() {
    let mut reader = SpliceReader::with_accumulator(8);
    reader.feed(vec![1, 2]).expect("feed");
    assert_eq!(reader.fetch(2).expect("fetch"), &[1, 2]);
    reader.commit().expect("commit");

    // The fragment is exhausted exactly; a further fetch fails but leaves
    // nothing pending, so the reclaim is clean.
    assert_eq!(
        reader.fetch(4),
        Err(ReaderError::OutOfData {
            desired: 4,
            available: 0
        })
    );
    let reclaimed = reader.reclaim().expect("reclaim");
    assert!(!reclaimed.paused);
}

#[test]
fn shortfall_is_backed_up_and_resumed_through_the_accumulator() {
    let mut reader = SpliceReader::with_accumulator(8);
    reader.feed(vec![0xAA]).expect("feed");

    assert_eq!(
        reader.fetch(2),
        Err(ReaderError::OutOfData {
            desired: 2,
            available: 1
        })
    );
    let reclaimed = reader.reclaim().expect("reclaim");
    assert!(reclaimed.paused);

    reader.feed(vec![0xBB, 0xCC]).expect("feed");
    assert_eq!(reader.fetch(2).expect("resumed fetch"), &[0xAA, 0xBB]);
    reader.commit().expect("commit");

    // After the accumulator is consumed, reads continue in the fragment.
    assert_eq!(reader.fetch(1).expect("fetch"), &[0xCC]);
    reader.commit().expect("commit");
    let reclaimed = reader.reclaim().expect("reclaim");
    assert!(!reclaimed.paused);
}

#[test]
fn feed_buffers_fragments_until_the_pending_request_is_satisfied() {
    let mut reader = SpliceReader::with_accumulator(16);
    reader.feed(vec![0x01]).expect("feed");
    assert!(reader.fetch(4).is_err());
    assert!(reader.reclaim().expect("reclaim").paused);

    // Two more one-byte fragments still fall short of the 4-byte request.
    assert_eq!(
        reader.feed(vec![0x02]).expect("feed"),
        ReadFeed::Buffered(vec![0x02])
    );
    assert_eq!(
        reader.feed(vec![0x03]).expect("feed"),
        ReadFeed::Buffered(vec![0x03])
    );
    assert_eq!(reader.feed(vec![0x04, 0x05]).expect("feed"), ReadFeed::Ready);

    assert_eq!(reader.fetch(4).expect("fetch"), &[0x01, 0x02, 0x03, 0x04]);
    reader.commit().expect("commit");
    assert_eq!(reader.fetch(1).expect("fetch"), &[0x05]);
    reader.commit().expect("commit");
    assert!(!reader.reclaim().expect("reclaim").paused);
}

#[test]
fn resumed_fetch_must_replay_the_original_request() {
    let mut reader = SpliceReader::with_accumulator(8);
    reader.feed(vec![0xAA]).expect("feed");
    assert!(reader.fetch(3).is_err());
    assert!(reader.reclaim().expect("reclaim").paused);

    reader.feed(vec![0xBB, 0xCC, 0xDD]).expect("feed");
    // Asking for more than was gathered cannot be served contiguously.
    assert_eq!(
        reader.fetch(4),
        Err(ReaderError::InconsistentRequest {
            desired: 4,
            expected: 3
        })
    );
    // Replaying the original request works.
    assert_eq!(reader.fetch(3).expect("fetch"), &[0xAA, 0xBB, 0xCC]);
}

#[test]
fn pausing_without_accumulator_is_rejected() {
    let mut reader = SpliceReader::new();
    reader.feed(vec![0xAA]).expect("feed");
    assert!(reader.fetch(2).is_err());
    assert_eq!(reader.reclaim(), Err(ReaderError::NeedAccumulator));
}

#[test]
fn oversized_backup_is_rejected() {
    let mut reader = SpliceReader::with_accumulator(2);
    reader.feed(vec![1, 2, 3]).expect("feed");
    assert!(reader.fetch(5).is_err());
    assert_eq!(
        reader.reclaim(),
        Err(ReaderError::AccumulatorTooSmall {
            capacity: 2,
            needed: 5
        })
    );
}

#[test]
fn reclaim_with_unread_data_is_refused() {
    let mut reader = SpliceReader::new();
    reader.feed(vec![1, 2, 3]).expect("feed");
    assert_eq!(reader.fetch(1).expect("fetch"), &[1]);
    reader.commit().expect("commit");

    assert_eq!(reader.reclaim(), Err(ReaderError::DataLeft));
    // The reader stays consuming; the rest can still be read.
    assert_eq!(reader.fetch(2).expect("fetch"), &[2, 3]);
    reader.commit().expect("commit");
    assert!(reader.reclaim().is_ok());
}

#[test]
fn uncommitted_reads_are_replayed_after_reclaim_refusal() {
    let mut reader = SpliceReader::new();
    reader.feed(vec![1, 2, 3]).expect("feed");
    assert_eq!(reader.fetch(1).expect("fetch"), &[1]);
    reader.commit().expect("commit");
    assert_eq!(reader.fetch(2).expect("fetch"), &[2, 3]);

    // Reclaim rewinds the uncommitted fetch.
    assert_eq!(reader.reclaim(), Err(ReaderError::DataLeft));
    assert_eq!(reader.fetch(2).expect("replayed fetch"), &[2, 3]);
}

#[rstest]
#[case::split_1_1(vec![vec![0x02], vec![0x28]])]
#[case::split_then_extra(vec![vec![0x02], vec![0x28, 0xFF]])]
fn two_byte_request_across_fragments(#[case] frags: Vec<Vec<u8>>) {
    let mut reader = SpliceReader::with_accumulator(4);
    let mut frags = frags.into_iter();

    reader.feed(frags.next().expect("first fragment")).expect("feed");
    assert!(reader.fetch(2).is_err());
    assert!(reader.reclaim().expect("reclaim").paused);

    reader.feed(frags.next().expect("second fragment")).expect("feed");
    assert_eq!(reader.fetch(2).expect("fetch"), &[0x02, 0x28]);
    reader.commit().expect("commit");
}

#[test]
fn partially_committed_accumulator_shifts_on_commit() {
    let mut reader = SpliceReader::with_accumulator(8);
    reader.feed(vec![0x01, 0x02]).expect("feed");
    assert!(reader.fetch(4).is_err());
    assert!(reader.reclaim().expect("reclaim").paused);

    reader.feed(vec![0x03, 0x04, 0x05]).expect("feed");
    // Serve and commit only part of the gathered data.
    assert_eq!(reader.fetch(1).expect("fetch"), &[0x01]);
    reader.commit().expect("commit");

    // The remaining gathered bytes are still served in order.
    assert_eq!(reader.fetch(3).expect("fetch"), &[0x02, 0x03, 0x04]);
    reader.commit().expect("commit");
    assert_eq!(reader.fetch(1).expect("fetch"), &[0x05]);
    reader.commit().expect("commit");
    assert!(!reader.reclaim().expect("reclaim").paused);
}
