use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::engine::error::HarnessError;
use crate::engine::frame::{FenceHandle, WriteClaim};

use super::StreamRing;

fn fence(raw: u64) -> FenceHandle {
    FenceHandle::from_raw(raw).expect("non-zero fence")
}

#[test]
fn lockstep_handoff_advances_one_slot_at_a_time() {
    let ring = StreamRing::new(4, 1);

    let claim = ring.acquire_write().expect("ring not finished");
    assert_eq!((claim.slot, claim.seq), (0, 0));
    ring.publish(claim, fence(1), 0).unwrap();
    assert_eq!(ring.write_index(), 1);
    assert_eq!(ring.read_index(), 0);
    assert!(ring.has_producer_fence(0));

    let mut read = ring.acquire_read().unwrap().expect("frame published");
    assert_eq!((read.slot, read.seq), (0, 0));
    assert_eq!(read.fence.take().map(|f| f.raw()), Some(1));
    assert!(!ring.has_producer_fence(0));
    ring.release_read(read, None).unwrap();

    assert_eq!(ring.write_index(), 1);
    assert_eq!(ring.read_index(), 1);
    let claim = ring.acquire_write().unwrap();
    assert_eq!(claim.slot, 1);
}

#[test]
fn producer_blocks_until_consumer_releases() {
    let ring = Arc::new(StreamRing::new(3, 1));
    let claim = ring.acquire_write().unwrap();
    ring.publish(claim, fence(7), 0).unwrap();

    let producer = {
        let ring = ring.clone();
        thread::spawn(move || ring.acquire_write().map(|c| c.seq))
    };
    thread::sleep(Duration::from_millis(50));
    assert!(!producer.is_finished());
    assert_eq!(ring.snapshot().written, 1);

    let mut read = ring.acquire_read().unwrap().unwrap();
    read.fence.take();
    ring.release_read(read, None).unwrap();
    assert_eq!(producer.join().unwrap(), Some(1));
}

#[test]
fn single_slot_pool_alternates_strictly() {
    let ring = Arc::new(StreamRing::new(1, 1));
    const FRAMES: u64 = 200;

    let producer = {
        let ring = ring.clone();
        thread::spawn(move || {
            for k in 0..FRAMES {
                let claim = ring.acquire_write().expect("not finished");
                assert_eq!(claim.slot, 0);
                assert_eq!(claim.seq, k);
                ring.publish(claim, fence(k + 1), k as u32).unwrap();
            }
        })
    };

    for k in 0..FRAMES {
        let mut read = ring.acquire_read().unwrap().unwrap();
        assert_eq!(read.seq, k);
        assert_eq!(read.fence.take().map(|f| f.raw()), Some(k + 1));
        // the single slot is ours: the producer cannot have moved on
        assert_eq!(ring.snapshot().written, k + 1);
        ring.release_read(read, None).unwrap();
    }
    producer.join().unwrap();
}

#[test]
fn pipelining_depth_bounds_outstanding_frames() {
    let ring = StreamRing::new(4, 3);
    for k in 0..3 {
        let claim = ring.acquire_write().unwrap();
        ring.publish(claim, fence(k + 1), 0).unwrap();
    }
    let snapshot = ring.snapshot();
    assert_eq!(snapshot.written - snapshot.read, 3);

    ring.finish();
    assert!(ring.acquire_write().is_none());
}

#[test]
fn finish_wakes_blocked_producer() {
    let ring = Arc::new(StreamRing::new(2, 1));
    let claim = ring.acquire_write().unwrap();
    ring.publish(claim, fence(1), 0).unwrap();

    let producer = {
        let ring = ring.clone();
        thread::spawn(move || ring.acquire_write().is_none())
    };
    thread::sleep(Duration::from_millis(20));
    ring.finish();
    assert!(producer.join().unwrap());
    assert!(ring.is_finished());
}

#[test]
fn finished_ring_drains_then_reports_end() {
    let ring = StreamRing::new(2, 1);
    let claim = ring.acquire_write().unwrap();
    ring.publish(claim, fence(9), 0).unwrap();
    ring.finish();

    let mut read = ring.acquire_read().unwrap().expect("published frame still readable");
    read.fence.take();
    ring.release_read(read, None).unwrap();
    assert!(ring.acquire_read().unwrap().is_none());
}

#[test]
fn producer_failure_reaches_the_consumer() {
    let ring = Arc::new(StreamRing::new(2, 1));
    let consumer = {
        let ring = ring.clone();
        thread::spawn(move || ring.acquire_read().map(|c| c.map(|c| c.seq)))
    };
    thread::sleep(Duration::from_millis(20));
    ring.fail(HarnessError::Backend("map failed".to_string()));
    ring.fail(HarnessError::Backend("second".to_string()));

    assert_eq!(
        consumer.join().unwrap(),
        Err(HarnessError::Backend("map failed".to_string()))
    );
    assert!(ring.acquire_write().is_none());
}

#[test]
fn stale_claim_is_an_invariant_breach() {
    let ring = StreamRing::new(2, 1);
    let first = ring.acquire_write().unwrap();
    let duplicate = ring.acquire_write().unwrap();
    ring.publish(first, fence(1), 0).unwrap();

    let err = ring.publish(duplicate, fence(2), 0).unwrap_err();
    assert!(err.is_invariant());
}

#[test]
fn releasing_with_an_unwaited_fence_is_an_invariant_breach() {
    let ring = StreamRing::new(2, 1);
    let claim = ring.acquire_write().unwrap();
    ring.publish(claim, fence(3), 0).unwrap();

    let read = ring.acquire_read().unwrap().unwrap();
    let err = ring.release_read(read, Some(fence(4))).unwrap_err();
    assert!(err.is_invariant());

    let mut drained: Vec<u64> = ring.drain_fences().iter().map(|f| f.raw()).collect();
    drained.sort_unstable();
    assert_eq!(drained, vec![3, 4]);
}

#[test]
fn consumer_fence_travels_to_the_next_writer_of_the_slot() {
    let ring = StreamRing::new(1, 1);
    let claim = ring.acquire_write().unwrap();
    assert!(claim.consumer_fence.is_none());
    ring.publish(claim, fence(1), 0).unwrap();

    let mut read = ring.acquire_read().unwrap().unwrap();
    read.fence.take();
    ring.release_read(read, Some(fence(2))).unwrap();

    let mut claim = ring.acquire_write().unwrap();
    assert_eq!(claim.consumer_fence.take().map(|f| f.raw()), Some(2));
    ring.publish(claim, fence(3), 0).unwrap();
    assert!(ring.drain_fences().iter().map(|f| f.raw()).eq([3]));
}

#[test]
fn unresolved_consumer_fence_blocks_publish() {
    let ring = StreamRing::new(1, 1);
    let claim = ring.acquire_write().unwrap();
    ring.publish(claim, fence(1), 0).unwrap();
    let mut read = ring.acquire_read().unwrap().unwrap();
    read.fence.take();
    ring.release_read(read, Some(fence(2))).unwrap();

    let claim = ring.acquire_write().unwrap();
    assert!(ring.publish(claim, fence(3), 0).unwrap_err().is_invariant());

    let mut drained: Vec<u64> = ring.drain_fences().iter().map(|f| f.raw()).collect();
    drained.sort_unstable();
    assert_eq!(drained, vec![2, 3]);
}

#[test]
fn rejected_publish_keeps_its_fence_for_teardown() {
    let ring = StreamRing::new(2, 1);
    let claim = ring.acquire_write().unwrap();
    let stale = WriteClaim {
        slot: claim.slot,
        seq: claim.seq,
        consumer_fence: None,
    };
    ring.publish(claim, fence(5), 0).unwrap();

    assert!(ring.publish(stale, fence(6), 0).unwrap_err().is_invariant());
    assert_eq!(ring.snapshot().written, 1);
    assert!(ring.drain_fences().iter().map(|f| f.raw()).eq([6, 5]));
}
