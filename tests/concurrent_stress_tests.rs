//! Concurrency stress tests for the lock-free protocol
//!
//! Threads stand in for processes here; every handle goes through the same
//! mapped region and the same atomics a cross-process deployment uses.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use shmbus::{build, unlink, MwmrPublisher, Recv, Region, Subscriber, SwmrPublisher, TopicConfig};

static NEXT_REGION: AtomicU32 = AtomicU32::new(0);

fn unique_path(tag: &str) -> String {
    let n = NEXT_REGION.fetch_add(1, Ordering::Relaxed);
    format!("/shmbus-test-{}-{}-{}", tag, std::process::id(), n)
}

struct RegionGuard(String);

impl Drop for RegionGuard {
    fn drop(&mut self) {
        let _ = unlink(&self.0);
    }
}

/// A writer hammering a 2-slot ring laps the reader constantly; the reader
/// must never deliver interleaved bytes and must observe discarded reads.
#[test]
fn test_torn_reads_are_discarded() {
    const MESSAGES: u64 = 200_000;
    const PAYLOAD: usize = 1024;

    let path = unique_path("torn");
    let _guard = RegionGuard(path.clone());
    build(&path, 1024 * 1024, &[TopicConfig::swmr("t", 2, PAYLOAD as u32)]).unwrap();
    let region = Arc::new(Region::attach(&path).unwrap());

    let mut subscriber = Subscriber::new(Arc::clone(&region), "t").unwrap();

    let writer_region = Arc::clone(&region);
    let writer = thread::spawn(move || {
        let mut publisher = SwmrPublisher::new(Arc::clone(&writer_region), "t", 3).unwrap();
        for i in 0..MESSAGES {
            // Uniform payload per message: any mix of two messages in one
            // buffer is detectable.
            let payload = [(i % 251) as u8; PAYLOAD];
            publisher.publish(&payload).unwrap();
        }
    });

    let mut buf = [0u8; PAYLOAD];
    let mut received: u64 = 0;
    loop {
        match subscriber.next(&mut buf) {
            Recv::Message { len, pub_id } => {
                assert_eq!(len, PAYLOAD);
                assert_eq!(pub_id, 3);
                let first = buf[0];
                assert!(
                    buf.iter().all(|&b| b == first),
                    "interleaved payload escaped the torn-read check"
                );
                received += 1;
            }
            Recv::Empty => {
                if writer.is_finished() {
                    break;
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }
    writer.join().unwrap();

    // Drain whatever is still live, with the same integrity check
    while let Recv::Message { .. } = subscriber.next(&mut buf) {
        let first = buf[0];
        assert!(buf.iter().all(|&b| b == first));
        received += 1;
    }

    assert!(received > 0);
    assert!(received <= MESSAGES);
    // A 2-slot ring under a full-speed writer laps the reader mid-copy
    assert!(
        subscriber.discarded() > 0,
        "expected at least one discarded read, got none over {} messages",
        received
    );
}

/// Concurrent MWMR publishers with one reader: the consumed stream is
/// strictly increasing in sequence and only carries known publisher ids.
#[test]
fn test_mwmr_contention() {
    const WRITERS: u16 = 4;
    const PER_WRITER: u64 = 50_000;

    let path = unique_path("contend");
    let _guard = RegionGuard(path.clone());
    build(&path, 8 * 1024 * 1024, &[TopicConfig::mwmr("t", 1024, 64)]).unwrap();
    let region = Arc::new(Region::attach(&path).unwrap());

    let barrier = Arc::new(Barrier::new(WRITERS as usize));
    let writers: Vec<_> = (1..=WRITERS)
        .map(|pub_id| {
            let region = Arc::clone(&region);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut publisher = MwmrPublisher::new(Arc::clone(&region), "t", pub_id).unwrap();
                barrier.wait();
                for _ in 0..PER_WRITER {
                    let payload = [pub_id as u8; 64];
                    publisher.publish(&payload).unwrap();
                }
            })
        })
        .collect();

    let mut subscriber = Subscriber::new(Arc::clone(&region), "t").unwrap();
    let mut buf = [0u8; 64];
    let mut received: u64 = 0;
    let mut prev_seq = 0u64;
    let mut seen_ids = [false; WRITERS as usize + 1];

    loop {
        match subscriber.next(&mut buf) {
            Recv::Message { len, pub_id } => {
                assert_eq!(len, 64);
                assert!((1..=WRITERS).contains(&pub_id));
                assert!(buf.iter().all(|&b| b == pub_id as u8));
                // The cursor only moves forward
                assert!(subscriber.last_seq() > prev_seq);
                prev_seq = subscriber.last_seq();
                seen_ids[pub_id as usize] = true;
                received += 1;
            }
            Recv::Empty => {
                if writers.iter().all(|w| w.is_finished()) {
                    break;
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }
    for writer in writers {
        writer.join().unwrap();
    }

    assert!(received > 0);
    assert_eq!(
        region.published("t").unwrap(),
        WRITERS as u64 * PER_WRITER
    );
    // Under a 1024-slot ring every writer should get through at least once
    assert!(seen_ids[1..].iter().all(|&seen| seen));
}

/// Four writers on a 4-slot ring, no reader: the generation gate alone
/// serializes slot reuse, nobody times out, and the final slots hold
/// exactly the last lap.
#[test]
fn test_mwmr_slot_safety() {
    const WRITERS: u16 = 4;
    const PER_WRITER: u64 = 20_000;
    const SLOTS: u64 = 4;

    let path = unique_path("safety");
    let _guard = RegionGuard(path.clone());
    build(&path, 1024 * 1024, &[TopicConfig::mwmr("t", SLOTS as u32, 32)]).unwrap();
    let region = Arc::new(Region::attach(&path).unwrap());

    let barrier = Arc::new(Barrier::new(WRITERS as usize));
    let writers: Vec<_> = (1..=WRITERS)
        .map(|pub_id| {
            let region = Arc::clone(&region);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut publisher = MwmrPublisher::new(Arc::clone(&region), "t", pub_id).unwrap();
                barrier.wait();
                for i in 0..PER_WRITER {
                    publisher.publish(&i.to_le_bytes()).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let total = WRITERS as u64 * PER_WRITER;
    let w_head = region.published("t").unwrap();
    assert_eq!(w_head, total);

    // Every slot carries a sequence from the final lap
    for k in 0..SLOTS as u32 {
        let seq = region.slot_seq("t", k).unwrap();
        assert!(seq > w_head - SLOTS && seq <= w_head);
        // Slot index is determined by the sequence
        assert_eq!((seq - 1) % SLOTS, k as u64);
    }
}

/// Readers on the same topic never interfere with one another
#[test]
fn test_multiple_readers_see_full_stream() {
    const MESSAGES: u32 = 100;

    let path = unique_path("readers");
    let _guard = RegionGuard(path.clone());
    build(&path, 1024 * 1024, &[TopicConfig::swmr("t", 256, 16)]).unwrap();
    let region = Arc::new(Region::attach(&path).unwrap());

    let mut publisher = SwmrPublisher::new(Arc::clone(&region), "t", 1).unwrap();
    for i in 0..MESSAGES {
        publisher.publish(&i.to_le_bytes()).unwrap();
    }

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let region = Arc::clone(&region);
            thread::spawn(move || {
                let mut subscriber = Subscriber::new(Arc::clone(&region), "t").unwrap();
                let mut buf = [0u8; 16];
                let mut values = Vec::new();
                while let Recv::Message { .. } = subscriber.next(&mut buf) {
                    values.push(u32::from_le_bytes(buf[..4].try_into().unwrap()));
                }
                values
            })
        })
        .collect();

    for reader in readers {
        let values = reader.join().unwrap();
        // 256 slots hold all 100 messages; nobody skipped anything
        assert_eq!(values, (0..MESSAGES).collect::<Vec<_>>());
    }
}

/// A slow reader under a fast writer only ever sees sequences move forward
#[test]
fn test_slow_reader_stream_is_monotonic() {
    const MESSAGES: u64 = 50_000;

    let path = unique_path("slowreader");
    let _guard = RegionGuard(path.clone());
    build(&path, 1024 * 1024, &[TopicConfig::swmr("t", 8, 16)]).unwrap();
    let region = Arc::new(Region::attach(&path).unwrap());

    let writer_region = Arc::clone(&region);
    let writer = thread::spawn(move || {
        let mut publisher = SwmrPublisher::new(Arc::clone(&writer_region), "t", 1).unwrap();
        for i in 0..MESSAGES {
            publisher.publish(&i.to_le_bytes()).unwrap();
        }
    });

    let mut subscriber = Subscriber::new(Arc::clone(&region), "t").unwrap();
    let mut buf = [0u8; 16];
    let mut prev: Option<u64> = None;
    let mut received: u64 = 0;
    loop {
        match subscriber.next(&mut buf) {
            Recv::Message { .. } => {
                let value = u64::from_le_bytes(buf[..8].try_into().unwrap());
                if let Some(prev) = prev {
                    assert!(value > prev, "went backwards: {} after {}", value, prev);
                }
                prev = Some(value);
                received += 1;
                // Fall behind on purpose
                if received % 3 == 0 {
                    thread::yield_now();
                }
            }
            Recv::Empty => {
                if writer.is_finished() {
                    break;
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }
    writer.join().unwrap();

    assert!(received > 0);
    assert!(received <= MESSAGES);
}
