//! Consumer cursor with overrun catch-up and torn-read detection
//!
//! A subscriber owns nothing in shared memory: its cursor, skip and discard
//! counters live in this process only, so any number of readers consume the
//! same ring without coordinating. Readers never block and never write
//! shared state.

use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::region::view::{Region, RingRef};

/// Outcome of one [`Subscriber::next`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recv {
    /// One message was copied into the caller's buffer
    Message {
        /// Payload length in bytes
        len: usize,
        /// Identity of the publisher that wrote it
        pub_id: u16,
    },
    /// No message due; poll again
    Empty,
    /// Caller's buffer was smaller than the payload; the message counts as
    /// consumed and the cursor has advanced past it
    Truncated,
}

/// Independent consumer cursor on one topic
pub struct Subscriber {
    /// Keeps the mapping alive for as long as this handle exists
    _region: Arc<Region>,
    ring: RingRef,
    /// Highest sequence fully consumed; 0 before the first message
    last_seq: u64,
    /// Overrun jumps taken because the writer lapped this reader
    skipped: u64,
    /// Messages discarded because a writer lapped us mid-copy
    discarded: u64,
}

impl Subscriber {
    /// Create a cursor on a topic in an attached region
    ///
    /// Works on both ring types; the consume protocol does not depend on
    /// how many writers feed the ring.
    pub fn new(region: Arc<Region>, topic: &str) -> Result<Self> {
        let entry = region.entry(topic)?;
        let ring = region.ring(entry);
        Ok(Self {
            _region: region,
            ring,
            last_seq: 0,
            skipped: 0,
            discarded: 0,
        })
    }

    /// Fetch at most one message into `buf`
    ///
    /// `Empty` is the common answer under tight polling and is always
    /// side-effect free unless an overrun jump or a writer-ahead adjustment
    /// moved the cursor. A reader that fell a full ring behind jumps forward
    /// to the oldest still-live sequence and counts a skip.
    pub fn next(&mut self, buf: &mut [u8]) -> Recv {
        let mut head = self.ring.w_head().load(Ordering::Acquire);
        let mut next = self.last_seq + 1;
        if next > head {
            return Recv::Empty;
        }

        // Overrun catch-up: everything older than one ring has been
        // overwritten; resume at the oldest sequence that can still be live.
        if head - next >= self.ring.slot_count() {
            self.last_seq = head - self.ring.slot_count();
            next = self.last_seq + 1;
            self.skipped += 1;

            head = self.ring.w_head().load(Ordering::Acquire);
            if next > head {
                return Recv::Empty;
            }
        }

        let index = self.ring.index_of(next);
        let seq = self.ring.slot_seq(index).load(Ordering::Acquire);

        // Reserved but not committed yet.
        if seq == 0 || seq < next {
            return Recv::Empty;
        }

        // The writer lapped us between the head load and the slot load.
        // Advance once and let the caller re-enter on its own schedule.
        if seq > next {
            self.last_seq = seq - 1;
            return Recv::Empty;
        }

        let (payload_len, pub_id) = unsafe { self.ring.slot_meta(index) };
        let len = payload_len as usize;

        // A length beyond slot capacity can only be a header read racing a
        // writer; treat it like any other lapped read.
        if len > self.ring.payload_capacity() {
            self.discarded += 1;
            self.last_seq = head;
            return Recv::Empty;
        }

        if len > buf.len() {
            self.last_seq = next;
            return Recv::Truncated;
        }

        unsafe {
            self.ring.copy_out(index, buf, len);
        }

        // Seqlock verify: if the commit marker moved during the copy, the
        // bytes in `buf` may interleave two messages. Discard and fast
        // forward to the newest sequence known committed.
        fence(Ordering::Acquire);
        let post_seq = self.ring.slot_seq(index).load(Ordering::Relaxed);
        if post_seq != seq {
            self.discarded += 1;
            self.last_seq = head;
            return Recv::Empty;
        }

        self.last_seq = next;
        Recv::Message { len, pub_id }
    }

    /// Highest sequence this subscriber has fully consumed
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Overrun jumps taken so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Torn reads discarded so far
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Sequences published but not yet consumed by this reader
    pub fn lag(&self) -> u64 {
        self.ring
            .w_head()
            .load(Ordering::Acquire)
            .saturating_sub(self.last_seq)
    }
}
