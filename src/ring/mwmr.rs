//! Multi-writer publisher
//!
//! Extends the single-writer commit discipline with a per-slot generation
//! gate: a writer that reserved sequence S may only overwrite its slot once
//! the resident sequence belongs to a strictly earlier lap of the ring.
//! Comparing generations (`seq / slot_count`) rather than sequence
//! differences keeps the test wrap-safe and distinguishes a lagging writer
//! from our own lap still in flight.

use std::hint;
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;
use std::thread;

use log::warn;

use crate::error::{BusError, Result};
use crate::layout::{self, RING_TYPE_MWMR};
use crate::region::view::{Region, RingRef};

/// Iteration cap on the slot-safety spin
///
/// Exists only to break livelock when a writer died mid-write on a prior
/// lap; healthy rings never approach it.
pub const MAX_SAFETY_SPIN: u32 = 100_000;

/// Spin hint for the first few iterations, OS yield after
#[inline]
fn backoff(iter: u32) {
    if iter < 10 {
        hint::spin_loop();
    } else {
        thread::yield_now();
    }
}

/// Publisher bound to one MWMR topic; any number may publish concurrently
pub struct MwmrPublisher {
    /// Keeps the mapping alive for as long as this handle exists
    _region: Arc<Region>,
    ring: RingRef,
    pub_id: u16,
}

impl MwmrPublisher {
    /// Bind to a MWMR topic in an attached region
    pub fn new(region: Arc<Region>, topic: &str, pub_id: u16) -> Result<Self> {
        let entry = region.entry(topic)?;
        if entry.ring_type != RING_TYPE_MWMR {
            return Err(BusError::invalid_argument(
                "topic",
                format!("{} is not a multi-writer topic", topic),
            ));
        }
        let ring = region.ring(entry);
        Ok(Self {
            _region: region,
            ring,
            pub_id,
        })
    }

    /// This publisher's identity
    pub fn pub_id(&self) -> u16 {
        self.pub_id
    }

    /// Largest payload one message can carry on this topic
    pub fn payload_capacity(&self) -> usize {
        self.ring.payload_capacity()
    }

    /// Publish one message; returns the committed sequence
    ///
    /// On `Timeout` the reserved sequence is leaked: its slot keeps the old
    /// generation's commit marker and subscribers step over the gap via the
    /// overrun rule.
    pub fn publish(&mut self, payload: &[u8]) -> Result<u64> {
        let capacity = self.ring.payload_capacity();
        if payload.len() > capacity {
            return Err(BusError::payload_too_large(payload.len(), capacity));
        }

        let old_head = self.ring.w_head().fetch_add(1, Ordering::AcqRel);
        let commit = old_head + 1;
        let index = self.ring.index_of(commit);
        let slot_count = self.ring.slot_count();

        // Wait until the resident message is at least one full lap behind.
        // seq == 0 means the slot was never written; equal generation means
        // a concurrent reserver from this lap has not committed yet.
        let my_generation = commit / slot_count;
        let mut iter: u32 = 0;
        loop {
            let current = self.ring.slot_seq(index).load(Ordering::Acquire);
            if current == 0 || current / slot_count < my_generation {
                break;
            }
            backoff(iter);
            iter += 1;
            if iter > MAX_SAFETY_SPIN {
                warn!(
                    "publisher {} timed out waiting for slot {} (seq {})",
                    self.pub_id, index, commit
                );
                return Err(BusError::Timeout {
                    iterations: MAX_SAFETY_SPIN,
                });
            }
        }

        unsafe {
            self.ring
                .fill_slot(index, payload, self.pub_id, layout::monotonic_ns());
        }

        fence(Ordering::Release);
        self.ring.slot_seq(index).store(commit, Ordering::Release);

        Ok(commit)
    }
}
