//! Single-writer publisher
//!
//! The SWMR contract assumes at most one live publisher per topic, so the
//! reservation fetch-add exists for monotonicity rather than mutual
//! exclusion. Acquire-release is kept on it anyway so a SWMR ring stays
//! coherent when observed by debug tooling or a future multi-writer
//! variant.

use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

use crate::error::{BusError, Result};
use crate::layout::{self, RING_TYPE_SWMR};
use crate::region::view::{Region, RingRef};

/// Publisher bound to one SWMR topic
///
/// Bound at construction with a stable 16-bit identity that travels in every
/// slot header it writes.
pub struct SwmrPublisher {
    /// Keeps the mapping alive for as long as this handle exists
    _region: Arc<Region>,
    ring: RingRef,
    pub_id: u16,
}

impl SwmrPublisher {
    /// Bind to a SWMR topic in an attached region
    pub fn new(region: Arc<Region>, topic: &str, pub_id: u16) -> Result<Self> {
        let entry = region.entry(topic)?;
        if entry.ring_type != RING_TYPE_SWMR {
            return Err(BusError::invalid_argument(
                "topic",
                format!("{} is not a single-writer topic", topic),
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
    /// The payload-fit check precedes the reservation: an oversized publish
    /// consumes no sequence and leaves the ring untouched.
    pub fn publish(&mut self, payload: &[u8]) -> Result<u64> {
        let capacity = self.ring.payload_capacity();
        if payload.len() > capacity {
            return Err(BusError::payload_too_large(payload.len(), capacity));
        }

        let old_head = self.ring.w_head().fetch_add(1, Ordering::AcqRel);
        let commit = old_head + 1;
        let index = self.ring.index_of(commit);

        unsafe {
            self.ring
                .fill_slot(index, payload, self.pub_id, layout::monotonic_ns());
        }

        // Every payload and header byte must be visible before the commit
        // marker; readers pair this with their acquire load of seq.
        fence(Ordering::Release);
        self.ring.slot_seq(index).store(commit, Ordering::Release);

        Ok(commit)
    }
}
