//! Single-pass region builder
//!
//! Lays out header, topic table, ring descriptors and slot arrays into a
//! freshly created shared-memory object. The header is written last:
//! installing the magic is the only transition from uninitialized to ready,
//! so attachers racing the builder see either "no such object", "bad magic"
//! or a fully initialized region, never a half-built one.

use std::ptr;
use std::sync::atomic::Ordering;

use log::debug;

use crate::error::{BusError, Result};
use crate::layout::{
    align_up, RegionHeader, RingDesc, SlotHeader, TopicEntry, CACHE_LINE_SIZE, MIN_REGION_SIZE,
    REGION_HEADER_SIZE, RING_DESC_SIZE, TOPIC_ENTRY_SIZE,
};

use super::config::TopicConfig;
use super::shm::{self, ShmObject};

/// Result of a successful [`build`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The region was created and initialized by this call
    Created,
    /// A region already exists at the path; nothing was touched
    Exists,
}

/// Create and initialize a bus region at `path`
///
/// Pre-existence is success, not an error: when several processes race to
/// bootstrap the same topic, exactly one creates and the rest attach. On any
/// failure after creation the object is unlinked so the caller can retry,
/// e.g. with a larger size after [`BusError::OutOfSpace`].
pub fn build(path: &str, size: u64, topics: &[TopicConfig]) -> Result<BuildOutcome> {
    if topics.is_empty() {
        return Err(BusError::invalid_config("at least one topic is required"));
    }
    if size < MIN_REGION_SIZE {
        return Err(BusError::invalid_argument(
            "size",
            format!("region size must be at least {} bytes", MIN_REGION_SIZE),
        ));
    }
    for topic in topics {
        topic.validate()?;
    }
    check_unique_names(topics)?;

    let shm = match ShmObject::create_exclusive(path, size)? {
        Some(shm) => shm,
        None => return Ok(BuildOutcome::Exists),
    };

    match init_layout(&shm, size, topics) {
        Ok(used) => {
            debug!(
                "built region {} with {} topics, {} / {} bytes used",
                path,
                topics.len(),
                used,
                size
            );
            Ok(BuildOutcome::Created)
        }
        Err(e) => {
            // Leave no half-built object behind; a retry must not hit Exists.
            drop(shm);
            let _ = shm::unlink(path);
            Err(e)
        }
    }
}

fn check_unique_names(topics: &[TopicConfig]) -> Result<()> {
    // Compare the names as stored, i.e. after 63-byte truncation.
    for (i, a) in topics.iter().enumerate() {
        let a_stored = TopicEntry::new(&a.name, 0, 0, 0, 0);
        for b in &topics[..i] {
            if a_stored.name_matches(&b.name) {
                return Err(BusError::invalid_config(format!(
                    "duplicate topic name: {}",
                    a.name
                )));
            }
        }
    }
    Ok(())
}

/// Write the full layout into a fresh mapping; returns the bytes used
fn init_layout(shm: &ShmObject, size: u64, topics: &[TopicConfig]) -> Result<u64> {
    let count = topics.len();
    let table_offset = align_up(REGION_HEADER_SIZE as u64, CACHE_LINE_SIZE as u64);
    let desc_start = align_up(
        table_offset + (count * TOPIC_ENTRY_SIZE) as u64,
        CACHE_LINE_SIZE as u64,
    );
    let slots_start = align_up(
        desc_start + (count * RING_DESC_SIZE) as u64,
        CACHE_LINE_SIZE as u64,
    );

    if slots_start > size {
        return Err(BusError::out_of_space(slots_start, size));
    }

    let base = unsafe { shm.base_ptr() };
    let mut next_free = slots_start;

    for (i, topic) in topics.iter().enumerate() {
        let slot_count = topic.rounded_slot_count();
        let slot_size = topic.aligned_slot_size();
        let footprint = slot_count as u64 * slot_size as u64;

        if next_free + footprint > size {
            return Err(BusError::out_of_space(next_free + footprint, size));
        }

        let desc_offset = desc_start + (i * RING_DESC_SIZE) as u64;
        unsafe {
            let entry = base.add(table_offset as usize + i * TOPIC_ENTRY_SIZE) as *mut TopicEntry;
            ptr::write(
                entry,
                TopicEntry::new(
                    &topic.name,
                    desc_offset,
                    slot_count,
                    slot_size,
                    topic.ring_type.as_raw(),
                ),
            );

            let desc = base.add(desc_offset as usize) as *mut RingDesc;
            ptr::write(desc, RingDesc::new(slot_count, slot_size, next_free));

            // A fresh ftruncate'd object is zero-filled, but the seq fields
            // are the readiness protocol; initialize them explicitly.
            for k in 0..slot_count as u64 {
                let header =
                    base.add((next_free + k * slot_size as u64) as usize) as *const SlotHeader;
                (*header).seq.store(0, Ordering::Relaxed);
            }
        }

        next_free = align_up(next_free + footprint, CACHE_LINE_SIZE as u64);
    }

    // Header last: magic installation flips the region to ready.
    unsafe {
        ptr::write(
            base as *mut RegionHeader,
            RegionHeader::new(size, table_offset, count as u32),
        );
    }

    Ok(next_free)
}
