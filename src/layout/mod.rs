//! Shared-memory layout primitives
//!
//! Everything in here is byte-exact contract: the constants, the alignment
//! rules and the `#[repr(C)]` records in [`headers`] define what every
//! process mapping a region must agree on. Processes map the region at
//! different virtual addresses, so the layout speaks only in offsets from
//! the region base.

pub mod constants;
pub mod headers;

pub use constants::{
    CACHE_LINE_SIZE, LAYOUT_VERSION, MAX_TOPIC_NAME_LEN, MIN_REGION_SIZE, REGION_MAGIC,
    RING_TYPE_MWMR, RING_TYPE_SWMR,
};
pub use headers::{
    RegionHeader, RingDesc, SlotHeader, TopicEntry, REGION_HEADER_SIZE, RING_DESC_SIZE,
    SLOT_HEADER_SIZE, TOPIC_ENTRY_SIZE,
};

/// Round `v` up to the next multiple of `align`
///
/// `align` must be a power of two.
#[inline]
pub const fn align_up(v: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (v + (align - 1)) & !(align - 1)
}

/// Nanoseconds from the monotonic clock
///
/// Slot timestamps use CLOCK_MONOTONIC exclusively: the realtime clock can
/// jump backwards under NTP or administrative changes, which would break
/// latency measurement across processes.
#[inline]
pub fn monotonic_ns() -> u64 {
    nix::time::clock_gettime(nix::time::ClockId::CLOCK_MONOTONIC)
        .map(|ts| ts.tv_sec() as u64 * 1_000_000_000 + ts.tv_nsec() as u64)
        .unwrap_or(0)
}
