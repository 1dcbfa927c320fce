//! `#[repr(C)]` records shared between every process mapping a region
//!
//! Field order, widths and padding here are wire format. The compile-time
//! assertions at the bottom pin the sizes; changing any of these structs
//! means bumping [`super::constants::LAYOUT_VERSION`].
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ RegionHeader (32 B)                                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │ TopicEntry[topic_count]      (96 B each, table 64-aligned)   │
//! ├──────────────────────────────────────────────────────────────┤
//! │ RingDesc[topic_count]        (64 B each, cache-line aligned) │
//! ├──────────────────────────────────────────────────────────────┤
//! │ per-topic slot arrays        (slot_count × slot_size each,   │
//! │                               64-aligned between topics)     │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::mem::size_of;
use std::sync::atomic::AtomicU64;

use super::constants::MAX_TOPIC_NAME_LEN;

/// Fixed record at region offset 0
///
/// Written once by the builder, after every table, descriptor and slot has
/// been initialized; installing the magic is what flips the region from
/// uninitialized to ready. Read-only thereafter.
#[repr(C)]
pub struct RegionHeader {
    /// Region magic, [`super::constants::REGION_MAGIC`]
    pub magic: u32,
    /// Layout version
    pub version: u32,
    /// Total mapped size in bytes
    pub mmap_size: u64,
    /// Byte offset of the topic table from the region base
    pub topic_table_offset: u64,
    /// Number of topic table entries
    pub topic_count: u32,
    _pad: u32,
}

impl RegionHeader {
    pub fn new(mmap_size: u64, topic_table_offset: u64, topic_count: u32) -> Self {
        Self {
            magic: super::constants::REGION_MAGIC,
            version: super::constants::LAYOUT_VERSION,
            mmap_size,
            topic_table_offset,
            topic_count,
            _pad: 0,
        }
    }
}

/// One entry per configured topic, stored contiguously after the header
#[repr(C)]
pub struct TopicEntry {
    /// Topic name, NUL-terminated
    pub name: [u8; MAX_TOPIC_NAME_LEN],
    /// Byte offset of this topic's ring descriptor
    pub ring_desc_offset: u64,
    /// Slot count, always a power of two
    pub slot_count: u32,
    /// Slot size in bytes, header included, aligned up to 8
    pub slot_size: u32,
    /// Ring type tag, [`super::constants::RING_TYPE_SWMR`] or
    /// [`super::constants::RING_TYPE_MWMR`]
    pub ring_type: u32,
    _pad: [u8; 12],
}

impl TopicEntry {
    /// Build an entry, truncating the name at 63 bytes to leave room for
    /// the NUL terminator
    pub fn new(name: &str, ring_desc_offset: u64, slot_count: u32, slot_size: u32, ring_type: u32) -> Self {
        let mut name_buf = [0u8; MAX_TOPIC_NAME_LEN];
        let bytes = name.as_bytes();
        let len = bytes.len().min(MAX_TOPIC_NAME_LEN - 1);
        name_buf[..len].copy_from_slice(&bytes[..len]);

        Self {
            name: name_buf,
            ring_desc_offset,
            slot_count,
            slot_size,
            ring_type,
            _pad: [0; 12],
        }
    }

    /// Name bytes up to the NUL terminator
    pub fn name_bytes(&self) -> &[u8] {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_TOPIC_NAME_LEN);
        &self.name[..end]
    }

    /// Compare the stored name against a query string
    pub fn name_matches(&self, name: &str) -> bool {
        let query = name.as_bytes();
        let query = &query[..query.len().min(MAX_TOPIC_NAME_LEN - 1)];
        self.name_bytes() == query
    }

    /// Name as a display string
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }
}

/// Per-topic ring descriptor, cache-line aligned to keep `w_head` off any
/// neighbouring topic's line
#[repr(C, align(64))]
pub struct RingDesc {
    /// Slot count, power of two
    pub slot_count: u32,
    /// Slot size in bytes, header included
    pub slot_size: u32,
    /// Byte offset of this topic's slot array from the region base
    pub base_offset: u64,
    /// Next-sequence-to-assign counter; writers reserve from it with
    /// fetch_add, readers poll it with acquire loads
    pub w_head: AtomicU64,
    _reserved: [u8; 32],
}

impl RingDesc {
    pub fn new(slot_count: u32, slot_size: u32, base_offset: u64) -> Self {
        Self {
            slot_count,
            slot_size,
            base_offset,
            w_head: AtomicU64::new(0),
            _reserved: [0; 32],
        }
    }
}

/// Header at the front of every slot; the payload follows immediately
///
/// `seq == 0` means never written. Once a sequence is committed here the
/// remaining fields describe that sequence until the slot is next
/// overwritten. `seq` is the last field a publisher stores and the first a
/// subscriber loads; everything else is published before it by a release
/// fence.
#[repr(C)]
pub struct SlotHeader {
    /// Commit marker; the sequence whose payload this slot holds
    pub seq: AtomicU64,
    /// Monotonic publish timestamp in nanoseconds
    pub timestamp_ns: u64,
    /// Actual payload length in bytes
    pub payload_len: u32,
    /// Identity of the publisher that wrote this slot
    pub pub_id: u16,
    _pad: u16,
}

/// Size of [`RegionHeader`] in bytes
pub const REGION_HEADER_SIZE: usize = size_of::<RegionHeader>();
/// Size of one [`TopicEntry`] in bytes
pub const TOPIC_ENTRY_SIZE: usize = size_of::<TopicEntry>();
/// Size of one [`RingDesc`] in bytes
pub const RING_DESC_SIZE: usize = size_of::<RingDesc>();
/// Size of one [`SlotHeader`] in bytes
pub const SLOT_HEADER_SIZE: usize = size_of::<SlotHeader>();

const _: () = assert!(REGION_HEADER_SIZE == 32);
const _: () = assert!(TOPIC_ENTRY_SIZE == 96);
const _: () = assert!(RING_DESC_SIZE == 64);
const _: () = assert!(SLOT_HEADER_SIZE == 24);
const _: () = assert!(SLOT_HEADER_SIZE % 8 == 0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_name_roundtrip() {
        let entry = TopicEntry::new("imu_raw", 128, 8, 64, 0);
        assert_eq!(entry.name_bytes(), b"imu_raw");
        assert!(entry.name_matches("imu_raw"));
        assert!(!entry.name_matches("imu"));
        assert_eq!(entry.name_lossy(), "imu_raw");
    }

    #[test]
    fn test_entry_name_truncation() {
        let long = "t".repeat(100);
        let entry = TopicEntry::new(&long, 0, 1, 32, 0);
        assert_eq!(entry.name_bytes().len(), MAX_TOPIC_NAME_LEN - 1);
        // Lookups with the same over-long string must still match
        assert!(entry.name_matches(&long));
    }

    #[test]
    fn test_ring_desc_initial_head() {
        let desc = RingDesc::new(8, 64, 4096);
        assert_eq!(desc.w_head.load(std::sync::atomic::Ordering::Relaxed), 0);
        assert_eq!(desc.slot_count, 8);
    }
}
