//! Attached region handle and typed access to the shared layout
//!
//! This module is the audited boundary for pointer arithmetic: it turns the
//! raw mapping into references to [`RegionHeader`], topic entries, ring
//! descriptors and slots. Offsets from the topic table are resolved against
//! this process's own base pointer on every access, so regions mapped at
//! different addresses in different processes stay consistent.

use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::error::{BusError, Result};
use crate::layout::{
    RegionHeader, RingDesc, SlotHeader, TopicEntry, LAYOUT_VERSION, REGION_HEADER_SIZE,
    REGION_MAGIC, SLOT_HEADER_SIZE, TOPIC_ENTRY_SIZE,
};

use super::config::RingType;
use super::shm::ShmObject;

/// Descriptive snapshot of one topic, for tooling and callers sizing buffers
#[derive(Debug, Clone)]
pub struct TopicInfo {
    pub name: String,
    pub slot_count: u32,
    pub slot_size: u32,
    pub ring_type: RingType,
    /// Largest payload a single message on this topic can carry
    pub payload_capacity: u32,
}

/// A validated, attached bus region
///
/// Holds the mapping for its whole lifetime; publisher and subscriber
/// handles keep an `Arc` to it so the mapping cannot disappear under them.
pub struct Region {
    shm: ShmObject,
}

impl Region {
    /// Open and validate an existing region
    pub fn attach(path: &str) -> Result<Self> {
        let shm = ShmObject::open(path)?;
        if shm.len() < REGION_HEADER_SIZE {
            return Err(BusError::io(format!(
                "shm object {} too small for a region header",
                path
            )));
        }

        let region = Self { shm };
        let header = region.header();
        if header.magic != REGION_MAGIC {
            return Err(BusError::BadMagic {
                found: header.magic,
            });
        }
        if header.version != LAYOUT_VERSION {
            return Err(BusError::VersionMismatch {
                expected: LAYOUT_VERSION,
                actual: header.version,
            });
        }

        let table_end = header.topic_table_offset
            + header.topic_count as u64 * TOPIC_ENTRY_SIZE as u64;
        if table_end > region.shm.len() as u64 {
            return Err(BusError::invalid_argument(
                "region",
                "topic table extends past the mapped size",
            ));
        }

        debug!(
            "attached region {} ({} bytes, {} topics)",
            path,
            region.shm.len(),
            header.topic_count
        );
        Ok(region)
    }

    fn header(&self) -> &RegionHeader {
        unsafe { &*(self.shm.base_ptr() as *const RegionHeader) }
    }

    fn entries(&self) -> &[TopicEntry] {
        let header = self.header();
        unsafe {
            let first = self
                .shm
                .base_ptr()
                .add(header.topic_table_offset as usize) as *const TopicEntry;
            std::slice::from_raw_parts(first, header.topic_count as usize)
        }
    }

    pub(crate) fn entry(&self, name: &str) -> Result<&TopicEntry> {
        self.entries()
            .iter()
            .find(|e| e.name_matches(name))
            .ok_or_else(|| BusError::topic_not_found(name))
    }

    /// Region magic as mapped
    pub fn magic(&self) -> u32 {
        self.header().magic
    }

    /// Layout version as mapped
    pub fn version(&self) -> u32 {
        self.header().version
    }

    /// Total region size recorded in the header
    pub fn size(&self) -> u64 {
        self.header().mmap_size
    }

    /// Number of topics in the table
    pub fn topic_count(&self) -> u32 {
        self.header().topic_count
    }

    /// Shared-memory path this region is mapped from
    pub fn path(&self) -> &str {
        self.shm.path()
    }

    /// Look up one topic by name
    pub fn topic(&self, name: &str) -> Result<TopicInfo> {
        Self::info_of(self.entry(name)?)
    }

    /// Snapshot of every topic in the region
    pub fn topics(&self) -> Result<Vec<TopicInfo>> {
        self.entries().iter().map(Self::info_of).collect()
    }

    fn info_of(entry: &TopicEntry) -> Result<TopicInfo> {
        let ring_type = RingType::from_raw(entry.ring_type).ok_or_else(|| {
            BusError::invalid_argument("ring_type", format!("unknown tag {}", entry.ring_type))
        })?;
        Ok(TopicInfo {
            name: entry.name_lossy(),
            slot_count: entry.slot_count,
            slot_size: entry.slot_size,
            ring_type,
            payload_capacity: entry.slot_size - SLOT_HEADER_SIZE as u32,
        })
    }

    /// Total sequences reserved on a topic so far (its `w_head`)
    ///
    /// This is the publish-side health figure: subscriber lag is
    /// `published - last_seq`.
    pub fn published(&self, name: &str) -> Result<u64> {
        let ring = self.ring(self.entry(name)?);
        Ok(ring.w_head().load(Ordering::Acquire))
    }

    /// Committed sequence currently resident in one slot (0 = never written)
    ///
    /// Diagnostic for tooling; not part of the consume path.
    pub fn slot_seq(&self, name: &str, index: u32) -> Result<u64> {
        let entry = self.entry(name)?;
        if index >= entry.slot_count {
            return Err(BusError::invalid_argument(
                "index",
                format!("slot index {} out of {}", index, entry.slot_count),
            ));
        }
        let ring = self.ring(entry);
        Ok(ring.slot_seq(index as u64).load(Ordering::Acquire))
    }

    /// Resolve a topic entry into a bound ring reference
    pub(crate) fn ring(&self, entry: &TopicEntry) -> RingRef {
        unsafe {
            let base = self.shm.base_ptr();
            let desc = base.add(entry.ring_desc_offset as usize) as *mut RingDesc;
            let slots = base.add((*desc).base_offset as usize);
            RingRef::new(
                NonNull::new_unchecked(desc),
                NonNull::new_unchecked(slots),
                (*desc).slot_count,
                (*desc).slot_size,
            )
        }
    }
}

// All shared state behind the handle is reached through atomics or the
// seq-guarded slot protocol.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

/// A ring bound to this process's mapping of its region
///
/// Plain-data handle: descriptor pointer, slot-array pointer and the index
/// mask. Cheap to copy into publisher and subscriber handles.
#[derive(Clone, Copy)]
pub(crate) struct RingRef {
    desc: NonNull<RingDesc>,
    slots: NonNull<u8>,
    slot_count: u64,
    slot_size: u64,
    mask: u64,
}

impl RingRef {
    fn new(desc: NonNull<RingDesc>, slots: NonNull<u8>, slot_count: u32, slot_size: u32) -> Self {
        debug_assert!(slot_count.is_power_of_two());
        Self {
            desc,
            slots,
            slot_count: slot_count as u64,
            slot_size: slot_size as u64,
            mask: slot_count as u64 - 1,
        }
    }

    /// The topic's reservation counter
    pub(crate) fn w_head(&self) -> &AtomicU64 {
        unsafe { &self.desc.as_ref().w_head }
    }

    pub(crate) fn slot_count(&self) -> u64 {
        self.slot_count
    }

    /// Ring index for a sequence number
    pub(crate) fn index_of(&self, seq: u64) -> u64 {
        (seq - 1) & self.mask
    }

    /// Largest payload one slot can carry
    pub(crate) fn payload_capacity(&self) -> usize {
        self.slot_size as usize - SLOT_HEADER_SIZE
    }

    fn slot_ptr(&self, index: u64) -> *mut u8 {
        debug_assert!(index < self.slot_count);
        unsafe { self.slots.as_ptr().add((index * self.slot_size) as usize) }
    }

    /// Commit marker of one slot
    pub(crate) fn slot_seq(&self, index: u64) -> &AtomicU64 {
        unsafe { &(*(self.slot_ptr(index) as *const SlotHeader)).seq }
    }

    /// Write payload and header metadata into a slot, everything except `seq`
    ///
    /// The caller owns the commit discipline: release fence, then the
    /// release store of the sequence into [`Self::slot_seq`].
    pub(crate) unsafe fn fill_slot(
        &self,
        index: u64,
        payload: &[u8],
        pub_id: u16,
        timestamp_ns: u64,
    ) {
        let slot = self.slot_ptr(index);
        ptr::copy_nonoverlapping(payload.as_ptr(), slot.add(SLOT_HEADER_SIZE), payload.len());

        let header = slot as *mut SlotHeader;
        ptr::addr_of_mut!((*header).payload_len).write(payload.len() as u32);
        ptr::addr_of_mut!((*header).pub_id).write(pub_id);
        ptr::addr_of_mut!((*header).timestamp_ns).write(timestamp_ns);
    }

    /// Read a slot's payload length and publisher id
    ///
    /// Only meaningful between a successful acquire load of `seq` and the
    /// post-copy verify.
    pub(crate) unsafe fn slot_meta(&self, index: u64) -> (u32, u16) {
        let header = self.slot_ptr(index) as *const SlotHeader;
        (
            ptr::addr_of!((*header).payload_len).read(),
            ptr::addr_of!((*header).pub_id).read(),
        )
    }

    /// Copy `len` payload bytes out of a slot
    pub(crate) unsafe fn copy_out(&self, index: u64, out: &mut [u8], len: usize) {
        debug_assert!(len <= out.len());
        let payload = self.slot_ptr(index).add(SLOT_HEADER_SIZE);
        ptr::copy_nonoverlapping(payload, out.as_mut_ptr(), len);
    }
}

unsafe impl Send for RingRef {}
unsafe impl Sync for RingRef {}
