//! Topic configuration for the region builder

use serde::{Deserialize, Serialize};

use crate::error::{BusError, Result};
use crate::layout::{self, RING_TYPE_MWMR, RING_TYPE_SWMR, SLOT_HEADER_SIZE};

/// Concurrency contract of a topic's ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RingType {
    /// Single writer, any number of independent readers
    Swmr,
    /// Multiple concurrent writers, any number of independent readers
    Mwmr,
}

impl Default for RingType {
    fn default() -> Self {
        Self::Swmr
    }
}

impl RingType {
    /// Wire tag stored in the topic table
    pub fn as_raw(self) -> u32 {
        match self {
            RingType::Swmr => RING_TYPE_SWMR,
            RingType::Mwmr => RING_TYPE_MWMR,
        }
    }

    /// Decode a wire tag
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            RING_TYPE_SWMR => Some(RingType::Swmr),
            RING_TYPE_MWMR => Some(RingType::Mwmr),
            _ => None,
        }
    }

    /// Human-readable tag name
    pub fn name(self) -> &'static str {
        match self {
            RingType::Swmr => "swmr",
            RingType::Mwmr => "mwmr",
        }
    }
}

/// Configuration for one topic in a region
///
/// `slot_count` is rounded up to a power of two by the builder so the ring
/// index mask stays valid; `payload_size` is the caller's maximum message
/// size, from which the builder derives an 8-aligned slot size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Topic name; stored NUL-terminated in 64 bytes, truncated at 63
    pub name: String,
    /// Requested slot count
    #[serde(alias = "slots")]
    pub slot_count: u32,
    /// Requested maximum payload size in bytes
    pub payload_size: u32,
    /// Ring concurrency contract
    #[serde(default, alias = "type")]
    pub ring_type: RingType,
}

impl TopicConfig {
    /// Create a new topic configuration
    pub fn new(
        name: impl Into<String>,
        slot_count: u32,
        payload_size: u32,
        ring_type: RingType,
    ) -> Self {
        Self {
            name: name.into(),
            slot_count,
            payload_size,
            ring_type,
        }
    }

    /// Convenience constructor for a single-writer topic
    pub fn swmr(name: impl Into<String>, slot_count: u32, payload_size: u32) -> Self {
        Self::new(name, slot_count, payload_size, RingType::Swmr)
    }

    /// Convenience constructor for a multi-writer topic
    pub fn mwmr(name: impl Into<String>, slot_count: u32, payload_size: u32) -> Self {
        Self::new(name, slot_count, payload_size, RingType::Mwmr)
    }

    /// Check the configuration is buildable
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(BusError::invalid_config("topic name cannot be empty"));
        }
        if self.slot_count == 0 {
            return Err(BusError::invalid_config(format!(
                "topic {}: slot count must be at least 1",
                self.name
            )));
        }
        Ok(())
    }

    /// Slot count after rounding up to a power of two
    pub fn rounded_slot_count(&self) -> u32 {
        self.slot_count.next_power_of_two()
    }

    /// Slot size after prefixing the header and aligning up to 8
    pub fn aligned_slot_size(&self) -> u32 {
        layout::align_up(SLOT_HEADER_SIZE as u64 + self.payload_size as u64, 8) as u32
    }

    /// Total slot-array bytes this topic occupies
    pub fn footprint(&self) -> u64 {
        self.rounded_slot_count() as u64 * self.aligned_slot_size() as u64
    }
}
