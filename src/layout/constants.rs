//! Constants for the shared region layout

/// Magic number identifying a bus region, ASCII "USRL"
pub const REGION_MAGIC: u32 = 0x5553_524C;

/// Current layout version; attachers reject anything else
pub const LAYOUT_VERSION: u32 = 1;

/// Cache line size used for inter-topic alignment (64 bytes on x86_64 and
/// the common aarch64 parts)
pub const CACHE_LINE_SIZE: usize = 64;

/// Fixed topic name field width, NUL terminator included
pub const MAX_TOPIC_NAME_LEN: usize = 64;

/// Smallest region the builder accepts
pub const MIN_REGION_SIZE: u64 = 4096;

/// Ring type tag: single-writer / multi-reader
pub const RING_TYPE_SWMR: u32 = 0;

/// Ring type tag: multi-writer / multi-reader
pub const RING_TYPE_MWMR: u32 = 1;
