//! # shmbus - Lock-Free Shared-Memory Message Bus
//!
//! shmbus carries fixed-size messages between OS processes through per-topic
//! ring buffers living in a single shared-memory region. Publish and consume
//! are lock-free with no kernel involvement on the hot path; any number of
//! independent readers consume the same ring without touching shared state.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 Shared region                    │
//! ├──────────────────────────────────────────────────┤
//! │ header │ topic table │ ring descs │ slot arrays  │
//! └──────────────────────────────────────────────────┘
//!      ▲              ▲                    ▲
//!      │ build        │ lookup             │ fetch-add / seqlock
//! ┌────┴─────┐  ┌─────┴─────┐  ┌───────────┴───────────┐
//! │ builder  │  │  attach   │  │ SWMR / MWMR publisher │
//! └──────────┘  └───────────┘  │      subscriber       │
//!                              └───────────────────────┘
//! ```
//!
//! Topics are laid out once at region creation; each is either
//! single-writer/multi-reader or multi-writer/multi-reader. Writers reserve
//! a sequence with a fetch-add on the topic's `w_head`, fill the slot, then
//! commit with a release store of the sequence into the slot header.
//! Readers verify the sequence after copying, so a reader lapped mid-copy
//! discards instead of delivering interleaved bytes. Readers that fall a
//! full ring behind skip forward; publishers never wait on readers.
//!
//! ## Quick start
//!
//! ```no_run
//! use shmbus::{Bus, PublisherOptions, Recv, RingType};
//!
//! let bus = Bus::new("demo");
//! let mut publisher = bus.create_publisher(
//!     &PublisherOptions::new("telemetry").with_ring(4096, 256),
//! )?;
//! publisher.send(b"hello")?;
//!
//! let mut subscriber = bus.create_subscriber("telemetry")?;
//! let mut buf = [0u8; 256];
//! if let Recv::Message { len, pub_id } = subscriber.recv(&mut buf) {
//!     println!("{} bytes from publisher {}", len, pub_id);
//! }
//! # Ok::<(), shmbus::BusError>(())
//! ```

pub mod bus;
pub mod error;
pub mod layout;
pub mod region;
pub mod ring;

// Main API re-exports
pub use bus::{Bus, BusOptions, BusPublisher, BusSubscriber, FileConfig, Health, PublisherOptions};
pub use error::{BusError, Result};
pub use region::{build, unlink, BuildOutcome, Region, RingType, TopicConfig, TopicInfo};
pub use ring::{MwmrPublisher, Recv, Subscriber, SwmrPublisher};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
