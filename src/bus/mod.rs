//! Application façade over the core ring protocol
//!
//! The bus owns one shared region per topic (path `/shmbus-<topic>`),
//! bootstraps it on first use, hands out process-unique publisher ids and
//! layers the optional policy pieces on top of the lock-free core: rate
//! limiting, block-on-full retries and health snapshots. None of this runs
//! on the hot path unless the caller opts in.

pub mod backpressure;
pub mod config;

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::error::{BusError, Result};
use crate::region::{self, BuildOutcome, Region, RingType, TopicConfig};
use crate::ring::{MwmrPublisher, Recv, Subscriber, SwmrPublisher};

use backpressure::{backoff_exponential, PublishQuota};

pub use config::FileConfig;

/// Default per-topic region size when the ring itself is smaller
const DEFAULT_REGION_BYTES: u64 = 64 * 1024 * 1024;
/// Floor for caller-supplied region sizes
const MIN_REGION_BYTES: u64 = 8 * 1024 * 1024;
/// Slack added on top of the ring footprint when sizing a region
const REGION_HEADROOM: u64 = 1024 * 1024;
/// Subscriber lag above which a health snapshot reports unhealthy
const HEALTHY_LAG_LIMIT: u64 = 100;

/// Process-wide publisher identity counter; ids travel in slot headers
static NEXT_PUB_ID: AtomicU16 = AtomicU16::new(1);

fn allocate_pub_id() -> u16 {
    NEXT_PUB_ID.fetch_add(1, Ordering::Relaxed)
}

/// Options for [`Bus::with_options`]
#[derive(Debug, Clone)]
pub struct BusOptions {
    /// Application name, for log context only
    pub app_name: String,
    /// Default size of each per-topic region in bytes
    pub default_region_bytes: u64,
}

impl Default for BusOptions {
    fn default() -> Self {
        Self {
            app_name: "shmbus".to_string(),
            default_region_bytes: DEFAULT_REGION_BYTES,
        }
    }
}

/// Per-publisher options
#[derive(Debug, Clone)]
pub struct PublisherOptions {
    pub topic: String,
    pub ring_type: RingType,
    pub slot_count: u32,
    pub payload_size: u32,
    /// Messages per second admitted by the rate limiter; 0 = unlimited
    pub rate_limit_hz: u64,
    /// Spin-wait with backoff instead of dropping when throttled or the
    /// multi-writer safety spin times out
    pub block_on_full: bool,
}

impl PublisherOptions {
    /// Options for `topic` with the stock ring shape
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ring_type: RingType::Swmr,
            slot_count: 4096,
            payload_size: 1024,
            rate_limit_hz: 0,
            block_on_full: false,
        }
    }

    pub fn with_ring_type(mut self, ring_type: RingType) -> Self {
        self.ring_type = ring_type;
        self
    }

    pub fn with_ring(mut self, slot_count: u32, payload_size: u32) -> Self {
        self.slot_count = slot_count;
        self.payload_size = payload_size;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit_hz: u64) -> Self {
        self.rate_limit_hz = rate_limit_hz;
        self
    }

    pub fn with_block_on_full(mut self, block: bool) -> Self {
        self.block_on_full = block;
        self
    }
}

/// Health snapshot for a publisher or subscriber handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    /// Messages published or received
    pub operations: u64,
    /// Drops, skips, discards and truncations
    pub errors: u64,
    /// Subscriber lag in sequences; 0 for publishers
    pub lag: u64,
    pub healthy: bool,
}

/// Entry point owning bus-wide defaults
pub struct Bus {
    name: String,
    default_region_bytes: u64,
}

impl Bus {
    /// Create a bus context with default settings
    pub fn new(app_name: impl Into<String>) -> Self {
        Self::with_options(BusOptions {
            app_name: app_name.into(),
            ..Default::default()
        })
    }

    /// Create a bus context with explicit options
    pub fn with_options(options: BusOptions) -> Self {
        info!("bus context ready: {}", options.app_name);
        Self {
            name: options.app_name,
            default_region_bytes: options.default_region_bytes.max(MIN_REGION_BYTES),
        }
    }

    /// Application name this context was created with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared-memory path for a topic's region
    pub fn shm_path(topic: &str) -> String {
        format!("/shmbus-{}", topic)
    }

    /// Create a publisher, bootstrapping the topic's region on first use
    ///
    /// Whichever process gets here first creates the region; everyone else
    /// attaches to it. Both outcomes succeed.
    pub fn create_publisher(&self, options: &PublisherOptions) -> Result<BusPublisher> {
        let topic_config = TopicConfig::new(
            &options.topic,
            options.slot_count,
            options.payload_size,
            options.ring_type,
        );
        topic_config.validate()?;

        let size = (topic_config.footprint() + REGION_HEADROOM).max(self.default_region_bytes);
        let path = Self::shm_path(&options.topic);

        match region::build(&path, size, std::slice::from_ref(&topic_config))? {
            BuildOutcome::Created => info!("created region {} ({} bytes)", path, size),
            BuildOutcome::Exists => debug!("region {} exists, attaching", path),
        }

        let region = Arc::new(Region::attach(&path)?);
        let pub_id = allocate_pub_id();
        let handle = match options.ring_type {
            RingType::Swmr => PubHandle::Swmr(SwmrPublisher::new(region, &options.topic, pub_id)?),
            RingType::Mwmr => PubHandle::Mwmr(MwmrPublisher::new(region, &options.topic, pub_id)?),
        };

        let quota = (options.rate_limit_hz > 0).then(|| PublishQuota::new(options.rate_limit_hz));

        Ok(BusPublisher {
            topic: options.topic.clone(),
            handle,
            quota,
            block_on_full: options.block_on_full,
            published: 0,
            drops: 0,
        })
    }

    /// Attach a subscriber to an existing topic region
    pub fn create_subscriber(&self, topic: &str) -> Result<BusSubscriber> {
        let path = Self::shm_path(topic);
        let region = Arc::new(Region::attach(&path)?);
        let subscriber = Subscriber::new(region, topic)?;
        Ok(BusSubscriber {
            topic: topic.to_string(),
            subscriber,
            received: 0,
            truncated: 0,
        })
    }

    /// Build a multi-topic region from a parsed config file
    ///
    /// Sizing takes whichever is larger: the configured region size or the
    /// layout's actual footprint plus headroom.
    pub fn build_region(shm_path: &str, config: &FileConfig) -> Result<BuildOutcome> {
        let footprint: u64 = config.topics.iter().map(TopicConfig::footprint).sum();
        let size = config.region_size().max(footprint + REGION_HEADROOM);
        region::build(shm_path, size, &config.topics)
    }
}

enum PubHandle {
    Swmr(SwmrPublisher),
    Mwmr(MwmrPublisher),
}

/// Publishing handle with optional flow control
pub struct BusPublisher {
    topic: String,
    handle: PubHandle,
    quota: Option<PublishQuota>,
    block_on_full: bool,
    published: u64,
    drops: u64,
}

impl BusPublisher {
    /// Publish one message; returns the committed sequence
    pub fn send(&mut self, payload: &[u8]) -> Result<u64> {
        if let Some(quota) = &mut self.quota {
            let mut attempt = 0;
            while quota.check() {
                if !self.block_on_full {
                    self.drops += 1;
                    return Err(BusError::Throttled);
                }
                thread::sleep(backoff_exponential(attempt));
                attempt += 1;
            }
        }

        loop {
            let result = match &mut self.handle {
                PubHandle::Swmr(p) => p.publish(payload),
                PubHandle::Mwmr(p) => p.publish(payload),
            };
            match result {
                Ok(seq) => {
                    self.published += 1;
                    return Ok(seq);
                }
                Err(BusError::Timeout { .. }) if self.block_on_full => {
                    thread::sleep(Duration::from_micros(1));
                }
                Err(err) => {
                    if matches!(err, BusError::Timeout { .. }) {
                        self.drops += 1;
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Topic this publisher is bound to
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// This publisher's identity
    pub fn pub_id(&self) -> u16 {
        match &self.handle {
            PubHandle::Swmr(p) => p.pub_id(),
            PubHandle::Mwmr(p) => p.pub_id(),
        }
    }

    /// Largest payload one message can carry
    pub fn payload_capacity(&self) -> usize {
        match &self.handle {
            PubHandle::Swmr(p) => p.payload_capacity(),
            PubHandle::Mwmr(p) => p.payload_capacity(),
        }
    }

    /// Health snapshot
    pub fn health(&self) -> Health {
        let throttled = self
            .quota
            .as_ref()
            .map(PublishQuota::total_throttled)
            .unwrap_or(0);
        let errors = self.drops + throttled;
        Health {
            operations: self.published,
            errors,
            lag: 0,
            healthy: errors == 0,
        }
    }
}

/// Subscribing handle with consumption accounting
pub struct BusSubscriber {
    topic: String,
    subscriber: Subscriber,
    received: u64,
    truncated: u64,
}

impl BusSubscriber {
    /// Fetch at most one message into `buf`
    pub fn recv(&mut self, buf: &mut [u8]) -> Recv {
        let outcome = self.subscriber.next(buf);
        match outcome {
            Recv::Message { .. } => self.received += 1,
            Recv::Truncated => self.truncated += 1,
            Recv::Empty => {}
        }
        outcome
    }

    /// Topic this subscriber is bound to
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Health snapshot; lag counts sequences published but not yet consumed
    pub fn health(&self) -> Health {
        let errors = self.truncated + self.subscriber.skipped() + self.subscriber.discarded();
        let lag = self.subscriber.lag();
        Health {
            operations: self.received,
            errors,
            lag,
            healthy: lag < HEALTHY_LAG_LIMIT && errors == 0,
        }
    }
}
