//! JSON file configuration for bootstrapping multi-topic regions
//!
//! ```json
//! {
//!   "region": { "size_mb": 64 },
//!   "topics": [
//!     { "name": "imu",  "slots": 4096, "payload_size": 64 },
//!     { "name": "cmds", "slots": 256,  "payload_size": 512, "type": "mwmr" }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{BusError, Result};
use crate::region::TopicConfig;

const DEFAULT_REGION_MB: u64 = 64;
const MIN_REGION_MB: u64 = 8;

/// Region-wide settings
#[derive(Debug, Clone, Deserialize)]
pub struct RegionSettings {
    /// Region size in mebibytes; clamped to a minimum of 8
    #[serde(default = "default_size_mb")]
    pub size_mb: u64,
}

fn default_size_mb() -> u64 {
    DEFAULT_REGION_MB
}

impl Default for RegionSettings {
    fn default() -> Self {
        Self {
            size_mb: DEFAULT_REGION_MB,
        }
    }
}

/// Parsed bus configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub region: RegionSettings,
    pub topics: Vec<TopicConfig>,
}

impl FileConfig {
    /// Parse a configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: FileConfig = serde_json::from_str(json)?;
        if config.topics.is_empty() {
            return Err(BusError::invalid_config("config lists no topics"));
        }
        Ok(config)
    }

    /// Read and parse a configuration file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())
            .map_err(|e| BusError::from_io(e, "failed to read config file"))?;
        Self::from_json(&json)
    }

    /// Region size in bytes, minimum applied
    pub fn region_size(&self) -> u64 {
        self.region.size_mb.max(MIN_REGION_MB) * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RingType;

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "region": { "size_mb": 16 },
            "topics": [
                { "name": "imu", "slots": 4096, "payload_size": 64 },
                { "name": "cmds", "slots": 256, "payload_size": 512, "type": "mwmr" }
            ]
        }"#;
        let config = FileConfig::from_json(json).unwrap();
        assert_eq!(config.region_size(), 16 * 1024 * 1024);
        assert_eq!(config.topics.len(), 2);
        assert_eq!(config.topics[0].ring_type, RingType::Swmr);
        assert_eq!(config.topics[1].name, "cmds");
        assert_eq!(config.topics[1].ring_type, RingType::Mwmr);
    }

    #[test]
    fn test_defaults_apply() {
        let json = r#"{ "topics": [ { "name": "t", "slots": 8, "payload_size": 32 } ] }"#;
        let config = FileConfig::from_json(json).unwrap();
        assert_eq!(config.region.size_mb, 64);
        assert_eq!(config.topics[0].slot_count, 8);
    }

    #[test]
    fn test_region_size_floor() {
        let json = r#"{ "region": { "size_mb": 1 },
                        "topics": [ { "name": "t", "slots": 8, "payload_size": 32 } ] }"#;
        let config = FileConfig::from_json(json).unwrap();
        assert_eq!(config.region_size(), 8 * 1024 * 1024);
    }

    #[test]
    fn test_empty_topics_rejected() {
        let json = r#"{ "topics": [] }"#;
        assert!(FileConfig::from_json(json).is_err());
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            FileConfig::from_json("{ not json"),
            Err(BusError::InvalidConfig { .. })
        ));
    }
}
