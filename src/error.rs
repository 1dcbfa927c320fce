//! Error types and handling for shmbus

/// Result type alias for shmbus operations
pub type Result<T> = std::result::Result<T, BusError>;

/// Error kinds raised by the bus
///
/// A pre-existing region is deliberately not an error: concurrent creators
/// racing on the same path is the normal case, reported through
/// [`crate::region::BuildOutcome::Exists`]. Likewise an empty or truncated
/// receive is a [`crate::ring::Recv`] variant, not an error.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// I/O related errors (shm object creation, mmap, etc.)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Invalid arguments to an operation
    #[error("Invalid argument: {parameter} - {message}")]
    InvalidArgument { parameter: String, message: String },

    /// Invalid topic configuration handed to the builder
    #[error("Invalid config: {message}")]
    InvalidConfig { message: String },

    /// Requested topics do not fit in the region
    #[error("Out of space: layout needs {requested} bytes, region has {available}")]
    OutOfSpace { requested: u64, available: u64 },

    /// Topic not present in the region's topic table
    #[error("Topic not found: {name}")]
    TopicNotFound { name: String },

    /// Mapped object does not carry the region magic
    #[error("Bad region magic: {found:#010x}")]
    BadMagic { found: u32 },

    /// Region was built by an incompatible layout version
    #[error("Layout version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    /// Payload exceeds the slot capacity; no sequence is consumed
    #[error("Payload too large: {len} bytes, slot holds {capacity}")]
    PayloadTooLarge { len: usize, capacity: usize },

    /// Multi-writer safety spin exceeded its iteration cap
    #[error("Timed out waiting for slot after {iterations} iterations")]
    Timeout { iterations: u32 },

    /// Publisher-side rate limiter rejected the message
    #[error("Throttled by rate limiter")]
    Throttled,
}

impl BusError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create an I/O error with a bare message
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an out-of-space error
    pub fn out_of_space(requested: u64, available: u64) -> Self {
        Self::OutOfSpace {
            requested,
            available,
        }
    }

    /// Create a topic-not-found error
    pub fn topic_not_found(name: impl Into<String>) -> Self {
        Self::TopicNotFound { name: name.into() }
    }

    /// Create a payload-too-large error
    pub fn payload_too_large(len: usize, capacity: usize) -> Self {
        Self::PayloadTooLarge { len, capacity }
    }
}

impl From<std::io::Error> for BusError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}

impl From<nix::Error> for BusError {
    fn from(err: nix::Error) -> Self {
        Self::from_io(
            std::io::Error::from_raw_os_error(err as i32),
            "OS call failed",
        )
    }
}

impl From<serde_json::Error> for BusError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_config(format!("config parse error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BusError::topic_not_found("imu");
        assert!(matches!(err, BusError::TopicNotFound { .. }));

        let err = BusError::out_of_space(8192, 4096);
        assert!(matches!(err, BusError::OutOfSpace { .. }));

        let err = BusError::payload_too_large(100, 40);
        assert!(matches!(err, BusError::PayloadTooLarge { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = BusError::BadMagic { found: 0xdeadbeef };
        let display = format!("{}", err);
        assert!(display.contains("0xdeadbeef"));

        let err = BusError::invalid_config("slot count must be at least 1");
        assert!(format!("{}", err).contains("slot count"));
    }
}
