//! Configuration types for the camwatch-stream crate
//!
//! This module defines the timing and sizing knobs of a camera connection:
//! connect and read deadlines, the staleness window, reconnect backoff and
//! the shutdown grace period.

use std::time::Duration;

use crate::error::StreamError;

/// Configuration shared by every camera connection
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// TCP port of the camera event stream
    /// Default: 80
    pub port: u16,

    /// Upper bound on a single connection attempt
    /// Default: 5 seconds
    pub connect_timeout: Duration,

    /// Upper bound on a single wait for readable data
    /// Default: 5 seconds
    pub read_wait: Duration,

    /// Maximum gap between decoded messages before the stream is presumed dead
    /// Default: 2 seconds
    pub staleness_window: Duration,

    /// Pause between closing a failed connection and the next attempt
    /// Default: 100 milliseconds
    pub backoff_delay: Duration,

    /// Time a connection gets to stop on its own before it is aborted
    /// Default: 1 second
    pub shutdown_grace: Duration,

    /// Number of bytes requested per socket read
    /// Default: 4096
    pub read_chunk_size: usize,

    /// Cap on buffered bytes that do not yet form a complete message
    /// Default: 1 MiB
    pub max_buffer_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            port: 80,
            connect_timeout: Duration::from_secs(5),
            read_wait: Duration::from_secs(5),
            staleness_window: Duration::from_secs(2),
            backoff_delay: Duration::from_millis(100),
            shutdown_grace: Duration::from_secs(1),
            read_chunk_size: 4096,
            max_buffer_bytes: 1024 * 1024,
        }
    }
}

impl StreamConfig {
    /// Create a new StreamConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a StreamConfig with tight timings, for cameras on a local segment
    pub fn fast_reconnect() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            read_wait: Duration::from_millis(500),
            staleness_window: Duration::from_millis(750),
            backoff_delay: Duration::from_millis(50),
            shutdown_grace: Duration::from_millis(500),
            ..Default::default()
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.port == 0 {
            return Err(StreamError::Configuration(
                "Port must be greater than 0".to_string(),
            ));
        }

        let durations = [
            ("Connect timeout", self.connect_timeout),
            ("Read wait", self.read_wait),
            ("Staleness window", self.staleness_window),
            ("Shutdown grace", self.shutdown_grace),
        ];
        for (name, value) in durations {
            if value == Duration::ZERO {
                return Err(StreamError::Configuration(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if self.read_chunk_size == 0 {
            return Err(StreamError::Configuration(
                "Read chunk size must be greater than 0".to_string(),
            ));
        }

        if self.max_buffer_bytes < self.read_chunk_size {
            return Err(StreamError::Configuration(
                "Max buffer size must be at least one read chunk".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder pattern methods for fluent configuration

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_wait(mut self, wait: Duration) -> Self {
        self.read_wait = wait;
        self
    }

    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    pub fn with_backoff_delay(mut self, delay: Duration) -> Self {
        self.backoff_delay = delay;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    pub fn with_max_buffer_bytes(mut self, limit: usize) -> Self {
        self.max_buffer_bytes = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.port, 80);
        assert_eq!(config.read_wait, Duration::from_secs(5));
        assert_eq!(config.staleness_window, Duration::from_secs(2));
        assert_eq!(config.backoff_delay, Duration::from_millis(100));
        assert_eq!(config.shutdown_grace, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let invalid_port = StreamConfig {
            port: 0,
            ..Default::default()
        };
        assert!(invalid_port.validate().is_err());

        let invalid_window = StreamConfig {
            staleness_window: Duration::ZERO,
            ..Default::default()
        };
        let err = invalid_window.validate().unwrap_err();
        assert!(err.to_string().contains("Staleness window"));

        let invalid_buffer = StreamConfig {
            read_chunk_size: 4096,
            max_buffer_bytes: 1024,
            ..Default::default()
        };
        assert!(invalid_buffer.validate().is_err());
    }

    #[test]
    fn test_zero_backoff_is_allowed() {
        let config = StreamConfig::new().with_backoff_delay(Duration::ZERO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_presets() {
        let fast = StreamConfig::fast_reconnect();
        assert!(fast.staleness_window < StreamConfig::default().staleness_window);
        assert_eq!(fast.port, 80);
        assert!(fast.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = StreamConfig::new()
            .with_port(8080)
            .with_connect_timeout(Duration::from_secs(2))
            .with_read_wait(Duration::from_secs(1))
            .with_staleness_window(Duration::from_millis(300))
            .with_backoff_delay(Duration::from_millis(20))
            .with_shutdown_grace(Duration::from_millis(250))
            .with_read_chunk_size(1024)
            .with_max_buffer_bytes(64 * 1024);

        assert_eq!(config.port, 8080);
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.staleness_window, Duration::from_millis(300));
        assert_eq!(config.shutdown_grace, Duration::from_millis(250));
        assert_eq!(config.read_chunk_size, 1024);
        assert_eq!(config.max_buffer_bytes, 64 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_chunk_size_checked_against_buffer_cap() {
        let zero = StreamConfig::new().with_read_chunk_size(0);
        assert!(zero.validate().is_err());

        let too_big = StreamConfig::new()
            .with_read_chunk_size(8192)
            .with_max_buffer_bytes(4096);
        let err = too_big.validate().unwrap_err();
        assert!(err.to_string().contains("Max buffer size"));
    }
}
