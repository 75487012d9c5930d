//! Registry configuration

use camwatch_stream::StreamConfig;

use crate::error::{ManagerError, Result};

/// Configuration for a [`CameraRegistry`](crate::CameraRegistry)
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Settings applied to every camera connection
    pub stream: StreamConfig,

    /// Worker threads of the runtime that drives connection tasks
    /// Default: 2
    pub worker_threads: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            worker_threads: 2,
        }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        self.stream.validate()?;

        if self.worker_threads == 0 {
            return Err(ManagerError::InvalidConfiguration(
                "Worker threads must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }
}
