//! # camwatch-manager
//!
//! Sync-first registry of camera alarm streams.
//!
//! [`CameraRegistry`] owns a background tokio runtime and one
//! [`camwatch_stream::CameraConnection`] per camera. Hosts drive it with
//! plain blocking calls and receive alarm changes through the
//! [`DeviceHost`] trait; no `.await` is needed anywhere.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use camwatch_manager::{CameraRegistry, InMemoryHost};
//! use camwatch_stream::{CameraConfig, DeviceId};
//!
//! camwatch_manager::logging::init_logging_from_env()?;
//!
//! let host = Arc::new(InMemoryHost::new().with_name(DeviceId::new(1), "Front door"));
//! let registry = CameraRegistry::new(host.clone())?;
//! registry.add_device(DeviceId::new(1), CameraConfig::new("192.168.1.64", "admin", "secret"));
//!
//! while let Some(change) = host.recv_change_timeout(Duration::from_secs(5)) {
//!     println!("{} -> {}", change.device_id, change.state);
//! }
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod registry;

pub use config::ManagerConfig;
pub use error::{ManagerError, Result};
pub use host::{DeviceHost, InMemoryHost, StatusChange};
pub use registry::CameraRegistry;

// Types hosts need alongside the registry
pub use camwatch_stream::{
    AlarmState, CameraConfig, ConnectionPhase, DeviceId, ShutdownOutcome, StreamConfig,
};
