//! Sync-first camera registry
//!
//! Owns a multi-threaded tokio runtime and one [`ConnectionHandle`] per
//! camera. Every method is synchronous; the ones that stop connections
//! block the calling thread until the shutdown protocol has finished. That
//! wait runs on the caller's clock, not the runtime's, so it holds even when
//! every worker is stuck in a device host callback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use camwatch_stream::{
    AlarmState, CameraConfig, CameraConnection, ConnectionHandle, ConnectionPhase, DeviceId,
    ShutdownOutcome, StatusSink, StreamConfig,
};
use parking_lot::RwLock;
use tokio::runtime::{Handle, Runtime};

use crate::config::ManagerConfig;
use crate::error::Result;
use crate::host::{DeviceHost, HostSink};

struct ConnectionEntry {
    camera: CameraConfig,
    connection: ConnectionHandle,
}

/// Live connections keyed by device id
///
/// Methods that stop connections (`add_device` when replacing,
/// `delete_device`, `shutdown_all`) block the calling thread for up to one
/// shutdown grace period. From async code, call them through
/// `tokio::task::spawn_blocking`.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use camwatch_manager::{CameraRegistry, InMemoryHost};
/// use camwatch_stream::{CameraConfig, DeviceId};
///
/// let host = Arc::new(InMemoryHost::new());
/// let registry = CameraRegistry::new(host.clone())?;
///
/// registry.add_device(DeviceId::new(1), CameraConfig::new("192.168.1.64", "admin", "secret"));
/// println!("{:?}", registry.get_status(DeviceId::new(1)));
///
/// registry.delete_device(DeviceId::new(1));
/// ```
pub struct CameraRegistry {
    /// Taken in `Drop` so it can be shut down without blocking forever
    runtime: Option<Runtime>,
    handle: Handle,
    config: StreamConfig,
    host: Arc<dyn DeviceHost>,
    sink: Arc<dyn StatusSink>,
    connections: RwLock<HashMap<DeviceId, ConnectionEntry>>,
}

impl CameraRegistry {
    /// Create a registry with default configuration
    pub fn new(host: Arc<dyn DeviceHost>) -> Result<Self> {
        Self::with_config(ManagerConfig::default(), host)
    }

    pub fn with_config(config: ManagerConfig, host: Arc<dyn DeviceHost>) -> Result<Self> {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name("camwatch-connection")
            .enable_all()
            .build()?;

        tracing::debug!(
            "Started camera registry with {} worker threads",
            config.worker_threads
        );

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            config: config.stream,
            sink: Arc::new(HostSink::new(Arc::clone(&host))),
            host,
            connections: RwLock::new(HashMap::new()),
        })
    }

    /// Start streaming alarms for a camera.
    ///
    /// Returns as soon as the connection task is spawned; an unreachable or
    /// malformed address only shows up later as `AlarmState::Unknown` and
    /// log lines. An existing connection with the same id is shut down and
    /// replaced.
    pub fn add_device(&self, device_id: DeviceId, camera: CameraConfig) {
        let previous = self.connections.write().remove(&device_id);
        if let Some(previous) = previous {
            tracing::info!(
                "Replacing {} ({}) with {}",
                previous.camera.address,
                device_id,
                camera.address
            );
            self.stop(previous);
        }

        let connection = CameraConnection::spawn_on(
            &self.handle,
            device_id,
            camera.clone(),
            self.config.clone(),
            Arc::clone(&self.sink),
        );

        // A concurrent add of the same id may have won the race
        let displaced = self
            .connections
            .write()
            .insert(device_id, ConnectionEntry { camera, connection });
        if let Some(displaced) = displaced {
            self.stop(displaced);
        }
    }

    /// Stop and forget a camera.
    ///
    /// Blocks until the connection has exited or was forced down. Unknown
    /// ids are ignored and return `None`.
    pub fn delete_device(&self, device_id: DeviceId) -> Option<ShutdownOutcome> {
        let entry = self.connections.write().remove(&device_id)?;
        tracing::info!("Removing {} ({})", entry.camera.address, device_id);
        Some(self.stop(entry))
    }

    /// Stop every connection and empty the registry.
    ///
    /// All connections are signalled first and then share one deadline, so
    /// the whole call takes at most one grace period however many cameras
    /// are wedged.
    pub fn shutdown_all(&self) {
        let entries: Vec<ConnectionEntry> = self
            .connections
            .write()
            .drain()
            .map(|(_, entry)| entry)
            .collect();

        if entries.is_empty() {
            return;
        }

        for entry in &entries {
            entry.connection.signal_shutdown();
        }

        let total = entries.len();
        let deadline = Instant::now() + self.config.shutdown_grace;
        let forced = entries
            .into_iter()
            .map(|entry| entry.connection.shutdown_by(deadline))
            .filter(|outcome| *outcome == ShutdownOutcome::Forced)
            .count();

        if forced > 0 {
            tracing::warn!("Stopped {} connections, {} forced", total, forced);
        } else {
            tracing::info!("Stopped {} connections", total);
        }
    }

    /// Last decoded alarm state, or `None` for an unknown id.
    ///
    /// Reads the value the connection last published; never touches the
    /// network.
    pub fn get_status(&self, device_id: DeviceId) -> Option<AlarmState> {
        self.connections
            .read()
            .get(&device_id)
            .map(|entry| entry.connection.status())
    }

    /// Display names for every camera.
    ///
    /// Names come from the host, falling back to the camera address. Two
    /// cameras sharing a name collapse into one entry.
    pub fn list_names(&self) -> HashMap<String, DeviceId> {
        // Query the host without holding the registry lock
        let snapshot: Vec<(DeviceId, String)> = self
            .connections
            .read()
            .iter()
            .map(|(id, entry)| (*id, entry.camera.address.clone()))
            .collect();

        snapshot
            .into_iter()
            .map(|(id, address)| (self.host.device_name(id).unwrap_or(address), id))
            .collect()
    }

    /// Registered ids in ascending order
    pub fn device_ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.connections.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    pub fn contains(&self, device_id: DeviceId) -> bool {
        self.connections.read().contains_key(&device_id)
    }

    /// What a camera's connection loop is doing right now
    pub fn phase(&self, device_id: DeviceId) -> Option<ConnectionPhase> {
        self.connections
            .read()
            .get(&device_id)
            .map(|entry| entry.connection.phase())
    }

    /// Configuration a camera was added with
    pub fn camera(&self, device_id: DeviceId) -> Option<CameraConfig> {
        self.connections
            .read()
            .get(&device_id)
            .map(|entry| entry.camera.clone())
    }

    fn stop(&self, entry: ConnectionEntry) -> ShutdownOutcome {
        entry.connection.shutdown_blocking()
    }
}

impl Drop for CameraRegistry {
    fn drop(&mut self) {
        if Handle::try_current().is_ok() {
            // Never block an async caller; dropping the handles signals the
            // tasks and the runtime is torn down in the background.
            self.connections.get_mut().clear();
            if let Some(runtime) = self.runtime.take() {
                runtime.shutdown_background();
            }
            return;
        }

        self.shutdown_all();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(self.config.shutdown_grace);
        }
    }
}

impl std::fmt::Debug for CameraRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let connections = self.connections.read();
        let mut devices: Vec<_> = connections.values().map(|entry| &entry.connection).collect();
        devices.sort_by_key(|connection| connection.device_id());

        f.debug_struct("CameraRegistry")
            .field("config", &self.config)
            .field("connections", &devices)
            .finish()
    }
}
