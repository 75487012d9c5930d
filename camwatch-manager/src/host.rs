//! The device host: the process that owns camera identities and consumes
//! alarm state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, SystemTime};

use camwatch_stream::{AlarmState, DeviceId, StatusSink};
use parking_lot::{Mutex, RwLock};

/// Receiver of alarm state changes and source of display names.
///
/// `set_alarm_state` is called from connection tasks, once per change and in
/// decode order for a given device. Implementations should return quickly; a
/// host that blocks here stalls that camera's connection until it returns.
pub trait DeviceHost: Send + Sync + 'static {
    fn set_alarm_state(&self, device_id: DeviceId, state: AlarmState);

    /// Display name for a device, if the host knows one
    fn device_name(&self, device_id: DeviceId) -> Option<String>;
}

/// Routes connection notifications into a [`DeviceHost`]
pub(crate) struct HostSink {
    host: Arc<dyn DeviceHost>,
}

impl HostSink {
    pub(crate) fn new(host: Arc<dyn DeviceHost>) -> Self {
        Self { host }
    }
}

impl StatusSink for HostSink {
    fn status_changed(&self, device_id: DeviceId, state: AlarmState) {
        self.host.set_alarm_state(device_id, state);
    }
}

/// One reported alarm state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub device_id: DeviceId,
    pub state: AlarmState,
    pub at: SystemTime,
}

/// A [`DeviceHost`] that keeps names and the latest states in memory and
/// queues every change for consumers.
///
/// ```rust,ignore
/// let host = Arc::new(InMemoryHost::new().with_name(DeviceId::new(1), "Front door"));
/// let registry = CameraRegistry::new(host.clone())?;
///
/// while let Some(change) = host.recv_change_timeout(Duration::from_secs(1)) {
///     println!("{} is now {}", change.device_id, change.state);
/// }
/// ```
pub struct InMemoryHost {
    names: RwLock<HashMap<DeviceId, String>>,
    states: RwLock<HashMap<DeviceId, AlarmState>>,
    notifications: AtomicUsize,
    change_tx: mpsc::Sender<StatusChange>,
    change_rx: Mutex<mpsc::Receiver<StatusChange>>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        let (change_tx, change_rx) = mpsc::channel();
        Self {
            names: RwLock::new(HashMap::new()),
            states: RwLock::new(HashMap::new()),
            notifications: AtomicUsize::new(0),
            change_tx,
            change_rx: Mutex::new(change_rx),
        }
    }

    pub fn with_name(self, device_id: DeviceId, name: impl Into<String>) -> Self {
        self.set_name(device_id, name);
        self
    }

    pub fn set_name(&self, device_id: DeviceId, name: impl Into<String>) {
        self.names.write().insert(device_id, name.into());
    }

    pub fn remove_name(&self, device_id: DeviceId) -> Option<String> {
        self.names.write().remove(&device_id)
    }

    /// Latest state reported for a device; `None` until its first change
    pub fn state(&self, device_id: DeviceId) -> Option<AlarmState> {
        self.states.read().get(&device_id).copied()
    }

    /// Total number of changes reported across all devices
    pub fn notification_count(&self) -> usize {
        self.notifications.load(Ordering::SeqCst)
    }

    /// Wait up to `timeout` for the next queued change.
    ///
    /// Changes are queued in the order they were reported and each one is
    /// handed out once, whichever thread asks first.
    pub fn recv_change_timeout(&self, timeout: Duration) -> Option<StatusChange> {
        self.change_rx.lock().recv_timeout(timeout).ok()
    }

    /// Next queued change, if any, without waiting
    pub fn try_recv_change(&self) -> Option<StatusChange> {
        self.change_rx.lock().try_recv().ok()
    }
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceHost for InMemoryHost {
    fn set_alarm_state(&self, device_id: DeviceId, state: AlarmState) {
        self.states.write().insert(device_id, state);
        self.notifications.fetch_add(1, Ordering::SeqCst);

        // The receiver lives in self, so this cannot fail while we exist
        let _ = self.change_tx.send(StatusChange {
            device_id,
            state,
            at: SystemTime::now(),
        });
    }

    fn device_name(&self, device_id: DeviceId) -> Option<String> {
        self.names.read().get(&device_id).cloned()
    }
}

impl std::fmt::Debug for InMemoryHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryHost")
            .field("names", &*self.names.read())
            .field("states", &*self.states.read())
            .field("notifications", &self.notification_count())
            .finish()
    }
}
