//! Alarm state tracking for one camera.
//!
//! The tracker owns the accumulation buffer, turns complete documents into
//! alarm states, and forwards a state to the [`StatusSink`] only when it
//! differs from the one currently held.

use std::sync::Arc;

use bytes::BytesMut;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::decode::AlarmEvent;
use crate::framing::EventFramer;
use crate::types::{AlarmState, DeviceId};

/// Receiver of alarm state changes, typically the device host.
///
/// Called from the connection's task, once per actual change and in decode
/// order. Implementations should return quickly; a call that blocks stalls
/// that camera's stream until it returns.
pub trait StatusSink: Send + Sync + 'static {
    fn status_changed(&self, device_id: DeviceId, status: AlarmState);
}

impl<F> StatusSink for F
where
    F: Fn(DeviceId, AlarmState) + Send + Sync + 'static,
{
    fn status_changed(&self, device_id: DeviceId, status: AlarmState) {
        self(device_id, status)
    }
}

/// Decoded alarm state plus the bytes not yet framed.
pub struct AlarmTracker {
    device_id: DeviceId,
    address: String,
    framer: EventFramer,
    state: AlarmState,
    last_message: Instant,
    sink: Arc<dyn StatusSink>,
    status_tx: watch::Sender<AlarmState>,
}

impl AlarmTracker {
    /// Create a tracker in the `Unknown` state
    pub fn new(device_id: DeviceId, address: impl Into<String>, sink: Arc<dyn StatusSink>) -> Self {
        let (status_tx, _) = watch::channel(AlarmState::Unknown);
        Self {
            device_id,
            address: address.into(),
            framer: EventFramer::new(),
            state: AlarmState::Unknown,
            last_message: Instant::now(),
            sink,
            status_tx,
        }
    }

    /// Append received bytes and decode every complete document.
    ///
    /// Returns the number of documents that decoded to a classification.
    pub fn feed(&mut self, data: &[u8]) -> usize {
        self.framer.extend_from_slice(data);
        self.drain()
    }

    /// Decode every complete document already buffered.
    ///
    /// Returns the number of documents that decoded to a classification.
    /// Documents that fail to decode set the state to `Unknown` and are
    /// skipped.
    pub fn drain(&mut self) -> usize {
        let mut decoded = 0;

        while let Some(frame) = self.framer.next_frame() {
            match frame.and_then(|document| AlarmEvent::from_xml(&document)) {
                Ok(event) => {
                    decoded += 1;
                    self.last_message = Instant::now();
                    tracing::trace!(
                        "{} ({}) event {}/{} channel={:?} at {:?}",
                        self.address,
                        self.device_id,
                        event.event_type,
                        event.event_state,
                        event.channel_id,
                        event.date_time
                    );
                    self.set_state(event.alarm_state());
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to decode event from {} ({}): {}",
                        self.address,
                        self.device_id,
                        e
                    );
                    self.set_state(AlarmState::Unknown);
                }
            }
        }

        decoded
    }

    /// Record a new state, notifying the sink if it changed
    pub fn set_state(&mut self, state: AlarmState) {
        if state == self.state {
            return;
        }

        tracing::info!(
            "{} ({}) alarm state {} -> {}",
            self.address,
            self.device_id,
            self.state,
            state
        );

        self.state = state;
        self.status_tx.send_replace(state);
        self.notify(state);
    }

    /// Call the sink without tying up a runtime worker.
    ///
    /// On a multi-threaded runtime the call runs under `block_in_place`, so
    /// a sink that blocks wedges only this connection while timers and the
    /// other connections keep running. Elsewhere the sink is called inline.
    fn notify(&self, state: AlarmState) {
        let on_multi_thread = Handle::try_current()
            .map(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread)
            .unwrap_or(false);

        if on_multi_thread {
            tokio::task::block_in_place(|| self.sink.status_changed(self.device_id, state));
        } else {
            self.sink.status_changed(self.device_id, state);
        }
    }

    /// Start the staleness timer afresh, e.g. right after the request is sent
    pub fn mark_alive(&mut self) {
        self.last_message = Instant::now();
    }

    /// Drop buffered bytes left over from a previous connection
    pub fn clear_buffer(&mut self) {
        self.framer.clear();
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    /// When the last document decoded (or the timer was last restarted)
    pub fn last_message(&self) -> Instant {
        self.last_message
    }

    /// Bytes received but not yet framed
    pub fn buffered(&self) -> &[u8] {
        self.framer.as_bytes()
    }

    /// Watch the current state without going through the sink
    pub fn subscribe(&self) -> watch::Receiver<AlarmState> {
        self.status_tx.subscribe()
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut BytesMut {
        self.framer.buffer_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const MOTION: &str = "<EventNotificationAlert><eventType>VMD</eventType>\
        <eventState>active</eventState></EventNotificationAlert>";
    const NO_MOTION: &str = "<EventNotificationAlert><eventType>videoloss</eventType>\
        <eventState>inactive</eventState></EventNotificationAlert>";

    fn recording_tracker() -> (AlarmTracker, Arc<Mutex<Vec<AlarmState>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink = move |_: DeviceId, state: AlarmState| sink_seen.lock().unwrap().push(state);
        let tracker = AlarmTracker::new(DeviceId::new(1), "192.168.1.64", Arc::new(sink));
        (tracker, seen)
    }

    #[tokio::test]
    async fn test_two_motion_fragments_notify_once() {
        let (mut tracker, seen) = recording_tracker();

        let decoded = tracker.feed(format!("{}{}", MOTION, MOTION).as_bytes());

        assert_eq!(decoded, 2);
        assert_eq!(*seen.lock().unwrap(), vec![AlarmState::Motion]);
        assert_eq!(tracker.state(), AlarmState::Motion);
    }

    #[tokio::test]
    async fn test_garbage_fragment_tail_scenario() {
        let (mut tracker, seen) = recording_tracker();
        let stream = "garbage<EventNotification x><eventType>videoloss</eventType>\
                      <eventState>inactive</eventState></EventNotificationAlert>tail";

        assert_eq!(tracker.feed(stream.as_bytes()), 1);
        assert_eq!(*seen.lock().unwrap(), vec![AlarmState::NoMotion]);
        assert_eq!(tracker.buffered(), b"tail");
    }

    #[tokio::test]
    async fn test_redrain_does_not_renotify() {
        let (mut tracker, seen) = recording_tracker();
        tracker.feed(NO_MOTION.as_bytes());

        assert_eq!(tracker.drain(), 0);
        assert_eq!(tracker.feed(&[]), 0);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transitions_in_decode_order() {
        let (mut tracker, seen) = recording_tracker();

        tracker.feed(format!("{}{}{}{}", MOTION, NO_MOTION, NO_MOTION, MOTION).as_bytes());

        assert_eq!(
            *seen.lock().unwrap(),
            vec![AlarmState::Motion, AlarmState::NoMotion, AlarmState::Motion]
        );
    }

    #[tokio::test]
    async fn test_decode_failure_sets_unknown_and_continues() {
        let (mut tracker, seen) = recording_tracker();
        let broken = "<EventNotificationAlert><eventType>VMD</eventType></EventNotificationAlert>";

        let decoded = tracker.feed(format!("{}{}{}", MOTION, broken, MOTION).as_bytes());

        assert_eq!(decoded, 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![AlarmState::Motion, AlarmState::Unknown, AlarmState::Motion]
        );
    }

    #[tokio::test]
    async fn test_decode_updates_liveness_and_watch() {
        let (mut tracker, _seen) = recording_tracker();
        let status = tracker.subscribe();
        let before = tracker.last_message();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        tracker.feed(MOTION.as_bytes());

        assert!(tracker.last_message() > before);
        assert_eq!(*status.borrow(), AlarmState::Motion);
    }

    #[tokio::test]
    async fn test_partial_fragment_leaves_liveness_alone() {
        let (mut tracker, seen) = recording_tracker();
        let before = tracker.last_message();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert_eq!(tracker.feed(&MOTION.as_bytes()[..20]), 0);

        assert_eq!(tracker.last_message(), before);
        assert!(seen.lock().unwrap().is_empty());
    }
}
