//! Per-camera connection state machine.
//!
//! Each camera gets one tokio task that loops through
//! `Connecting -> Sending -> Receiving -> Backoff` until it is told to stop.
//! All socket I/O, buffering and decoding happen inside that task; callers
//! only see the [`ConnectionHandle`].

use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::request::build_stream_request;
use crate::tracker::{AlarmTracker, StatusSink};
use crate::types::{AlarmState, CameraConfig, ConnectionPhase, DeviceId};

/// How a connection ended when asked to shut down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The task observed the signal and exited within the grace period
    Graceful,
    /// The task did not exit in time and was aborted
    Forced,
}

/// One camera's event stream subscription.
///
/// Owned by its task; construct and start it with [`CameraConnection::spawn`]
/// or [`CameraConnection::spawn_on`].
pub struct CameraConnection {
    device_id: DeviceId,
    camera: CameraConfig,
    config: StreamConfig,
    socket: Option<TcpStream>,
    tracker: AlarmTracker,
    phase_tx: watch::Sender<ConnectionPhase>,
}

impl CameraConnection {
    /// Start a connection on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn(
        device_id: DeviceId,
        camera: CameraConfig,
        config: StreamConfig,
        sink: Arc<dyn StatusSink>,
    ) -> ConnectionHandle {
        Self::spawn_on(&Handle::current(), device_id, camera, config, sink)
    }

    /// Start a connection on the given runtime.
    ///
    /// Returns immediately; connection failures are retried inside the task
    /// and never reported to the caller.
    pub fn spawn_on(
        runtime: &Handle,
        device_id: DeviceId,
        camera: CameraConfig,
        config: StreamConfig,
        sink: Arc<dyn StatusSink>,
    ) -> ConnectionHandle {
        let tracker = AlarmTracker::new(device_id, camera.address.clone(), sink);
        let status_rx = tracker.subscribe();
        let (phase_tx, phase_rx) = watch::channel(ConnectionPhase::Idle);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let address = camera.address.clone();
        let shutdown_grace = config.shutdown_grace;

        // Disconnects once the task future is gone: finished, panicked or
        // aborted. Lets callers wait without the connection runtime's timer.
        let (exit_tx, exit_rx) = mpsc::channel::<()>();

        let connection = Self {
            device_id,
            camera,
            config,
            socket: None,
            tracker,
            phase_tx,
        };
        let task = runtime.spawn(async move {
            let _exit = exit_tx;
            connection.run(shutdown_rx).await;
        });

        ConnectionHandle {
            device_id,
            address,
            status_rx,
            phase_rx,
            shutdown_tx,
            shutdown_grace,
            exited: Arc::new(Mutex::new(exit_rx)),
            task,
        }
    }

    /// Main loop: one stream session per iteration until shutdown
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Starting alarm stream for {} ({})",
            self.camera.address,
            self.device_id
        );

        let mut failed_attempts: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let result = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                result = self.stream_session(&mut failed_attempts) => result,
            };

            if let Err(e) = result {
                self.log_session_end(&e, failed_attempts);
            }

            self.close_socket();
            self.tracker.set_state(AlarmState::Unknown);
            self.set_phase(ConnectionPhase::Backoff);

            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = tokio::time::sleep(self.config.backoff_delay) => {}
            }
        }

        self.close_socket();
        self.set_phase(ConnectionPhase::Idle);
        tracing::info!(
            "Alarm stream for {} ({}) stopped",
            self.camera.address,
            self.device_id
        );
    }

    /// Connect, send the request, then read until the stream fails.
    ///
    /// Only ever returns an error; a healthy stream is read forever.
    async fn stream_session(&mut self, failed_attempts: &mut u32) -> Result<()> {
        self.tracker.clear_buffer();

        self.set_phase(ConnectionPhase::Connecting);
        *failed_attempts += 1;
        let socket = self.connect().await?;

        if *failed_attempts > 1 {
            tracing::info!(
                "Reconnected to {} ({}) after {} attempts",
                self.camera.address,
                self.device_id,
                failed_attempts
            );
        } else {
            tracing::info!("Connected to {} ({})", self.camera.address, self.device_id);
        }
        *failed_attempts = 0;

        let socket = self.socket.insert(socket);

        self.phase_tx.send_replace(ConnectionPhase::Sending);
        let request = build_stream_request(&self.camera);
        tokio::time::timeout(self.config.read_wait, socket.write_all(request.as_bytes()))
            .await
            .map_err(|_| std::io::Error::from(std::io::ErrorKind::TimedOut))??;
        self.tracker.mark_alive();

        self.phase_tx.send_replace(ConnectionPhase::Receiving);
        loop {
            let stale_at = self.tracker.last_message() + self.config.staleness_window;
            let wait_until = (Instant::now() + self.config.read_wait).min(stale_at);

            let buffer = self.tracker.buffer_mut();
            buffer.reserve(self.config.read_chunk_size);

            match tokio::time::timeout_at(wait_until, socket.read_buf(buffer)).await {
                Ok(Ok(0)) => return Err(StreamError::PeerClosed),
                Ok(Ok(n)) => {
                    tracing::trace!("Read {} bytes from {}", n, self.camera.address);
                    self.tracker.drain();

                    if self.tracker.buffered().len() > self.config.max_buffer_bytes {
                        return Err(StreamError::BufferOverflow {
                            limit: self.config.max_buffer_bytes,
                        });
                    }
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {}
            }

            let elapsed = self.tracker.last_message().elapsed();
            if elapsed >= self.config.staleness_window {
                return Err(StreamError::Stalled { elapsed });
            }
        }
    }

    async fn connect(&self) -> Result<TcpStream> {
        let target = (self.camera.address.as_str(), self.config.port);

        match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(target)).await {
            Ok(Ok(socket)) => Ok(socket),
            Ok(Err(source)) => Err(StreamError::Connect {
                address: self.camera.address.clone(),
                source,
            }),
            Err(_) => Err(StreamError::ConnectTimeout {
                address: self.camera.address.clone(),
                timeout: self.config.connect_timeout,
            }),
        }
    }

    fn log_session_end(&self, error: &StreamError, failed_attempts: u32) {
        match error {
            // Unreachable cameras retry every backoff; only the first failure is loud
            StreamError::Connect { .. } | StreamError::ConnectTimeout { .. } => {
                if failed_attempts <= 1 {
                    tracing::warn!("{} ({}): {}, retrying", self.camera.address, self.device_id, error);
                } else {
                    tracing::debug!(
                        "{} ({}): {} (attempt {})",
                        self.camera.address,
                        self.device_id,
                        error,
                        failed_attempts
                    );
                }
            }
            _ => {
                tracing::warn!(
                    "Disconnected from {} ({}): {}, reconnecting",
                    self.camera.address,
                    self.device_id,
                    error
                );
            }
        }
    }

    fn close_socket(&mut self) {
        if self.socket.take().is_some() {
            tracing::debug!("Closed socket to {} ({})", self.camera.address, self.device_id);
        }
    }

    fn set_phase(&self, phase: ConnectionPhase) {
        self.phase_tx.send_replace(phase);
    }
}

/// Resolves once shutdown is signalled or the handle is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Caller-side view of a running [`CameraConnection`].
///
/// Dropping the handle signals the task to stop but does not wait for it;
/// use [`ConnectionHandle::shutdown`] or
/// [`ConnectionHandle::shutdown_blocking`] to wait.
///
/// Waiting never relies on the timer of the runtime the connection runs on,
/// so a connection wedged inside its status sink is still forced down on
/// time.
pub struct ConnectionHandle {
    device_id: DeviceId,
    address: String,
    status_rx: watch::Receiver<AlarmState>,
    phase_rx: watch::Receiver<ConnectionPhase>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_grace: Duration,
    exited: Arc<Mutex<mpsc::Receiver<()>>>,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Last decoded alarm state; never waits on the network
    pub fn status(&self) -> AlarmState {
        *self.status_rx.borrow()
    }

    /// What the connection loop is doing right now
    pub fn phase(&self) -> ConnectionPhase {
        *self.phase_rx.borrow()
    }

    /// Whether the task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask the task to stop without waiting for it.
    ///
    /// Lets a caller signal many connections before waiting on any of them.
    pub fn signal_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Stop the connection using the configured grace period
    pub async fn shutdown(self) -> ShutdownOutcome {
        let grace = self.shutdown_grace;
        self.shutdown_with_grace(grace).await
    }

    /// Stop the connection.
    ///
    /// Signals the task, then waits up to `grace` for it to close its socket
    /// and exit. A task still running at the deadline is aborted and left
    /// to unwind on its own; the call does not wait for that.
    pub async fn shutdown_with_grace(self, grace: Duration) -> ShutdownOutcome {
        self.signal_shutdown();

        let exited = Arc::clone(&self.exited);
        let deadline = std::time::Instant::now() + grace;
        let stopped = tokio::task::spawn_blocking(move || wait_for_exit(&exited, deadline))
            .await
            .unwrap_or(false);

        self.finish(stopped, grace)
    }

    /// Blocking form of [`ConnectionHandle::shutdown`] for callers outside
    /// any async context
    pub fn shutdown_blocking(self) -> ShutdownOutcome {
        let deadline = std::time::Instant::now() + self.shutdown_grace;
        self.shutdown_by(deadline)
    }

    /// Stop the connection, waiting on the calling thread until `deadline`.
    ///
    /// Callers stopping many connections signal them all first and then
    /// share one deadline, so the total wait is one grace period.
    pub fn shutdown_by(self, deadline: std::time::Instant) -> ShutdownOutcome {
        self.signal_shutdown();
        let grace = deadline.saturating_duration_since(std::time::Instant::now());
        let stopped = wait_for_exit(&self.exited, deadline);
        self.finish(stopped, grace)
    }

    fn finish(&self, stopped: bool, grace: Duration) -> ShutdownOutcome {
        if stopped {
            tracing::debug!("Connection to {} ({}) shut down", self.address, self.device_id);
            return ShutdownOutcome::Graceful;
        }

        self.task.abort();
        tracing::warn!(
            "Connection to {} ({}) did not stop within {:?}, aborted",
            self.address,
            self.device_id,
            grace
        );
        ShutdownOutcome::Forced
    }
}

/// Block until the task behind `exited` is gone or `deadline` passes.
///
/// Returns true if the task exited in time.
fn wait_for_exit(exited: &Mutex<mpsc::Receiver<()>>, deadline: std::time::Instant) -> bool {
    let Ok(exited) = exited.lock() else {
        return false;
    };
    let remaining = deadline.saturating_duration_since(std::time::Instant::now());

    // The sender is never used; only its drop matters
    matches!(
        exited.recv_timeout(remaining),
        Err(mpsc::RecvTimeoutError::Disconnected)
    )
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("device_id", &self.device_id)
            .field("address", &self.address)
            .field("status", &self.status())
            .field("phase", &self.phase())
            .finish()
    }
}
