//! Core types for the camwatch-stream crate.

use std::fmt;

/// Host-assigned identifier for a camera.
///
/// Opaque to this crate; it only correlates a connection with its
/// representation in the device host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(u64);

impl DeviceId {
    /// Create a new DeviceId with the given value
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for DeviceId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device-{}", self.0)
    }
}

/// Last decoded motion-alarm status of a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AlarmState {
    /// No current information (never decoded, stalled, or undecodable)
    #[default]
    Unknown = 0,
    /// The camera reported an inactive video-loss event
    NoMotion = 1,
    /// Any other event
    Motion = 2,
}

impl AlarmState {
    /// Small-integer form used by hosts that poll status values
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<AlarmState> for u8 {
    fn from(state: AlarmState) -> Self {
        state.as_u8()
    }
}

impl TryFrom<u8> for AlarmState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AlarmState::Unknown),
            1 => Ok(AlarmState::NoMotion),
            2 => Ok(AlarmState::Motion),
            other => Err(other),
        }
    }
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlarmState::Unknown => write!(f, "unknown"),
            AlarmState::NoMotion => write!(f, "no motion"),
            AlarmState::Motion => write!(f, "motion"),
        }
    }
}

/// What the connection's execution loop is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionPhase {
    /// Constructed but the loop has not started yet
    #[default]
    Idle,
    /// Dialling the camera
    Connecting,
    /// Writing the stream request
    Sending,
    /// Reading and decoding the event stream
    Receiving,
    /// Pausing before the next connection attempt
    Backoff,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionPhase::Idle => "idle",
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::Sending => "sending",
            ConnectionPhase::Receiving => "receiving",
            ConnectionPhase::Backoff => "backoff",
        };
        f.write_str(name)
    }
}

/// Address and credentials of one camera.
///
/// The address is not validated here. A malformed or unreachable address
/// surfaces as repeated connect failures inside the connection loop.
#[derive(Clone, PartialEq, Eq)]
pub struct CameraConfig {
    /// Host name or IP address of the camera
    pub address: String,
    /// Basic-auth user name
    pub username: String,
    /// Basic-auth password
    pub password: String,
}

impl CameraConfig {
    /// Create a new camera configuration.
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for CameraConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraConfig")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
