//! # camwatch-stream
//!
//! A micro-crate that keeps one camera's motion-alarm event stream open and
//! turns it into discrete alarm state changes.
//!
//! Each [`CameraConnection`] runs as its own tokio task: it dials the camera,
//! requests the alert stream with Basic authentication, cuts the unbounded
//! response into XML documents ([`EventFramer`]), classifies each one
//! ([`AlarmEvent`]) and reports changes to a [`StatusSink`]. Stalls and
//! transport faults reset the state to `Unknown` and trigger a reconnect,
//! forever, until the [`ConnectionHandle`] is shut down.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use camwatch_stream::{AlarmState, CameraConfig, CameraConnection, DeviceId, StreamConfig};
//!
//! let sink = Arc::new(|id: DeviceId, state: AlarmState| println!("{id}: {state}"));
//! let handle = CameraConnection::spawn(
//!     DeviceId::new(1),
//!     CameraConfig::new("192.168.1.64", "admin", "secret"),
//!     StreamConfig::default(),
//!     sink,
//! );
//!
//! // later
//! let outcome = handle.shutdown().await;
//! ```

pub mod config;
pub mod connection;
pub mod decode;
pub mod error;
pub mod framing;
pub mod request;
pub mod tracker;
pub mod types;

pub use config::StreamConfig;
pub use connection::{CameraConnection, ConnectionHandle, ShutdownOutcome};
pub use decode::{classify, AlarmEvent};
pub use error::{DecodeError, Result, StreamError};
pub use framing::EventFramer;
pub use request::build_stream_request;
pub use tracker::{AlarmTracker, StatusSink};
pub use types::{AlarmState, CameraConfig, ConnectionPhase, DeviceId};
