//! Message framing for the alert stream.
//!
//! The camera pushes a sequence of XML documents over one response body with
//! no length prefix. Each document opens with [`START_MARKER`] and closes with
//! [`END_MARKER`]; everything between two documents (HTTP headers, multipart
//! boundaries, whitespace) is noise and is discarded along with the next
//! document.

use bytes::{Bytes, BytesMut};

use crate::error::DecodeError;

/// Literal that opens an event document
pub const START_MARKER: &[u8] = b"<EventNotification";

/// Literal that closes an event document
pub const END_MARKER: &[u8] = b"</EventNotificationAlert>";

/// Accumulation buffer that cuts complete event documents out of a byte stream.
///
/// Bytes up to and including a document's end marker are removed from the
/// buffer as soon as that document is returned, whether or not it later
/// decodes, so a corrupt document can never wedge the stream.
#[derive(Debug, Default)]
pub struct EventFramer {
    buf: BytesMut,
}

impl EventFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Direct access to the buffer for `AsyncReadExt::read_buf`
    pub(crate) fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Cut the next complete document out of the buffer.
    ///
    /// Returns `None` when no end marker is buffered yet; nothing is consumed
    /// in that case. Otherwise the bytes through the end marker are consumed
    /// and the document spanning the closest preceding start marker to the
    /// end marker is returned. An end marker without a start marker before
    /// it yields [`DecodeError::MissingStartMarker`].
    pub fn next_frame(&mut self) -> Option<Result<Bytes, DecodeError>> {
        let end = find(&self.buf, END_MARKER)?;
        let start = rfind(&self.buf[..end], START_MARKER);

        let mut consumed = self.buf.split_to(end + END_MARKER.len());
        Some(match start {
            Some(start) => Ok(consumed.split_off(start).freeze()),
            None => Err(DecodeError::MissingStartMarker),
        })
    }

    /// Bytes buffered but not yet framed
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop everything buffered, e.g. before a fresh connection
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}
