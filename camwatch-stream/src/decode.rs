//! Event document decoding and alarm classification.
//!
//! Framing only guarantees that a document sits between the two literal
//! markers, not that it is well-formed XML. Real cameras also emit bare
//! attributes and namespaced elements, so documents are walked with the
//! event-based reader: attributes are never validated, namespace prefixes
//! are ignored, and mismatched end tags are tolerated. Only the first
//! `eventType` and `eventState` values matter.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::DecodeError;
use crate::types::AlarmState;

/// Event type that, together with [`INACTIVE_STATE`], means "no alarm"
pub const VIDEO_LOSS_TYPE: &str = "videoloss";

/// Event state that, together with [`VIDEO_LOSS_TYPE`], means "no alarm"
pub const INACTIVE_STATE: &str = "inactive";

/// The fields of one event document that drive classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmEvent {
    /// Text of `<eventType>`
    pub event_type: String,
    /// Text of `<eventState>`
    pub event_state: String,
    /// Text of `<channelID>`, when present
    pub channel_id: Option<String>,
    /// Text of `<dateTime>`, when present
    pub date_time: Option<String>,
}

#[derive(Clone, Copy)]
enum Field {
    EventType,
    EventState,
    ChannelId,
    DateTime,
}

impl Field {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"eventType" => Some(Field::EventType),
            b"eventState" => Some(Field::EventState),
            b"channelID" => Some(Field::ChannelId),
            b"dateTime" => Some(Field::DateTime),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Fields {
    event_type: Option<String>,
    event_state: Option<String>,
    channel_id: Option<String>,
    date_time: Option<String>,
}

impl Fields {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::EventType => &mut self.event_type,
            Field::EventState => &mut self.event_state,
            Field::ChannelId => &mut self.channel_id,
            Field::DateTime => &mut self.date_time,
        }
    }

    fn has_required(&self) -> bool {
        self.event_type.is_some() && self.event_state.is_some()
    }
}

impl AlarmEvent {
    /// Decode one framed document.
    pub fn from_xml(document: &[u8]) -> Result<Self, DecodeError> {
        let xml = std::str::from_utf8(document)?;
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        reader.check_end_names(false);

        let mut fields = Fields::default();
        let mut current: Option<Field> = None;

        loop {
            match reader.read_event()? {
                Event::Start(element) => {
                    current = Field::from_local_name(element.local_name().as_ref());
                }
                Event::Empty(element) => {
                    if let Some(field) = Field::from_local_name(element.local_name().as_ref()) {
                        fields.slot(field).get_or_insert_with(String::new);
                    }
                }
                Event::Text(text) => {
                    if let Some(field) = current {
                        let value = text.unescape()?;
                        fields
                            .slot(field)
                            .get_or_insert_with(|| value.trim().to_string());
                    }
                }
                Event::CData(data) => {
                    if let Some(field) = current {
                        let value = String::from_utf8_lossy(&data).trim().to_string();
                        fields.slot(field).get_or_insert(value);
                    }
                }
                Event::End(_) => {
                    // An element with no text still counts as present, with an empty value
                    if let Some(field) = current.take() {
                        fields.slot(field).get_or_insert_with(String::new);
                    }
                }
                Event::Eof => break,
                _ => {}
            }

            if fields.has_required() && current.is_none() {
                break;
            }
        }

        Ok(Self {
            event_type: fields
                .event_type
                .ok_or(DecodeError::MissingField("eventType"))?,
            event_state: fields
                .event_state
                .ok_or(DecodeError::MissingField("eventState"))?,
            channel_id: fields.channel_id,
            date_time: fields.date_time,
        })
    }

    /// Classify this event.
    ///
    /// Only an explicit inactive video-loss event means "no motion"; every
    /// other combination, including unknown types, is reported as motion.
    pub fn alarm_state(&self) -> AlarmState {
        classify(&self.event_type, &self.event_state)
    }
}

/// Classify an `(eventType, eventState)` pair
pub fn classify(event_type: &str, event_state: &str) -> AlarmState {
    if event_type == VIDEO_LOSS_TYPE && event_state == INACTIVE_STATE {
        AlarmState::NoMotion
    } else {
        AlarmState::Motion
    }
}
