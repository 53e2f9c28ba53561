//! Protobuf envelope encoding
//!
//! Binary frames carry a serialized `Envelope` message: the `type` tag plus a
//! `contents` oneof with one typed member per published object. Only the
//! fields the harness correlates on are declared; prost skips unknown fields,
//! so full server-side objects decode without change.
//!
//! Wire layout mirrored here (tags must track the platform's envelope schema):
//!
//! | tag | member         | payload              |
//! |-----|----------------|----------------------|
//! | 1   | `type`         | string               |
//! | 2   | `transmission` | [`TransmissionMessage`] |
//! | 3   | `incident`     | object, `id` = 1     |
//! | 4   | `device`       | object, `id` = 1     |
//! | 5   | `vessel`       | object, `id` = 1     |
//! | 6   | `fleet`        | object, `id` = 1     |
//! | 7   | `zone`         | object, `id` = 1     |
//! | 8   | `notice`       | object, `id` = 1     |
//! | 9   | `marker`       | object, `id` = 1     |
//! | 10  | `note`         | object, `id` = 1     |
//! | 11  | `sit`          | object, `id` = 1     |
//! | 12  | `session`      | session, no entity   |
//!
//! The member name becomes [`EntityUpdate::key`], matching the key the JSON
//! encoding nests the object under.

use super::{
    DecodeError, Destination, Envelope, EntityUpdate, Payload, Status, TransmissionRecord,
    TransmissionState,
};
use prost::{Message, Oneof};

#[derive(Clone, PartialEq, Message)]
pub struct EnvelopeMessage {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(oneof = "Contents", tags = "2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12")]
    pub contents: Option<Contents>,
}

#[derive(Clone, PartialEq, Oneof)]
pub enum Contents {
    #[prost(message, tag = "2")]
    Transmission(TransmissionMessage),
    #[prost(message, tag = "3")]
    Incident(ObjectMessage),
    #[prost(message, tag = "4")]
    Device(ObjectMessage),
    #[prost(message, tag = "5")]
    Vessel(ObjectMessage),
    #[prost(message, tag = "6")]
    Fleet(ObjectMessage),
    #[prost(message, tag = "7")]
    Zone(ObjectMessage),
    #[prost(message, tag = "8")]
    Notice(ObjectMessage),
    #[prost(message, tag = "9")]
    Marker(ObjectMessage),
    #[prost(message, tag = "10")]
    Note(ObjectMessage),
    #[prost(message, tag = "11")]
    Sit(ObjectMessage),
    #[prost(message, tag = "12")]
    Session(ObjectMessage),
}

impl Contents {
    /// Member name and object for entity members; `None` for transmissions
    /// and sessions.
    fn entity(&self) -> Option<(&'static str, &ObjectMessage)> {
        match self {
            Self::Incident(object) => Some(("incident", object)),
            Self::Device(object) => Some(("device", object)),
            Self::Vessel(object) => Some(("vessel", object)),
            Self::Fleet(object) => Some(("fleet", object)),
            Self::Zone(object) => Some(("zone", object)),
            Self::Notice(object) => Some(("notice", object)),
            Self::Marker(object) => Some(("marker", object)),
            Self::Note(object) => Some(("note", object)),
            Self::Sit(object) => Some(("sit", object)),
            Self::Transmission(_) | Self::Session(_) => None,
        }
    }

    fn from_entity(key: &str, object: ObjectMessage) -> Option<Self> {
        let contents = match key {
            "incident" => Self::Incident(object),
            "device" => Self::Device(object),
            "vessel" => Self::Vessel(object),
            "fleet" => Self::Fleet(object),
            "zone" => Self::Zone(object),
            "notice" => Self::Notice(object),
            "marker" => Self::Marker(object),
            "note" => Self::Note(object),
            "sit" => Self::Sit(object),
            _ => return None,
        };
        Some(contents)
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct TransmissionMessage {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub parent_id: String,
    #[prost(message, optional, tag = "3")]
    pub destination: Option<DestinationMessage>,
    #[prost(int32, tag = "4")]
    pub state: i32,
    #[prost(message, optional, tag = "5")]
    pub status: Option<StatusMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DestinationMessage {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(string, tag = "2")]
    pub id: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct StatusMessage {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}

/// Any published object; only its `id` is read.
#[derive(Clone, PartialEq, Message)]
pub struct ObjectMessage {
    #[prost(string, tag = "1")]
    pub id: String,
}

/// Decode a binary frame.
///
/// # Errors
///
/// Returns [`DecodeError`] when the bytes are not a valid message, the type is
/// empty, or the transmission state is outside the known enum.
pub fn decode(bytes: &[u8]) -> Result<Envelope, DecodeError> {
    let message = EnvelopeMessage::decode(bytes)?;
    if message.r#type.is_empty() {
        return Err(DecodeError::MissingType);
    }

    let payload = match message.contents {
        Some(Contents::Transmission(transmission)) => {
            Payload::Transmission(record_from_message(transmission)?)
        }
        Some(contents) => contents.entity().map_or(Payload::Other, |(key, object)| {
            Payload::Entity(EntityUpdate {
                key: key.to_string(),
                id: object.id.clone(),
            })
        }),
        None => Payload::Other,
    };

    Ok(Envelope {
        kind: message.r#type,
        payload,
    })
}

fn record_from_message(message: TransmissionMessage) -> Result<TransmissionRecord, DecodeError> {
    let state =
        TransmissionState::from_wire(message.state).ok_or(DecodeError::UnknownState(message.state))?;
    Ok(TransmissionRecord {
        id: message.id,
        parent_id: message.parent_id,
        destination: message
            .destination
            .map(|d| Destination::new(d.r#type, d.id))
            .unwrap_or_default(),
        state,
        status: message.status.map(|s| Status::new(s.code, s.message)),
    })
}

/// Encode an envelope as a binary frame.
///
/// # Errors
///
/// Returns [`DecodeError::UnsupportedEntity`] for an entity key with no
/// member in the envelope oneof.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, DecodeError> {
    let contents = match &envelope.payload {
        Payload::Transmission(record) => Some(Contents::Transmission(TransmissionMessage {
            id: record.id.clone(),
            parent_id: record.parent_id.clone(),
            destination: Some(DestinationMessage {
                r#type: record.destination.kind.clone(),
                id: record.destination.id.clone(),
            }),
            state: record.state.wire_value(),
            status: record.status.as_ref().map(|s| StatusMessage {
                code: s.code,
                message: s.message.clone(),
            }),
        })),
        Payload::Entity(entity) => {
            let object = ObjectMessage {
                id: entity.id.clone(),
            };
            Some(
                Contents::from_entity(&entity.key, object)
                    .ok_or_else(|| DecodeError::UnsupportedEntity(entity.key.clone()))?,
            )
        }
        Payload::Other => None,
    };
    Ok(EnvelopeMessage {
        r#type: envelope.kind.clone(),
        contents,
    }
    .encode_to_vec())
}
