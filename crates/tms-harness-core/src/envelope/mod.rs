//! Push-channel envelope model
//!
//! Every frame on the platform's push channel is an envelope: a `type` tag such
//! as `Transmission/UPDATE` or `Incident/CLOSE` plus one payload keyed by the
//! kind of object it carries. The channel serializes envelopes either as JSON
//! text frames or as protobuf binary frames; both decode into the same
//! [`Envelope`] value.
//!
//! Decoding only rejects frames that cannot be read at all. Envelope kinds the
//! harness does not know about decode to [`Payload::Other`] so new kinds never
//! break a running scenario.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub mod error;
pub mod json;
pub mod proto;

pub use error::DecodeError;

/// Envelope `type` published for every change to a transmission record.
pub const TRANSMISSION_UPDATE: &str = "Transmission/UPDATE";

/// One decoded push-channel frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// The envelope `type` tag, e.g. `Transmission/UPDATE`.
    pub kind: String,
    /// The payload carried by the envelope.
    pub payload: Payload,
}

impl Envelope {
    /// Build a transmission-update envelope.
    pub fn transmission(record: TransmissionRecord) -> Self {
        Self {
            kind: TRANSMISSION_UPDATE.to_string(),
            payload: Payload::Transmission(record),
        }
    }

    /// Build an entity envelope, e.g. `Envelope::entity("Incident/CLOSE", "incident", "I-1")`.
    pub fn entity(kind: impl Into<String>, key: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Payload::Entity(EntityUpdate {
                key: key.into(),
                id: id.into(),
            }),
        }
    }
}

/// Payload union keyed by the envelope kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A transmission record (`transmission` key).
    Transmission(TransmissionRecord),
    /// Any other platform object identified by its `id` (incident, device, ...).
    Entity(EntityUpdate),
    /// No payload, or a payload the harness does not interpret.
    Other,
}

/// Identity of a non-transmission object carried by an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityUpdate {
    /// Payload key the object was found under (e.g. `incident`, `device`).
    pub key: String,
    /// The object's `id`.
    pub id: String,
}

/// Transmission record as published on the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransmissionRecord {
    /// Transmission identifier.
    pub id: String,
    /// Identifier of the operation (multicast) that created this transmission.
    pub parent_id: String,
    /// Where the transmission is being delivered.
    #[serde(default)]
    pub destination: Destination,
    /// Lifecycle state.
    pub state: TransmissionState,
    /// Delivery status, absent while the transmission is pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

/// Delivery destination of a transmission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    /// Destination type, e.g. `prisma.tms.moc.Site` or a satellite provider.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Destination identifier.
    #[serde(default)]
    pub id: String,
}

impl Destination {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Status sub-record attached to partial and final transmission states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Numeric status code (HTTP-like: 211 sent, 200 delivered).
    #[serde(default)]
    pub code: i32,
    /// Human-readable status message.
    #[serde(default)]
    pub message: String,
}

impl Status {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.code, self.message)
    }
}

/// Transmission lifecycle state.
///
/// Wire numbers match the platform enum: `Pending = 1`, `Success = 2`,
/// `Failure = 3`, `Partial = 4`, `Retry = 5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransmissionState {
    Pending,
    Success,
    Failure,
    Partial,
    Retry,
}

impl TransmissionState {
    /// Numeric value used by the protobuf encoding.
    pub const fn wire_value(self) -> i32 {
        match self {
            Self::Pending => 1,
            Self::Success => 2,
            Self::Failure => 3,
            Self::Partial => 4,
            Self::Retry => 5,
        }
    }

    /// Map a wire number back to a state. Returns `None` for unknown values
    /// (including the protobuf default `0`).
    pub const fn from_wire(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Pending),
            2 => Some(Self::Success),
            3 => Some(Self::Failure),
            4 => Some(Self::Partial),
            5 => Some(Self::Retry),
            _ => None,
        }
    }

    /// Name used by the JSON encoding.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Success => "Success",
            Self::Failure => "Failure",
            Self::Partial => "Partial",
            Self::Retry => "Retry",
        }
    }
}

impl fmt::Display for TransmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransmissionState {
    type Err = DecodeError;

    /// Parses the exact state name; lowercase names are accepted for CLI use.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Pending" | "pending" => Ok(Self::Pending),
            "Success" | "success" => Ok(Self::Success),
            "Failure" | "failure" => Ok(Self::Failure),
            "Partial" | "partial" => Ok(Self::Partial),
            "Retry" | "retry" => Ok(Self::Retry),
            other => Err(DecodeError::UnknownStateName(other.to_string())),
        }
    }
}

impl Serialize for TransmissionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// jsonpb emits enum names, but numeric states show up in hand-built payloads.
impl<'de> Deserialize<'de> for TransmissionState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StateVisitor;

        impl Visitor<'_> for StateVisitor {
            type Value = TransmissionState;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a transmission state name or number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(|_| E::unknown_variant(v, STATE_NAMES))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                i32::try_from(v)
                    .ok()
                    .and_then(TransmissionState::from_wire)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                i32::try_from(v)
                    .ok()
                    .and_then(TransmissionState::from_wire)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }
        }

        deserializer.deserialize_any(StateVisitor)
    }
}

const STATE_NAMES: &[&str] = &["Pending", "Success", "Failure", "Partial", "Retry"];
