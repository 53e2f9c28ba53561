//! JSON (jsonpb) envelope encoding
//!
//! The platform marshals envelopes with the protobuf JSON mapping:
//!
//! ```json
//! {"type":"Transmission/UPDATE","transmission":{"id":"T1","parentId":"OP1",
//!  "destination":{"type":"iridium","id":"3332"},"state":"Partial",
//!  "status":{"code":211,"message":"transmission sent"}}}
//! ```
//!
//! Other kinds carry their object under a kind-specific key
//! (`{"type":"Incident/CLOSE","incident":{"id":"I1",...}}`); only the object's
//! `id` is retained.

use super::{DecodeError, Envelope, EntityUpdate, Payload, TransmissionRecord};
use serde_json::{Map, Value};

const TRANSMISSION_KEY: &str = "transmission";

// Envelope fields that never hold the payload object.
const RESERVED_KEYS: &[&str] = &["type", "source", "session"];

/// Decode a JSON text frame.
///
/// # Errors
///
/// Returns [`DecodeError`] when the text is not a JSON object, has no `type`,
/// or carries a malformed transmission payload.
pub fn decode(text: &str) -> Result<Envelope, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;

    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .filter(|kind| !kind.is_empty())
        .ok_or(DecodeError::MissingType)?
        .to_string();

    if let Some(raw) = object.get(TRANSMISSION_KEY) {
        let record: TransmissionRecord =
            serde_json::from_value(raw.clone()).map_err(|e| DecodeError::Payload {
                kind: kind.clone(),
                message: e.to_string(),
            })?;
        return Ok(Envelope {
            kind,
            payload: Payload::Transmission(record),
        });
    }

    let payload = find_entity(object).map_or(Payload::Other, Payload::Entity);
    Ok(Envelope { kind, payload })
}

/// First object-valued field carrying a string `id`, in document order.
fn find_entity(object: &Map<String, Value>) -> Option<EntityUpdate> {
    object
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .find_map(|(key, value)| {
            let id = value.as_object()?.get("id")?.as_str()?;
            Some(EntityUpdate {
                key: key.clone(),
                id: id.to_string(),
            })
        })
}

/// Encode an envelope in the same shape the platform publishes.
///
/// # Errors
///
/// Returns an error if the transmission record fails to serialize.
pub fn encode(envelope: &Envelope) -> Result<String, DecodeError> {
    let mut object = Map::new();
    object.insert("type".to_string(), Value::String(envelope.kind.clone()));
    match &envelope.payload {
        Payload::Transmission(record) => {
            object.insert(TRANSMISSION_KEY.to_string(), serde_json::to_value(record)?);
        }
        Payload::Entity(entity) => {
            let mut inner = Map::new();
            inner.insert("id".to_string(), Value::String(entity.id.clone()));
            object.insert(entity.key.clone(), Value::Object(inner));
        }
        Payload::Other => {}
    }
    Ok(serde_json::to_string(&Value::Object(object))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{Destination, Status, TransmissionState};

    #[test]
    fn test_decode_transmission_update() {
        let text = r#"{"type":"Transmission/UPDATE","transmission":{"id":"T1","parentId":"OP1",
            "destination":{"type":"iridium","id":"333234010030454"},"state":"Partial",
            "status":{"code":211,"message":"transmission sent"}}}"#;
        let envelope = decode(text).unwrap();
        assert_eq!(envelope.kind, "Transmission/UPDATE");
        let Payload::Transmission(record) = envelope.payload else {
            panic!("expected transmission payload");
        };
        assert_eq!(record.parent_id, "OP1");
        assert_eq!(record.destination, Destination::new("iridium", "333234010030454"));
        assert_eq!(record.state, TransmissionState::Partial);
        assert_eq!(record.status, Some(Status::new(211, "transmission sent")));
    }

    #[test]
    fn test_decode_numeric_state_and_null_status() {
        let text = r#"{"type":"Transmission/UPDATE","transmission":{"id":"T1","parentId":"OP1","state":1,"status":null}}"#;
        let envelope = decode(text).unwrap();
        let Payload::Transmission(record) = envelope.payload else {
            panic!("expected transmission payload");
        };
        assert_eq!(record.state, TransmissionState::Pending);
        assert!(record.status.is_none());
        assert_eq!(record.destination, Destination::default());
    }

    #[test]
    fn test_decode_entity_update() {
        let text = r#"{"type":"Incident/CLOSE","source":{"id":"ignored"},"incident":{"id":"I-7","name":"x"}}"#;
        let envelope = decode(text).unwrap();
        assert_eq!(
            envelope.payload,
            Payload::Entity(EntityUpdate {
                key: "incident".to_string(),
                id: "I-7".to_string()
            })
        );
    }

    #[test]
    fn test_decode_unknown_kind_is_other() {
        let envelope = decode(r#"{"type":"Marker/Update","marker":{"lat":1.0}}"#).unwrap();
        assert_eq!(envelope.kind, "Marker/Update");
        assert_eq!(envelope.payload, Payload::Other);
    }

    #[test]
    fn test_decode_rejects_malformed_frames() {
        assert!(matches!(decode("not json"), Err(DecodeError::Json(_))));
        assert!(matches!(decode("[1,2]"), Err(DecodeError::NotAnObject)));
        assert!(matches!(decode(r#"{"transmission":{}}"#), Err(DecodeError::MissingType)));
        assert!(matches!(
            decode(r#"{"type":"Transmission/UPDATE","transmission":{"id":"T1"}}"#),
            Err(DecodeError::Payload { .. })
        ));
    }

    #[test]
    fn test_encode_matches_platform_shape() {
        let envelope = Envelope::entity("Device/UPDATE", "device", "D-4");
        let value: Value = serde_json::from_str(&encode(&envelope).unwrap()).unwrap();
        assert_eq!(value["type"], "Device/UPDATE");
        assert_eq!(value["device"]["id"], "D-4");
        assert_eq!(decode(&encode(&envelope).unwrap()).unwrap(), envelope);
    }
}
