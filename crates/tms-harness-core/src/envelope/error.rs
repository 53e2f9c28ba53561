//! Error types for envelope decoding

use thiserror::Error;

/// A push-channel frame that could not be turned into an [`super::Envelope`].
///
/// Decode errors are reported and skipped by the receive loop; they never end
/// a scenario on their own.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Frame is not valid JSON
    #[error("invalid JSON envelope: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is not a valid protobuf envelope
    #[error("invalid protobuf envelope: {0}")]
    Protobuf(#[from] prost::DecodeError),

    /// Binary frame handed to the JSON codec is not UTF-8
    #[error("envelope is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// JSON frame is not an object
    #[error("envelope is not a JSON object")]
    NotAnObject,

    /// Envelope has no (or an empty) `type` tag
    #[error("envelope has no type")]
    MissingType,

    /// Payload present but malformed
    #[error("malformed {kind} payload: {message}")]
    Payload { kind: String, message: String },

    /// Numeric transmission state outside the known enum
    #[error("unknown transmission state {0}")]
    UnknownState(i32),

    /// State name outside the known enum
    #[error("unknown transmission state {0:?}")]
    UnknownStateName(String),

    /// Entity key with no member in the protobuf envelope
    #[error("protobuf envelope has no member for {0:?} payloads")]
    UnsupportedEntity(String),

    /// Frame kind the configured codec does not accept
    #[error("{codec} codec cannot decode a {frame} frame")]
    UnexpectedFrame {
        codec: &'static str,
        frame: &'static str,
    },
}
