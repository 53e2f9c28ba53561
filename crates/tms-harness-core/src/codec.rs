//! Pluggable envelope decoding ahead of the matcher.
//!
//! The platform serves the same logical envelope stream as JSON text frames
//! and as protobuf binary frames. [`Codec`] selects which serialization a
//! scenario accepts; [`Codec::Auto`] decides per frame.

use crate::envelope::{json, proto, DecodeError, Envelope};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A raw data frame read from the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    fn label(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
        }
    }
}

/// Envelope serialization accepted on the push channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// JSON in text frames (binary frames are read as UTF-8 JSON).
    Json,
    /// Protobuf in binary frames.
    Protobuf,
    /// Text frames as JSON, binary frames as protobuf.
    #[default]
    Auto,
}

impl Codec {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Protobuf => "protobuf",
            Self::Auto => "auto",
        }
    }

    /// Decode one frame.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the frame is malformed for the selected
    /// serialization, or is a text frame handed to the protobuf codec.
    pub fn decode(self, frame: &Frame) -> Result<Envelope, DecodeError> {
        match (self, frame) {
            (Self::Json | Self::Auto, Frame::Text(text)) => json::decode(text),
            (Self::Json, Frame::Binary(bytes)) => json::decode(&String::from_utf8(bytes.clone())?),
            (Self::Protobuf | Self::Auto, Frame::Binary(bytes)) => proto::decode(bytes),
            (Self::Protobuf, Frame::Text(_)) => Err(DecodeError::UnexpectedFrame {
                codec: self.as_str(),
                frame: frame.label(),
            }),
        }
    }

    /// Encode an envelope into the frame this codec produces. `Auto` encodes
    /// as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Json`] if JSON serialization fails, or
    /// [`DecodeError::UnsupportedEntity`] for an entity the protobuf envelope
    /// cannot carry.
    pub fn encode(self, envelope: &Envelope) -> Result<Frame, DecodeError> {
        match self {
            Self::Json | Self::Auto => json::encode(envelope).map(Frame::Text),
            Self::Protobuf => proto::encode(envelope).map(Frame::Binary),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "protobuf" | "proto" | "binary" => Ok(Self::Protobuf),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown codec '{other}' (expected json, protobuf or auto)")),
        }
    }
}
