//! Push-channel subscription
//!
//! A scenario opens exactly one subscription before it fires its trigger and
//! reads envelopes from it until the validator is done or the deadline passes.
//! [`PushChannel::receive_next`] tells the three non-envelope outcomes apart:
//!
//! - `Ok(Received::Timeout)`: nothing arrived within the wait, keep looping;
//! - `Ok(Received::Undecodable(_))`: a frame arrived but could not be decoded,
//!   report it and keep looping;
//! - `Err(ChannelError)`: the channel is gone, the scenario is over.
//!
//! Implementations are the websocket client used against a deployment and an
//! in-memory channel for tests.

use async_trait::async_trait;
use std::time::Duration;
use tms_harness_core::{Codec, DecodeError, Envelope, Frame};

pub mod memory;
pub mod tls;
pub mod websocket;

pub use memory::{MemoryChannel, MemoryChannelHandle, MemoryConnector};
pub use websocket::{WebSocketChannel, WebSocketConnector};

/// Result type for channel operations
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Fatal push-channel errors
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Connection refused, handshake rejected, or bad endpoint
    #[error("failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    /// Peer closed the channel
    #[error("push channel closed: {reason}")]
    Closed { reason: String },

    /// Transport failure while reading
    #[error("push channel dropped: {message}")]
    Dropped { message: String },
}

/// What to subscribe to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRequest {
    /// Full websocket URL, e.g. `wss://localhost:8080/ws/v2/`
    pub url: String,
    /// Value of the `id` session cookie sent with the handshake
    pub session_cookie: Option<String>,
    /// Serialization to decode frames with
    pub codec: Codec,
}

impl ChannelRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            session_cookie: None,
            codec: Codec::default(),
        }
    }

    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }
}

/// Outcome of one bounded wait on the channel.
#[derive(Debug)]
pub enum Received {
    Envelope(Envelope),
    /// Nothing arrived before the wait elapsed.
    Timeout,
    /// A frame arrived but could not be decoded. Not fatal.
    Undecodable(DecodeError),
}

/// An open push-channel subscription.
#[async_trait]
pub trait PushChannel: Send {
    /// Suspend until a frame arrives or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when the channel has closed or failed.
    async fn receive_next(&mut self, timeout: Duration) -> Result<Received>;

    /// Close the subscription. Idempotent and infallible; failures while
    /// closing are logged.
    async fn close(&mut self);
}

/// Opens push-channel subscriptions.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ChannelError::Connect`] if the subscription cannot be opened.
    async fn open(&self, request: &ChannelRequest) -> Result<Box<dyn PushChannel>>;
}

/// Run the pluggable decode step on a raw frame.
pub(crate) fn decode_frame(codec: Codec, frame: &Frame) -> Received {
    match codec.decode(frame) {
        Ok(envelope) => Received::Envelope(envelope),
        Err(e) => Received::Undecodable(e),
    }
}
