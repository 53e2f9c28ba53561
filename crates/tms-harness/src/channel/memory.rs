//! In-memory push channel for testing
//!
//! [`MemoryConnector::new`] returns the connector a supervisor opens and a
//! [`MemoryChannelHandle`] the test drives: it publishes envelopes or raw
//! frames, closes or drops the channel from the server side, and reports
//! whether the client closed its end.

use super::{decode_frame, ChannelConnector, ChannelError, ChannelRequest, PushChannel, Received, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tms_harness_core::{Codec, DecodeError, Envelope, Frame};
use tokio::sync::mpsc;

#[derive(Debug)]
enum Event {
    Frame(Frame),
    Close(String),
    Drop(String),
}

#[derive(Debug, Default)]
struct Shared {
    opens: AtomicUsize,
    client_closed: AtomicBool,
    refuse: Mutex<Option<String>>,
    request: Mutex<Option<ChannelRequest>>,
}

/// Connector handing out one in-memory channel.
#[derive(Debug)]
pub struct MemoryConnector {
    channel: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
    shared: Arc<Shared>,
}

impl MemoryConnector {
    /// Create a connector and the handle that feeds its channel.
    pub fn new() -> (Self, MemoryChannelHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        let connector = Self {
            channel: Mutex::new(Some(rx)),
            shared: Arc::clone(&shared),
        };
        (connector, MemoryChannelHandle { tx, shared })
    }
}

#[async_trait]
impl ChannelConnector for MemoryConnector {
    async fn open(&self, request: &ChannelRequest) -> Result<Box<dyn PushChannel>> {
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        let refuse = self.shared.refuse.lock().ok().and_then(|r| r.clone());
        if let Some(message) = refuse {
            return Err(ChannelError::Connect {
                url: request.url.clone(),
                message,
            });
        }
        let rx = self
            .channel
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or_else(|| ChannelError::Connect {
                url: request.url.clone(),
                message: "memory channel already opened".to_string(),
            })?;
        if let Ok(mut slot) = self.shared.request.lock() {
            *slot = Some(request.clone());
        }
        Ok(Box::new(MemoryChannel {
            rx,
            codec: request.codec,
            closed: false,
            shared: Arc::clone(&self.shared),
        }))
    }
}

/// Client end of an in-memory channel.
#[derive(Debug)]
pub struct MemoryChannel {
    rx: mpsc::UnboundedReceiver<Event>,
    codec: Codec,
    closed: bool,
    shared: Arc<Shared>,
}

#[async_trait]
impl PushChannel for MemoryChannel {
    async fn receive_next(&mut self, timeout: Duration) -> Result<Received> {
        if self.closed {
            return Err(ChannelError::Closed {
                reason: "closed by client".to_string(),
            });
        }
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Err(_) => Ok(Received::Timeout),
            Ok(Some(Event::Frame(frame))) => Ok(decode_frame(self.codec, &frame)),
            Ok(Some(Event::Close(reason))) => Err(ChannelError::Closed { reason }),
            Ok(Some(Event::Drop(message))) => Err(ChannelError::Dropped { message }),
            Ok(None) => Err(ChannelError::Closed {
                reason: "server went away".to_string(),
            }),
        }
    }

    async fn close(&mut self) {
        self.closed = true;
        self.rx.close();
        self.shared.client_closed.store(true, Ordering::SeqCst);
    }
}

/// Server side of an in-memory channel.
#[derive(Debug, Clone)]
pub struct MemoryChannelHandle {
    tx: mpsc::UnboundedSender<Event>,
    shared: Arc<Shared>,
}

impl MemoryChannelHandle {
    /// Publish an envelope encoded with `codec` (`Auto` publishes JSON).
    ///
    /// # Errors
    ///
    /// Returns the [`DecodeError`] if the envelope cannot be encoded; nothing
    /// is published in that case.
    pub fn publish(&self, envelope: &Envelope, codec: Codec) -> std::result::Result<(), DecodeError> {
        self.send_frame(codec.encode(envelope)?);
        Ok(())
    }

    /// Publish a raw frame, e.g. a malformed one.
    pub fn send_frame(&self, frame: Frame) {
        let _ = self.tx.send(Event::Frame(frame));
    }

    /// Close the channel from the server side.
    pub fn close(&self, reason: impl Into<String>) {
        let _ = self.tx.send(Event::Close(reason.into()));
    }

    /// Fail the transport under the client.
    pub fn drop_connection(&self, message: impl Into<String>) {
        let _ = self.tx.send(Event::Drop(message.into()));
    }

    /// Make the next `open` fail as if the connection were refused.
    pub fn refuse_connections(&self, message: impl Into<String>) {
        if let Ok(mut refuse) = self.shared.refuse.lock() {
            *refuse = Some(message.into());
        }
    }

    /// Number of `open` calls seen by the connector.
    pub fn open_count(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    /// Whether the client closed its end.
    pub fn is_closed(&self) -> bool {
        self.shared.client_closed.load(Ordering::SeqCst)
    }

    /// The request the channel was opened with.
    pub fn request(&self) -> Option<ChannelRequest> {
        self.shared.request.lock().ok().and_then(|r| r.clone())
    }
}
