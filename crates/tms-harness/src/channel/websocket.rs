//! Websocket push channel
//!
//! Subscribes with the session cookie (`Cookie: id=<token>`) on the upgrade
//! request. Text frames and binary frames are handed to the configured codec;
//! ping and pong frames are consumed within the same wait.

use super::{decode_frame, tls, ChannelConnector, ChannelError, ChannelRequest, PushChannel, Received, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;
use tms_harness_core::{Codec, Frame};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, COOKIE};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Opens websocket subscriptions.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    accept_invalid_certs: bool,
}

impl WebSocketConnector {
    pub fn new(accept_invalid_certs: bool) -> Self {
        Self { accept_invalid_certs }
    }

    fn connector(&self, url: &str) -> Result<Option<Connector>> {
        if !url.starts_with("wss://") {
            return Ok(None);
        }
        tls::install_default_provider();
        if !self.accept_invalid_certs {
            return Ok(None);
        }
        let config = tls::insecure_client_config().map_err(|e| ChannelError::Connect {
            url: url.to_string(),
            message: format!("TLS configuration failed: {e}"),
        })?;
        Ok(Some(Connector::Rustls(config)))
    }
}

#[async_trait]
impl ChannelConnector for WebSocketConnector {
    async fn open(&self, request: &ChannelRequest) -> Result<Box<dyn PushChannel>> {
        let connect_error = |message: String| ChannelError::Connect {
            url: request.url.clone(),
            message,
        };

        let mut upgrade = request
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| connect_error(e.to_string()))?;
        if let Some(cookie) = &request.session_cookie {
            let value = HeaderValue::from_str(&format!("id={cookie}"))
                .map_err(|e| connect_error(format!("invalid session cookie: {e}")))?;
            upgrade.headers_mut().insert(COOKIE, value);
        }

        let connector = self.connector(&request.url)?;
        let (stream, response) = connect_async_tls_with_config(upgrade, None, false, connector)
            .await
            .map_err(|e| connect_error(e.to_string()))?;
        debug!(url = %request.url, status = %response.status(), "push channel open");

        Ok(Box::new(WebSocketChannel {
            stream,
            codec: request.codec,
            closed: false,
        }))
    }
}

/// An open websocket subscription.
pub struct WebSocketChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    codec: Codec,
    closed: bool,
}

#[async_trait]
impl PushChannel for WebSocketChannel {
    async fn receive_next(&mut self, timeout: Duration) -> Result<Received> {
        if self.closed {
            return Err(ChannelError::Closed {
                reason: "closed by client".to_string(),
            });
        }
        let deadline = Instant::now() + timeout;
        loop {
            let Ok(next) = tokio::time::timeout_at(deadline, self.stream.next()).await else {
                return Ok(Received::Timeout);
            };
            match next {
                Some(Ok(Message::Text(text))) => return Ok(decode_frame(self.codec, &Frame::Text(text))),
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(decode_frame(self.codec, &Frame::Binary(bytes)));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map_or_else(
                        || "no close frame".to_string(),
                        |f| format!("{} {}", u16::from(f.code), f.reason),
                    );
                    return Err(ChannelError::Closed { reason });
                }
                Some(Err(e)) => return Err(ChannelError::Dropped { message: e.to_string() }),
                None => {
                    return Err(ChannelError::Closed {
                        reason: "stream ended".to_string(),
                    });
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match tokio::time::timeout(CLOSE_TIMEOUT, self.stream.close(None)).await {
            Ok(Ok(())) => debug!("push channel closed"),
            Ok(Err(e)) => debug!("push channel close: {e}"),
            Err(_) => warn!("push channel close timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_urls_need_no_tls_connector() {
        let connector = WebSocketConnector::new(true);
        assert!(connector.connector("ws://localhost:8080/ws/v2/").unwrap().is_none());
        assert!(connector.connector("wss://localhost:8080/ws/v2/").unwrap().is_some());
        assert!(WebSocketConnector::new(false)
            .connector("wss://localhost:8080/ws/v2/")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_connection_refused_is_connect_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let request = ChannelRequest::new(format!("ws://{addr}/"));
        let err = WebSocketConnector::default().open(&request).await.err().unwrap();
        assert!(matches!(err, ChannelError::Connect { .. }));
    }
}
