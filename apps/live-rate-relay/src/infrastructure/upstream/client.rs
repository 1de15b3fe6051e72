//! Upstream WebSocket Client
//!
//! Holds the single connection to the rate feed. Each connection negotiates
//! the JSON hub protocol, subscribes to the configured channel, sends a
//! keep-alive record on a fixed interval and hands every decoded record to
//! the [`UpdateDispatcher`].
//!
//! When the connection closes or fails, the client waits a fixed delay and
//! connects again. It keeps doing so until the root cancellation token fires.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::{InvalidHeaderValue, ORIGIN};
use tokio_util::sync::CancellationToken;

use super::codec::FrameCodec;
use super::keepalive::{ActivityState, KeepAliveConfig, KeepAliveEvent, KeepAliveTimer};
use super::messages::{HandshakeRequest, PingRecord, SubscribeRequest, frame_record};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::status::{ConnectionState, UpstreamStatus};
use crate::application::services::UpdateDispatcher;
use crate::infrastructure::metrics;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that end one upstream connection.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamClientError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The configured origin is not a valid header value.
    #[error("invalid origin header: {0}")]
    InvalidOrigin(#[from] InvalidHeaderValue),

    /// An outbound record could not be serialized.
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The upstream closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// Nothing arrived from the upstream within the idle timeout.
    #[error("upstream idle timeout")]
    IdleTimeout,
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for the upstream client.
#[derive(Debug, Clone)]
pub struct UpstreamClientConfig {
    /// Upstream WebSocket URL.
    pub url: String,
    /// `Origin` header sent with the upgrade request.
    pub origin: String,
    /// Channel named in the subscribe record.
    pub channel: String,
    /// Keep-alive configuration.
    pub keepalive: KeepAliveConfig,
    /// Reconnection configuration.
    pub reconnect: ReconnectConfig,
}

impl UpstreamClientConfig {
    /// Build the client configuration from `UpstreamSettings`.
    #[must_use]
    pub fn from_upstream_settings(settings: &crate::UpstreamSettings) -> Self {
        Self {
            url: settings.url.clone(),
            origin: settings.origin.clone(),
            channel: settings.channel.clone(),
            keepalive: KeepAliveConfig::from_upstream_settings(settings),
            reconnect: ReconnectConfig::from_upstream_settings(settings),
        }
    }
}

// =============================================================================
// Upstream Client
// =============================================================================

/// Client for the upstream rate feed.
pub struct UpstreamClient {
    config: UpstreamClientConfig,
    codec: FrameCodec,
    dispatcher: Arc<UpdateDispatcher>,
    status: Arc<UpstreamStatus>,
    cancel: CancellationToken,
}

impl UpstreamClient {
    /// Create a new upstream client.
    #[must_use]
    pub const fn new(
        config: UpstreamClientConfig,
        dispatcher: Arc<UpdateDispatcher>,
        status: Arc<UpstreamStatus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            codec: FrameCodec::new(),
            dispatcher,
            status,
            cancel,
        }
    }

    /// Run the connection loop until cancelled.
    ///
    /// Every failure, including a failed connect, is followed by the fixed
    /// reconnect delay and another attempt.
    pub async fn run(self: Arc<Self>) {
        let mut reconnect_policy = ReconnectPolicy::new(self.config.reconnect);

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Upstream client cancelled");
                break;
            }

            match self.connect_and_run(&mut reconnect_policy).await {
                Ok(()) => {
                    tracing::info!("Upstream client stopped");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Upstream connection lost");
                    metrics::set_upstream_connected(false);
                    self.status.set_error(e.to_string());
                    self.status.set_state(ConnectionState::ReconnectWait);
                    self.status.increment_reconnect_attempts();
                    metrics::record_reconnect();

                    let delay = reconnect_policy.next_delay();
                    tracing::info!(
                        attempt = reconnect_policy.attempt_count(),
                        delay_ms = delay.as_millis(),
                        "Reconnecting to upstream"
                    );

                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            tracing::info!("Upstream client cancelled during reconnect delay");
                            break;
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        metrics::set_upstream_connected(false);
        self.status.set_state(ConnectionState::Disconnected);
    }

    /// Build the upgrade request with the configured `Origin` header.
    fn build_request(&self) -> Result<Request, UpstreamClientError> {
        let mut request = self.config.url.as_str().into_client_request()?;
        request
            .headers_mut()
            .insert(ORIGIN, HeaderValue::from_str(&self.config.origin)?);
        Ok(request)
    }

    /// Connect, subscribe, and pump messages until error or cancellation.
    ///
    /// Returns `Ok(())` only when the root token was cancelled.
    async fn connect_and_run(
        &self,
        reconnect_policy: &mut ReconnectPolicy,
    ) -> Result<(), UpstreamClientError> {
        self.status.set_state(ConnectionState::Connecting);
        tracing::info!(url = %self.config.url, "Connecting to upstream");

        let request = self.build_request()?;
        let (ws_stream, _response) = tokio::select! {
            () = self.cancel.cancelled() => return Ok(()),
            connected = tokio_tungstenite::connect_async(request) => connected?,
        };

        let (mut write, mut read) = ws_stream.split();

        self.status.set_state(ConnectionState::Handshaking);
        write
            .send(Message::Text(frame_record(&HandshakeRequest::default())?.into()))
            .await?;
        write
            .send(Message::Text(
                frame_record(&SubscribeRequest::channel(&self.config.channel))?.into(),
            ))
            .await?;

        self.status.set_state(ConnectionState::Subscribed);
        reconnect_policy.reset();
        metrics::set_upstream_connected(true);
        tracing::info!(channel = %self.config.channel, "Subscribed to upstream channel");

        // The timer lives exactly as long as this connection.
        let activity = Arc::new(ActivityState::new());
        let (keepalive_tx, mut keepalive_rx) = mpsc::channel::<KeepAliveEvent>(10);
        let keepalive_cancel = CancellationToken::new();
        let _keepalive_guard = keepalive_cancel.clone().drop_guard();
        let timer = KeepAliveTimer::new(
            self.config.keepalive.clone(),
            Arc::clone(&activity),
            keepalive_tx,
            keepalive_cancel,
        );
        tokio::spawn(timer.run());

        let ping = frame_record(&PingRecord::default())?;
        let mut keepalive_open = true;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = write.close().await;
                    return Ok(());
                }
                event = keepalive_rx.recv(), if keepalive_open => {
                    match event {
                        Some(KeepAliveEvent::SendPing) => {
                            write.send(Message::Text(ping.clone().into())).await?;
                        }
                        Some(KeepAliveEvent::IdleTimeout) => {
                            return Err(UpstreamClientError::IdleTimeout);
                        }
                        None => {
                            tracing::warn!("Keep-alive timer stopped, continuing without keep-alive");
                            keepalive_open = false;
                        }
                    }
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            activity.record_inbound();
                            self.handle_text(&text);
                        }
                        Some(Ok(Message::Binary(data))) => {
                            activity.record_inbound();
                            match std::str::from_utf8(&data) {
                                Ok(text) => self.handle_text(text),
                                Err(e) => tracing::warn!(error = %e, "Dropping non-UTF-8 binary message"),
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            activity.record_inbound();
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            activity.record_inbound();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "Upstream sent close frame");
                            return Err(UpstreamClientError::ConnectionClosed);
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(e)) => {
                            return Err(e.into());
                        }
                        None => {
                            tracing::info!("Upstream stream ended");
                            return Err(UpstreamClientError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }

    /// Decode one WebSocket message and dispatch its records in order.
    fn handle_text(&self, text: &str) {
        self.status.increment_messages();
        metrics::record_message_received();

        for update in self.codec.decode(text) {
            let topic = update.topic.clone();
            let outcome = self.dispatcher.dispatch(update);
            tracing::trace!(%topic, ?outcome, "Dispatched upstream record");
        }
    }
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("config", &self.config)
            .field("state", &self.status.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn test_config(url: &str, origin: &str) -> UpstreamClientConfig {
        UpstreamClientConfig {
            url: url.to_string(),
            origin: origin.to_string(),
            channel: "radhika".to_string(),
            keepalive: KeepAliveConfig::default(),
            reconnect: ReconnectConfig::new(Duration::from_millis(10)),
        }
    }

    fn test_client(config: UpstreamClientConfig) -> UpstreamClient {
        let cache = Arc::new(crate::domain::cache::CacheStore::new());
        let publisher = Arc::new(crate::application::ports::MockUpdatePublisher::new());
        UpstreamClient::new(
            config,
            Arc::new(UpdateDispatcher::new(cache, publisher)),
            Arc::new(UpstreamStatus::new()),
            CancellationToken::new(),
        )
    }

    #[test]
    fn request_carries_origin_header() {
        let client = test_client(test_config(
            "wss://feed.example.com/hub",
            "https://radhikajewellers.in",
        ));

        let request = client.build_request().unwrap();

        assert_eq!(request.uri().host(), Some("feed.example.com"));
        assert_eq!(
            request.headers().get(ORIGIN).unwrap(),
            "https://radhikajewellers.in"
        );
    }

    #[test]
    fn invalid_origin_is_rejected() {
        let client = test_client(test_config("wss://feed.example.com/hub", "bad\norigin"));
        assert!(matches!(
            client.build_request(),
            Err(UpstreamClientError::InvalidOrigin(_))
        ));
    }

    #[test]
    fn invalid_url_is_rejected() {
        let client = test_client(test_config("not a url", "https://example.com"));
        assert!(matches!(
            client.build_request(),
            Err(UpstreamClientError::WebSocket(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_client_stops_during_reconnect_wait() {
        // Nothing listens on port 9; every attempt fails straight away.
        let client = Arc::new(test_client(test_config(
            "ws://127.0.0.1:9/hub",
            "https://example.com",
        )));
        let status = Arc::clone(&client.status);
        let cancel = client.cancel.clone();

        let handle = tokio::spawn(Arc::clone(&client).run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(status.reconnect_attempts() >= 1);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("client should stop after cancel")
            .unwrap();

        assert_eq!(status.state(), ConnectionState::Disconnected);
        assert_eq!(status.connections(), 0);
    }
}
