use crate::protocol::{ClientMessage, RealtimeInput, ServerMessage};
use crate::transport::{LiveTransport, TransportEvent};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::Once;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use vidya_core::{SessionConfig, SessionError};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

enum Outgoing {
    Text(String),
    Close,
}

/// Live transport over a WebSocket, speaking the JSON protocol in [`crate::protocol`].
pub struct WebSocketTransport {
    url: Option<String>,
    setup: Option<String>,
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
    outgoing: Option<mpsc::UnboundedSender<Outgoing>>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self {
            url: None,
            setup: None,
            events: None,
            outgoing: None,
            reader: None,
            writer: None,
        }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Append the API key as a query parameter.
pub fn endpoint_url(endpoint: &str, api_key: &str) -> String {
    let sep = if endpoint.contains('?') { '&' } else { '?' };
    format!("{endpoint}{sep}key={api_key}")
}

/// Install ring as the process-wide rustls provider. `wss://` handshakes
/// panic without one. A provider installed elsewhere is kept.
pub fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            tracing::debug!("rustls crypto provider already installed");
        }
    });
}

/// Map one inbound frame payload to a transport event.
fn classify(bytes: &[u8]) -> Option<TransportEvent> {
    match ServerMessage::from_slice(bytes) {
        Ok(msg) if msg.is_setup_complete() => Some(TransportEvent::Open),
        Ok(msg) => Some(TransportEvent::Message(Box::new(msg))),
        Err(e) => {
            tracing::warn!("ignoring unparseable server message: {e}");
            None
        }
    }
}

#[async_trait]
impl LiveTransport for WebSocketTransport {
    fn name(&self) -> &str {
        "websocket"
    }

    async fn initialize(&mut self, config: &SessionConfig) -> Result<(), SessionError> {
        if config.api_key.is_empty() {
            return Err(SessionError::InitializationFailed(
                "missing 'api_key' in session config".to_string(),
            ));
        }
        if !(config.endpoint.starts_with("ws://") || config.endpoint.starts_with("wss://")) {
            return Err(SessionError::InitializationFailed(format!(
                "endpoint must be a ws:// or wss:// URL, got '{}'",
                config.endpoint
            )));
        }
        let setup = serde_json::to_string(&ClientMessage::setup(config))
            .map_err(|e| SessionError::Protocol(e.to_string()))?;

        self.url = Some(endpoint_url(&config.endpoint, &config.api_key));
        self.setup = Some(setup);
        tracing::info!(endpoint = %config.endpoint, model = %config.model, "WebSocketTransport initialized");
        Ok(())
    }

    fn set_event_sender(&mut self, sender: mpsc::UnboundedSender<TransportEvent>) {
        self.events = Some(sender);
    }

    async fn connect(&mut self) -> Result<(), SessionError> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| SessionError::ConnectionFailed("not initialized".to_string()))?;
        let setup = self
            .setup
            .clone()
            .ok_or_else(|| SessionError::ConnectionFailed("not initialized".to_string()))?;
        let events = self
            .events
            .clone()
            .ok_or_else(|| SessionError::ConnectionFailed("no event sender".to_string()))?;

        install_crypto_provider();
        let (ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        sink.send(Message::Text(setup))
            .await
            .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;
        tracing::debug!("setup sent, waiting for setupComplete");

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outgoing>();

        let writer = tokio::spawn(async move {
            while let Some(out) = out_rx.recv().await {
                match out {
                    Outgoing::Text(text) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            tracing::debug!("websocket write failed: {e}");
                            break;
                        }
                    }
                    Outgoing::Close => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let event = match frame {
                    Ok(Message::Text(text)) => classify(text.as_bytes()),
                    Ok(Message::Binary(bytes)) => classify(&bytes),
                    Ok(Message::Close(close)) => {
                        let reason = close
                            .map(|c| c.reason.to_string())
                            .filter(|r| !r.is_empty());
                        let _ = events.send(TransportEvent::Close { reason });
                        return;
                    }
                    Ok(_) => None,
                    Err(e) => {
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        return;
                    }
                };
                if let Some(event) = event {
                    if events.send(event).is_err() {
                        return;
                    }
                }
            }
            let _ = events.send(TransportEvent::Close { reason: None });
        });

        self.outgoing = Some(out_tx);
        self.reader = Some(reader);
        self.writer = Some(writer);
        Ok(())
    }

    async fn send_realtime_input(&self, input: RealtimeInput) -> Result<(), SessionError> {
        let out = self
            .outgoing
            .as_ref()
            .ok_or_else(|| SessionError::SendFailed("not connected".to_string()))?;
        let text = serde_json::to_string(&ClientMessage::realtime_input(input))
            .map_err(|e| SessionError::Protocol(e.to_string()))?;
        out.send(Outgoing::Text(text))
            .map_err(|_| SessionError::SendFailed("connection closed".to_string()))
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(out) = self.outgoing.take() {
            let _ = out.send(Outgoing::Close);
        }
        if let Some(writer) = self.writer.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, writer).await.is_err() {
                tracing::warn!("websocket close handshake timed out");
            }
        }
        Ok(())
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
    }
}
