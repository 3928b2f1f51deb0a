use crate::protocol::{RealtimeInput, ServerMessage};
use async_trait::async_trait;
use tokio::sync::mpsc;
use vidya_core::{SessionConfig, SessionError};

/// Lifecycle and data callbacks raised by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The remote side accepted the session.
    Open,
    Message(Box<ServerMessage>),
    Close { reason: Option<String> },
    Error(String),
}

/// A duplex connection to the live model service.
///
/// Implementations are registered via [`TransportRegistry`](crate::TransportRegistry)
/// and report everything that happens on the connection through the event
/// sender installed with [`set_event_sender`](Self::set_event_sender).
#[async_trait]
pub trait LiveTransport: Send + Sync {
    /// Returns the transport's registry name (e.g. `"websocket"`, `"null"`).
    fn name(&self) -> &str;
    /// One-time initialisation from the session configuration.
    async fn initialize(&mut self, config: &SessionConfig) -> Result<(), SessionError>;
    fn set_event_sender(&mut self, sender: mpsc::UnboundedSender<TransportEvent>);
    /// Open the connection and send the session setup. `Open` is reported
    /// through the event sender once the remote side confirms.
    async fn connect(&mut self) -> Result<(), SessionError>;
    async fn send_realtime_input(&self, input: RealtimeInput) -> Result<(), SessionError>;
    /// Release the connection. Safe to call more than once.
    async fn close(&mut self) -> Result<(), SessionError>;
}
