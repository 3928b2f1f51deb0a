use crate::protocol::RealtimeInput;
use crate::transport::{LiveTransport, TransportEvent};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;
use vidya_core::{SessionConfig, SessionError};

/// Offline transport: opens immediately and swallows audio.
pub struct NullTransport {
    send_count: AtomicUsize,
    connected: AtomicBool,
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
}

impl NullTransport {
    pub fn new() -> Self {
        Self {
            send_count: AtomicUsize::new(0),
            connected: AtomicBool::new(false),
            events: None,
        }
    }

    pub fn send_count(&self) -> usize {
        self.send_count.load(Ordering::Relaxed)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

impl Default for NullTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LiveTransport for NullTransport {
    fn name(&self) -> &str {
        "null"
    }

    async fn initialize(&mut self, _config: &SessionConfig) -> Result<(), SessionError> {
        Ok(())
    }

    fn set_event_sender(&mut self, sender: mpsc::UnboundedSender<TransportEvent>) {
        self.events = Some(sender);
    }

    async fn connect(&mut self) -> Result<(), SessionError> {
        self.connected.store(true, Ordering::Relaxed);
        if let Some(tx) = &self.events {
            let _ = tx.send(TransportEvent::Open);
        }
        Ok(())
    }

    async fn send_realtime_input(&self, input: RealtimeInput) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::SendFailed("not connected".to_string()));
        }
        let count = self.send_count.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!(
            "NullTransport swallowed frame #{count}, {} base64 bytes",
            input.media.data.len()
        );
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.connected.store(false, Ordering::Relaxed);
        Ok(())
    }
}
