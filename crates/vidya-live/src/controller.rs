use crate::protocol::{RealtimeInput, ServerMessage};
use crate::registry::TransportRegistry;
use crate::transport::{LiveTransport, TransportEvent};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use vidya_audio::{pcm, AudioBackend, CaptureHandle, Player, ReleaseGuard, StreamStatus};
use vidya_core::{
    AudioChunk, AudioError, PlaybackConfig, SessionConfig, SessionError, SessionState,
    SessionView, UiCommand,
};

/// Model text lines kept in the view.
const MODEL_TEXT_LIMIT: usize = 20;

/// Everything owned by one connected session. Dropping it drops the
/// per-session channels, so nothing from a finished session is processed.
struct ActiveSession {
    transport: Box<dyn LiveTransport>,
    capture: CaptureHandle,
    player: Player,
    guard: ReleaseGuard,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    frames_rx: mpsc::UnboundedReceiver<AudioChunk>,
    // Held so the receivers stay open for the lifetime of the session.
    _events_tx: mpsc::UnboundedSender<TransportEvent>,
    _frames_tx: mpsc::UnboundedSender<AudioChunk>,
}

enum SessionInput {
    Event(TransportEvent),
    Frame(AudioChunk),
}

/// Drives one live tutoring session at a time:
/// Disconnected → Connecting → Connected ⇄ Speaking → Disconnected.
pub struct SessionController {
    session: SessionConfig,
    playback: PlaybackConfig,
    backend: Box<dyn AudioBackend>,
    registry: TransportRegistry,
    active: Option<ActiveSession>,
    view: SessionView,
    view_tx: watch::Sender<SessionView>,
}

impl SessionController {
    pub fn new(
        session: SessionConfig,
        playback: PlaybackConfig,
        backend: Box<dyn AudioBackend>,
        registry: TransportRegistry,
    ) -> (Self, watch::Receiver<SessionView>) {
        let (view_tx, view_rx) = watch::channel(SessionView::default());
        let controller = Self {
            session,
            playback,
            backend,
            registry,
            active: None,
            view: SessionView::default(),
            view_tx,
        };
        (controller, view_rx)
    }

    pub fn state(&self) -> SessionState {
        self.view.state
    }

    pub fn view(&self) -> &SessionView {
        &self.view
    }

    /// Open audio and connect. Does nothing unless disconnected.
    ///
    /// On failure the user-visible error is set, everything acquired so far
    /// is released and the state returns to `Disconnected`.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self.view.state != SessionState::Disconnected {
            tracing::debug!(state = %self.view.state, "start ignored");
            return Ok(());
        }

        self.view = SessionView {
            state: SessionState::Connecting,
            ..Default::default()
        };
        self.publish();
        tracing::info!(
            transport = %self.session.transport,
            backend = self.backend.name(),
            "starting session"
        );

        match self.open_session().await {
            Ok(active) => {
                self.active = Some(active);
                Ok(())
            }
            Err(e) => {
                tracing::error!("session start failed: {e}");
                self.view.error = Some(e.user_message());
                self.view.state = SessionState::Disconnected;
                self.publish();
                Err(e)
            }
        }
    }

    async fn open_session(&mut self) -> Result<ActiveSession, SessionError> {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let streams = self.backend.open(frames_tx.clone())?;

        let mut transport = self.registry.create(&self.session.transport)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        transport.set_event_sender(events_tx.clone());

        let limit = Duration::from_millis(self.session.connect_timeout_ms);
        let connected = match transport.initialize(&self.session).await {
            Ok(()) => match tokio::time::timeout(limit, transport.connect()).await {
                Ok(result) => result,
                Err(_) => Err(SessionError::ConnectionFailed(format!(
                    "connect timed out after {} ms",
                    self.session.connect_timeout_ms
                ))),
            },
            Err(e) => Err(e),
        };
        if let Err(e) = connected {
            if let Err(close_err) = transport.close().await {
                tracing::debug!("close after failed connect: {close_err}");
            }
            streams.guard.release();
            return Err(e);
        }

        Ok(ActiveSession {
            transport,
            capture: streams.capture,
            player: Player::new(streams.sink),
            guard: streams.guard,
            events_rx,
            frames_rx,
            _events_tx: events_tx,
            _frames_tx: frames_tx,
        })
    }

    /// Tear the session down. Safe to call in any state.
    pub async fn stop(&mut self) {
        if self.active.is_none() && self.view.state == SessionState::Disconnected {
            return;
        }
        tracing::info!("stopping session");
        self.teardown().await;
    }

    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        if self.active.is_none() {
            tracing::debug!(?event, "event without an active session ignored");
            return;
        }

        match event {
            TransportEvent::Open => {
                if self.view.state != SessionState::Connecting {
                    return;
                }
                if let Some(active) = &self.active {
                    active.capture.set_streaming(true);
                }
                self.view.state = SessionState::Connected;
                tracing::info!("session open, streaming microphone");
                self.publish();
            }
            TransportEvent::Message(msg) => self.handle_server_message(&msg),
            TransportEvent::Close { reason } => {
                tracing::info!(reason = reason.as_deref().unwrap_or(""), "session closed by remote");
                self.teardown().await;
            }
            TransportEvent::Error(e) => {
                tracing::error!("transport error: {e}");
                self.view.error = Some(SessionError::ConnectionFailed(e).user_message());
                self.teardown().await;
            }
        }
    }

    fn handle_server_message(&mut self, msg: &ServerMessage) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if !self.view.state.is_streaming() {
            tracing::debug!(state = %self.view.state, "server content before open ignored");
            return;
        }

        if let Some(data) = msg.audio_data() {
            match pcm::decode_base64_chunk(data, self.playback.sample_rate, self.playback.channels) {
                Ok(chunk) if chunk.samples.is_empty() => {}
                Ok(chunk) => {
                    active.player.schedule(&chunk);
                    self.view.chunks_played += 1;
                    if self.view.state == SessionState::Connected {
                        self.view.state = SessionState::Speaking;
                        tracing::debug!("tutor speaking");
                    }
                }
                Err(e) => {
                    tracing::warn!("dropping undecodable audio chunk: {e}");
                    self.view.chunks_dropped += 1;
                }
            }
        }

        for text in msg.texts() {
            self.view.model_text.push(text.to_string());
        }
        let excess = self.view.model_text.len().saturating_sub(MODEL_TEXT_LIMIT);
        self.view.model_text.drain(..excess);

        if msg.is_interrupted() {
            let cancelled = active.player.interrupt();
            self.view.interruptions += 1;
            if self.view.state == SessionState::Speaking {
                self.view.state = SessionState::Connected;
            }
            tracing::info!(cancelled, "tutor interrupted");
        }

        self.view.queued_buffers = active.player.queue().len();
        self.publish();
    }

    /// Encode and send one microphone frame. Frames are dropped unless the
    /// session is open.
    pub async fn handle_captured_frame(&mut self, chunk: AudioChunk) {
        if !self.view.state.is_streaming() {
            return;
        }
        let Some(active) = self.active.as_mut() else {
            return;
        };

        let input = RealtimeInput {
            media: pcm::encode_blob(&chunk.samples, chunk.sample_rate),
        };
        match active.transport.send_realtime_input(input).await {
            Ok(()) => {
                self.view.frames_sent += 1;
                self.publish();
            }
            Err(e) => tracing::warn!("failed to send audio frame: {e}"),
        }
    }

    /// Reap finished playback; leave `Speaking` once the queue drains.
    /// A failed microphone or speaker stream ends the session.
    pub async fn poll_playback(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let failed = if active.capture.status() == StreamStatus::Error {
            Some("microphone stream failed")
        } else if active.player.sink_status() == StreamStatus::Error {
            Some("speaker stream failed")
        } else {
            None
        };
        if let Some(what) = failed {
            tracing::error!("{what}");
            let err = SessionError::Audio(AudioError::StreamError(what.to_string()));
            self.view.error = Some(err.user_message());
            self.teardown().await;
            return;
        }

        let drained = active.player.reap();
        let queued = active.player.queue().len();

        let mut changed = queued != self.view.queued_buffers;
        self.view.queued_buffers = queued;
        if drained && self.view.state == SessionState::Speaking {
            self.view.state = SessionState::Connected;
            tracing::debug!("playback drained");
            changed = true;
        }
        if changed {
            self.publish();
        }
    }

    async fn teardown(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.capture.set_streaming(false);
            let cancelled = active.player.interrupt();
            if let Err(e) = active.transport.close().await {
                tracing::warn!("transport close failed: {e}");
            }
            active.guard.release();
            tracing::debug!(cancelled, "session torn down");
        }
        self.view.state = SessionState::Disconnected;
        self.view.queued_buffers = 0;
        self.publish();
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view.clone());
    }

    /// Own the session until `Quit` arrives or the command channel closes,
    /// then tear it down.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<UiCommand>) {
        let period = Duration::from_millis(self.playback.poll_interval_ms.max(1));
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(UiCommand::Start) => {
                        // A command arriving mid-connect abandons the attempt.
                        let interrupted = tokio::select! {
                            biased;
                            // Failure is already reflected in the view.
                            _ = self.start() => None,
                            cmd = commands.recv() => Some(cmd),
                        };
                        if let Some(cmd) = interrupted {
                            tracing::info!("connect abandoned");
                            self.teardown().await;
                            if matches!(cmd, Some(UiCommand::Quit) | None) {
                                break;
                            }
                        }
                    }
                    Some(UiCommand::Stop) => self.stop().await,
                    Some(UiCommand::Quit) | None => break,
                },
                input = next_input(&mut self.active) => match input {
                    SessionInput::Event(event) => self.handle_transport_event(event).await,
                    SessionInput::Frame(chunk) => self.handle_captured_frame(chunk).await,
                },
                _ = tick.tick() => self.poll_playback().await,
            }
        }

        self.stop().await;
        tracing::info!("session controller stopped");
    }
}

/// Next transport event or captured frame; pending while disconnected.
async fn next_input(active: &mut Option<ActiveSession>) -> SessionInput {
    let Some(active) = active.as_mut() else {
        return std::future::pending().await;
    };
    tokio::select! {
        biased;
        Some(event) = active.events_rx.recv() => SessionInput::Event(event),
        Some(chunk) = active.frames_rx.recv() => SessionInput::Frame(chunk),
        else => std::future::pending().await,
    }
}
