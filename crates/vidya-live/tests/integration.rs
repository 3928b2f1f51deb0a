use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use vidya_audio::{AudioBackend, AudioStreams, CaptureHandle, PlaybackSink, ReleaseGuard};
use vidya_core::{
    AudioChunk, AudioError, PlaybackConfig, SessionConfig, SessionState, SessionView, UiCommand,
};
use vidya_live::{SessionController, TransportRegistry};

struct SilentSink;

impl PlaybackSink for SilentSink {
    fn current_time(&self) -> f64 {
        0.0
    }

    fn enqueue(&mut self, samples: &[f32]) -> usize {
        samples.len()
    }

    fn flush(&mut self) {}
}

/// Hands the frame sender back so the test can stand in for the microphone.
#[derive(Clone, Default)]
struct LoopbackBackend {
    capture: CaptureHandle,
    frames_tx: Arc<Mutex<Option<mpsc::UnboundedSender<AudioChunk>>>>,
    released: Arc<AtomicBool>,
}

impl AudioBackend for LoopbackBackend {
    fn name(&self) -> &str {
        "loopback"
    }

    fn open(
        &mut self,
        frames_tx: mpsc::UnboundedSender<AudioChunk>,
    ) -> Result<AudioStreams, AudioError> {
        *self.frames_tx.lock().unwrap() = Some(frames_tx);
        let released = Arc::clone(&self.released);
        Ok(AudioStreams {
            capture: self.capture.clone(),
            sink: Box::new(SilentSink),
            guard: ReleaseGuard::new(move || released.store(true, Ordering::SeqCst)),
        })
    }
}

fn null_controller(
    backend: LoopbackBackend,
) -> (SessionController, tokio::sync::watch::Receiver<SessionView>) {
    let session = SessionConfig {
        transport: "null".into(),
        ..Default::default()
    };
    SessionController::new(
        session,
        PlaybackConfig::default(),
        Box::new(backend),
        TransportRegistry::new(),
    )
}

async fn wait_for(
    rx: &mut tokio::sync::watch::Receiver<SessionView>,
    pred: impl FnMut(&SessionView) -> bool,
) -> SessionView {
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
        .await
        .expect("timed out")
        .expect("controller gone")
        .clone()
}

#[tokio::test]
async fn test_run_loop_start_stream_stop() {
    let backend = LoopbackBackend::default();
    let (controller, mut view_rx) = null_controller(backend.clone());
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(controller.run(cmd_rx));

    cmd_tx.send(UiCommand::Start).unwrap();
    wait_for(&mut view_rx, |v| v.state == SessionState::Connected).await;
    assert!(backend.capture.is_streaming());

    let frames_tx = backend.frames_tx.lock().unwrap().clone().unwrap();
    for _ in 0..3 {
        frames_tx
            .send(AudioChunk {
                samples: vec![0.1; 4096],
                sample_rate: 16000,
                channels: 1,
            })
            .unwrap();
    }
    let view = wait_for(&mut view_rx, |v| v.frames_sent == 3).await;
    assert_eq!(view.state, SessionState::Connected);

    cmd_tx.send(UiCommand::Stop).unwrap();
    wait_for(&mut view_rx, |v| v.state == SessionState::Disconnected).await;
    assert!(backend.released.load(Ordering::SeqCst));
    assert!(!backend.capture.is_streaming());

    cmd_tx.send(UiCommand::Quit).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("run loop did not exit")
        .unwrap();
}

#[tokio::test]
async fn test_closing_command_channel_tears_session_down() {
    let backend = LoopbackBackend::default();
    let (controller, mut view_rx) = null_controller(backend.clone());
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(controller.run(cmd_rx));

    cmd_tx.send(UiCommand::Start).unwrap();
    wait_for(&mut view_rx, |v| v.state == SessionState::Connected).await;

    drop(cmd_tx);
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("run loop did not exit")
        .unwrap();
    assert!(backend.released.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_unknown_transport_surfaces_error_in_view() {
    let backend = LoopbackBackend::default();
    let session = SessionConfig {
        transport: "carrier-pigeon".into(),
        ..Default::default()
    };
    let (controller, mut view_rx) = SessionController::new(
        session,
        PlaybackConfig::default(),
        Box::new(backend.clone()),
        TransportRegistry::new(),
    );
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(controller.run(cmd_rx));

    cmd_tx.send(UiCommand::Start).unwrap();
    let view = wait_for(&mut view_rx, |v| v.error.is_some()).await;
    assert_eq!(view.state, SessionState::Disconnected);
    assert_eq!(view.error.as_deref(), Some("Unknown transport: carrier-pigeon"));
    assert!(backend.released.load(Ordering::SeqCst));

    cmd_tx.send(UiCommand::Quit).unwrap();
    handle.await.unwrap();
}
