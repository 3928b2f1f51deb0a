use crate::capture::{CaptureHandle, CaptureNode};
use crate::device::DeviceManager;
use crate::output::{OutputNode, OutputSink};
use crate::player::PlaybackSink;
use tokio::sync::mpsc;
use vidya_core::{AudioChunk, AudioError};

/// Runs a release action exactly once, on [`release`](Self::release) or drop.
pub struct ReleaseGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ReleaseGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn release(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(f) = self.release.take() {
            f();
        }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.run();
    }
}

/// Microphone capture and speaker playback opened together for one session.
pub struct AudioStreams {
    pub capture: CaptureHandle,
    pub sink: Box<dyn PlaybackSink>,
    /// Closes both device streams when released or dropped.
    pub guard: ReleaseGuard,
}

/// Source of audio streams for a live session.
pub trait AudioBackend: Send {
    fn name(&self) -> &str;
    /// Acquire capture and playback. Captured frames are sent on `frames_tx`
    /// once streaming is enabled on the returned capture handle.
    fn open(&mut self, frames_tx: mpsc::UnboundedSender<AudioChunk>)
        -> Result<AudioStreams, AudioError>;
}

// ── CpalBackend ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CpalSettings {
    pub input_device: String,
    pub output_device: String,
    pub capture_rate: u32,
    pub frame_size: usize,
    pub playback_rate: u32,
    pub playback_channels: u16,
    /// Seconds of playback audio the ring buffer can hold.
    pub playback_buffer_secs: u32,
}

/// Opens real devices through cpal.
///
/// cpal streams cannot move between threads on every platform, so both
/// streams are built and owned by a dedicated `audio-io` thread that lives
/// until the session's guard is released.
pub struct CpalBackend {
    settings: CpalSettings,
}

impl CpalBackend {
    pub fn new(settings: CpalSettings) -> Self {
        Self { settings }
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open(
        &mut self,
        frames_tx: mpsc::UnboundedSender<AudioChunk>,
    ) -> Result<AudioStreams, AudioError> {
        let settings = self.settings.clone();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("audio-io".into())
            .spawn(move || match open_streams(&settings, frames_tx) {
                Ok((capture_node, output_node, capture, sink)) => {
                    if ready_tx.send(Ok((capture, sink))).is_err() {
                        return;
                    }
                    // Blocks until the guard sends or is dropped.
                    let _ = stop_rx.recv();
                    drop(capture_node);
                    drop(output_node);
                    tracing::debug!("audio streams closed");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| AudioError::StreamBuild(format!("failed to spawn audio thread: {e}")))?;

        let (capture, sink) = ready_rx
            .recv()
            .map_err(|_| AudioError::StreamBuild("audio thread exited early".to_string()))??;

        let guard = ReleaseGuard::new(move || {
            let _ = stop_tx.send(());
            if thread.join().is_err() {
                tracing::error!("audio thread panicked");
            }
        });

        Ok(AudioStreams {
            capture,
            sink: Box::new(sink),
            guard,
        })
    }
}

fn open_streams(
    settings: &CpalSettings,
    frames_tx: mpsc::UnboundedSender<AudioChunk>,
) -> Result<(CaptureNode, OutputNode, CaptureHandle, OutputSink), AudioError> {
    let devices = DeviceManager::new();
    let input = devices.get_input_device(&settings.input_device)?;
    let output = devices.get_output_device(&settings.output_device)?;

    let capacity = settings.playback_rate as usize
        * settings.playback_channels as usize
        * settings.playback_buffer_secs.max(1) as usize;
    let (producer, consumer) = crate::create_ring_buffer(capacity);

    let (output_node, output_handle) = OutputNode::new(
        &output,
        consumer,
        settings.playback_rate,
        settings.playback_channels,
    )?;
    let (capture_node, capture) = CaptureNode::new(
        &input,
        settings.capture_rate,
        1,
        settings.frame_size,
        frames_tx,
    )?;

    tracing::info!(
        input = %settings.input_device,
        output = %settings.output_device,
        capture_rate = settings.capture_rate,
        playback_rate = settings.playback_rate,
        "audio streams opened"
    );

    Ok((
        capture_node,
        output_node,
        capture,
        OutputSink::new(producer, output_handle),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_release_guard_runs_once_on_release() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let guard = ReleaseGuard::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        guard.release();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_guard_runs_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let c = Arc::clone(&count);
            let _guard = ReleaseGuard::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_cpal_backend_open_and_release() {
        let mut backend = CpalBackend::new(CpalSettings {
            input_device: "default".into(),
            output_device: "default".into(),
            capture_rate: 16000,
            frame_size: 4096,
            playback_rate: 24000,
            playback_channels: 1,
            playback_buffer_secs: 2,
        });
        let (tx, _rx) = mpsc::unbounded_channel();
        let streams = backend.open(tx).unwrap();
        assert!(!streams.capture.is_streaming());
        streams.guard.release();
    }
}
