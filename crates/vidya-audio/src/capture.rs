use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use vidya_core::{AudioChunk, AudioError};

const STATUS_OK: u8 = 0;
const STATUS_ERROR: u8 = 1;

/// Health of an open audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamStatus {
    #[default]
    Ok,
    Error,
}

// ── CaptureHandle ─────────────────────────────────────────────

#[derive(Clone)]
pub struct CaptureHandle {
    streaming: Arc<AtomicBool>,
    status: Arc<AtomicU8>,
}

impl CaptureHandle {
    /// A handle that starts paused; frames are dropped until streaming is enabled.
    pub fn new() -> Self {
        Self {
            streaming: Arc::new(AtomicBool::new(false)),
            status: Arc::new(AtomicU8::new(STATUS_OK)),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Relaxed)
    }

    pub fn set_streaming(&self, v: bool) {
        self.streaming.store(v, Ordering::Relaxed);
    }

    pub fn status(&self) -> StreamStatus {
        match self.status.load(Ordering::Relaxed) {
            STATUS_ERROR => StreamStatus::Error,
            _ => StreamStatus::Ok,
        }
    }

    pub fn set_status(&self, s: StreamStatus) {
        let v = match s {
            StreamStatus::Ok => STATUS_OK,
            StreamStatus::Error => STATUS_ERROR,
        };
        self.status.store(v, Ordering::Relaxed);
    }
}

impl Default for CaptureHandle {
    fn default() -> Self {
        Self::new()
    }
}

// ── FrameAccumulator ──────────────────────────────────────────

/// Regroups device callback blocks of arbitrary size into fixed-size frames.
pub struct FrameAccumulator {
    frame_size: usize,
    sample_rate: u32,
    channels: u16,
    pending: Vec<f32>,
}

impl FrameAccumulator {
    pub fn new(frame_size: usize, sample_rate: u32, channels: u16) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            frame_size,
            sample_rate,
            channels,
            pending: Vec::with_capacity(frame_size),
        }
    }

    /// Append `data`, returning every frame that is now complete.
    pub fn push(&mut self, data: &[f32]) -> Vec<AudioChunk> {
        let mut frames = Vec::new();
        let mut rest = data;
        while !rest.is_empty() {
            let want = self.frame_size - self.pending.len();
            let take = want.min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.pending.len() == self.frame_size {
                let samples =
                    std::mem::replace(&mut self.pending, Vec::with_capacity(self.frame_size));
                frames.push(AudioChunk {
                    samples,
                    sample_rate: self.sample_rate,
                    channels: self.channels,
                });
            }
        }
        frames
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

// ── CaptureNode ───────────────────────────────────────────────

pub struct CaptureNode {
    _stream: Stream,
}

impl CaptureNode {
    pub fn new(
        device: &Device,
        sample_rate: u32,
        channels: u16,
        frame_size: usize,
        frames_tx: mpsc::UnboundedSender<AudioChunk>,
    ) -> Result<(Self, CaptureHandle), AudioError> {
        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let handle = CaptureHandle::new();
        let streaming_flag = Arc::clone(&handle.streaming);
        let status_flag = Arc::clone(&handle.status);
        let mut accumulator = FrameAccumulator::new(frame_size, sample_rate, channels);

        let err_callback = move |err: cpal::StreamError| {
            tracing::error!("capture stream error: {}", err);
            status_flag.store(STATUS_ERROR, Ordering::Relaxed);
        };

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !streaming_flag.load(Ordering::Relaxed) {
                        // Don't carry a stale partial frame into the next stream.
                        if accumulator.pending_len() > 0 {
                            accumulator.reset();
                        }
                        return;
                    }
                    for frame in accumulator.push(data) {
                        let _ = frames_tx.send(frame);
                    }
                },
                err_callback,
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        Ok((Self { _stream: stream }, handle))
    }
}
