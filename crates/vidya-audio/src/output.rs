use crate::capture::StreamStatus;
use crate::player::PlaybackSink;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer};
use ringbuf::{HeapCons, HeapProd};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use vidya_core::AudioError;

const STATUS_OK: u8 = 0;
const STATUS_ERROR: u8 = 1;

// ── OutputHandle ──────────────────────────────────────────────

/// Shared status and clock for an output stream.
#[derive(Clone)]
pub struct OutputHandle {
    status: Arc<AtomicU8>,
    frames_rendered: Arc<AtomicU64>,
    /// Samples popped from the ring so far.
    samples_consumed: Arc<AtomicU64>,
    /// Everything pushed before this sample index is discarded unplayed.
    flush_mark: Arc<AtomicU64>,
    sample_rate: u32,
    channels: u16,
}

impl OutputHandle {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            status: Arc::new(AtomicU8::new(STATUS_OK)),
            frames_rendered: Arc::new(AtomicU64::new(0)),
            samples_consumed: Arc::new(AtomicU64::new(0)),
            flush_mark: Arc::new(AtomicU64::new(0)),
            sample_rate,
            channels,
        }
    }

    pub fn status(&self) -> StreamStatus {
        match self.status.load(Ordering::Relaxed) {
            STATUS_ERROR => StreamStatus::Error,
            _ => StreamStatus::Ok,
        }
    }

    /// Frames written to the device so far, silence included.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    /// Playback clock in seconds.
    pub fn current_time(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames_rendered() as f64 / self.sample_rate as f64
    }

    /// Discard, on the next callback, every sample pushed before `pushed`.
    /// Samples pushed afterwards still play.
    pub fn flush_before(&self, pushed: u64) {
        self.flush_mark.fetch_max(pushed, Ordering::Release);
    }

    /// Fill one device buffer from `consumer`. Runs on the audio callback thread.
    pub fn render(&self, consumer: &mut HeapCons<f32>, data: &mut [f32]) {
        let mark = self.flush_mark.load(Ordering::Acquire);
        let mut consumed = self.samples_consumed.load(Ordering::Relaxed);
        if consumed < mark {
            consumed += consumer.skip((mark - consumed) as usize) as u64;
        }
        for sample in data.iter_mut() {
            *sample = match consumer.try_pop() {
                Some(s) => {
                    consumed += 1;
                    s
                }
                None => 0.0,
            };
        }
        self.samples_consumed.store(consumed, Ordering::Relaxed);

        let frames = data.len() / self.channels.max(1) as usize;
        self.frames_rendered
            .fetch_add(frames as u64, Ordering::Relaxed);
    }
}

// ── OutputNode ────────────────────────────────────────────────

pub struct OutputNode {
    _stream: Stream,
}

impl OutputNode {
    pub fn new(
        device: &Device,
        mut consumer: HeapCons<f32>,
        sample_rate: u32,
        channels: u16,
    ) -> Result<(Self, OutputHandle), AudioError> {
        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let handle = OutputHandle::new(sample_rate, channels);
        let callback_handle = handle.clone();
        let status_flag = Arc::clone(&handle.status);

        let err_callback = move |err: cpal::StreamError| {
            tracing::error!("output stream error: {}", err);
            status_flag.store(STATUS_ERROR, Ordering::Relaxed);
        };

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback_handle.render(&mut consumer, data);
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

// ── OutputSink ────────────────────────────────────────────────

/// [`PlaybackSink`] that feeds an [`OutputNode`] through a ring buffer.
pub struct OutputSink {
    producer: HeapProd<f32>,
    handle: OutputHandle,
    pushed: u64,
}

impl OutputSink {
    pub fn new(producer: HeapProd<f32>, handle: OutputHandle) -> Self {
        Self {
            producer,
            handle,
            pushed: 0,
        }
    }
}

impl PlaybackSink for OutputSink {
    fn current_time(&self) -> f64 {
        self.handle.current_time()
    }

    fn enqueue(&mut self, samples: &[f32]) -> usize {
        let accepted = self.producer.push_slice(samples);
        self.pushed += accepted as u64;
        accepted
    }

    fn flush(&mut self) {
        self.handle.flush_before(self.pushed);
    }

    fn status(&self) -> StreamStatus {
        self.handle.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_ring_buffer;

    #[test]
    fn test_output_handle_defaults() {
        let handle = OutputHandle::new(24000, 1);
        assert_eq!(handle.status(), StreamStatus::Ok);
        assert_eq!(handle.current_time(), 0.0);
    }

    #[test]
    fn test_output_handle_clone_shares_status() {
        let h1 = OutputHandle::new(24000, 1);
        let h2 = h1.clone();
        h1.status.store(STATUS_ERROR, Ordering::Relaxed);
        assert_eq!(h2.status(), StreamStatus::Error);
    }

    #[test]
    fn test_sink_reports_stream_error() {
        let handle = OutputHandle::new(24000, 1);
        let (prod, _cons) = create_ring_buffer(4);
        let sink = OutputSink::new(prod, handle.clone());
        assert_eq!(sink.status(), StreamStatus::Ok);
        handle.status.store(STATUS_ERROR, Ordering::Relaxed);
        assert_eq!(sink.status(), StreamStatus::Error);
    }

    #[test]
    fn test_render_pulls_samples_then_silence() {
        let handle = OutputHandle::new(24000, 1);
        let (prod, mut cons) = create_ring_buffer(64);
        let mut sink = OutputSink::new(prod, handle.clone());
        sink.enqueue(&[0.1, 0.2, 0.3]);

        let mut data = [9.0f32; 5];
        handle.render(&mut cons, &mut data);
        assert_eq!(data, [0.1, 0.2, 0.3, 0.0, 0.0]);
        assert_eq!(handle.frames_rendered(), 5);
    }

    #[test]
    fn test_clock_advances_with_rendered_frames() {
        let handle = OutputHandle::new(24000, 1);
        let (_prod, mut cons) = create_ring_buffer(64);
        let mut data = vec![0.0f32; 2400];
        handle.render(&mut cons, &mut data);
        assert!((handle.current_time() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_clock_counts_frames_not_samples_for_stereo() {
        let handle = OutputHandle::new(24000, 2);
        let (_prod, mut cons) = create_ring_buffer(64);
        let mut data = vec![0.0f32; 4800];
        handle.render(&mut cons, &mut data);
        assert_eq!(handle.frames_rendered(), 2400);
    }

    #[test]
    fn test_flush_discards_queued_audio() {
        let handle = OutputHandle::new(24000, 1);
        let (prod, mut cons) = create_ring_buffer(64);
        let mut sink = OutputSink::new(prod, handle.clone());
        sink.enqueue(&[0.5; 10]);
        sink.flush();

        let mut data = [1.0f32; 4];
        handle.render(&mut cons, &mut data);
        assert_eq!(data, [0.0; 4]);
    }

    #[test]
    fn test_audio_enqueued_after_flush_still_plays() {
        let handle = OutputHandle::new(24000, 1);
        let (prod, mut cons) = create_ring_buffer(64);
        let mut sink = OutputSink::new(prod, handle.clone());
        sink.enqueue(&[0.5; 10]);
        sink.flush();
        sink.enqueue(&[0.9; 4]);

        let mut data = [1.0f32; 4];
        handle.render(&mut cons, &mut data);
        assert_eq!(data, [0.9; 4]);
    }

    #[test]
    fn test_flush_mid_playback_skips_only_unplayed_samples() {
        let handle = OutputHandle::new(24000, 1);
        let (prod, mut cons) = create_ring_buffer(64);
        let mut sink = OutputSink::new(prod, handle.clone());
        sink.enqueue(&[0.5; 8]);

        let mut data = [0.0f32; 3];
        handle.render(&mut cons, &mut data);
        assert_eq!(data, [0.5; 3]);

        sink.flush();
        sink.enqueue(&[0.2, 0.3]);
        let mut data = [1.0f32; 4];
        handle.render(&mut cons, &mut data);
        assert_eq!(data, [0.2, 0.3, 0.0, 0.0]);
        assert_eq!(handle.frames_rendered(), 7);
    }

    #[test]
    fn test_sink_reports_overflow() {
        let handle = OutputHandle::new(24000, 1);
        let (prod, _cons) = create_ring_buffer(4);
        let mut sink = OutputSink::new(prod, handle);
        assert_eq!(sink.enqueue(&[0.1; 6]), 4);
    }
}
