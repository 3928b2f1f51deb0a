use crate::capture::StreamStatus;
use std::collections::VecDeque;
use vidya_core::AudioChunk;

/// Destination for decoded playback audio plus the clock it plays against.
pub trait PlaybackSink: Send {
    /// Seconds of audio the device has rendered since the sink was opened.
    fn current_time(&self) -> f64;
    /// Append samples after everything already queued. Returns how many were accepted.
    fn enqueue(&mut self, samples: &[f32]) -> usize;
    /// Discard everything queued but not yet rendered.
    fn flush(&mut self);
    /// Health of the device behind the sink.
    fn status(&self) -> StreamStatus {
        StreamStatus::Ok
    }
}

// ── PlaybackQueue ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledBuffer {
    pub id: u64,
    pub start: f64,
    pub duration: f64,
}

impl ScheduledBuffer {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Buffers currently scheduled on the sink, in start order.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    buffers: VecDeque<ScheduledBuffer>,
}

impl PlaybackQueue {
    pub fn push(&mut self, buffer: ScheduledBuffer) {
        self.buffers.push_back(buffer);
    }

    /// Drop every buffer whose playback has finished by `now`.
    pub fn remove_finished(&mut self, now: f64) -> usize {
        let before = self.buffers.len();
        self.buffers.retain(|b| b.end() > now);
        before - self.buffers.len()
    }

    pub fn clear(&mut self) -> usize {
        let n = self.buffers.len();
        self.buffers.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScheduledBuffer> {
        self.buffers.iter()
    }
}

// ── Player ────────────────────────────────────────────────────

/// Schedules decoded chunks back to back on a [`PlaybackSink`].
///
/// Each chunk starts at `max(clock, next_start)`; `next_start` then advances
/// by the chunk's duration, so chunks arriving at arbitrary times still play
/// in order without gaps or overlap.
pub struct Player {
    sink: Box<dyn PlaybackSink>,
    queue: PlaybackQueue,
    next_start: f64,
    next_id: u64,
}

impl Player {
    pub fn new(sink: Box<dyn PlaybackSink>) -> Self {
        Self {
            sink,
            queue: PlaybackQueue::default(),
            next_start: 0.0,
            next_id: 0,
        }
    }

    pub fn schedule(&mut self, chunk: &AudioChunk) -> ScheduledBuffer {
        let now = self.sink.current_time();
        let start = now.max(self.next_start);
        let duration = chunk.duration_secs();

        let accepted = self.sink.enqueue(&chunk.samples);
        if accepted < chunk.samples.len() {
            tracing::warn!(
                dropped = chunk.samples.len() - accepted,
                "playback buffer full, truncating chunk"
            );
        }

        self.next_start = start + duration;
        let buffer = ScheduledBuffer {
            id: self.next_id,
            start,
            duration,
        };
        self.next_id += 1;
        self.queue.push(buffer);
        tracing::trace!(id = buffer.id, start, duration, "scheduled playback buffer");
        buffer
    }

    /// Remove finished buffers. Returns `true` when this call drained the queue.
    pub fn reap(&mut self) -> bool {
        if self.queue.is_empty() {
            return false;
        }
        self.queue.remove_finished(self.sink.current_time());
        self.queue.is_empty()
    }

    /// Stop everything scheduled and reset the start cursor (barge-in).
    /// Returns how many buffers were cancelled.
    pub fn interrupt(&mut self) -> usize {
        self.sink.flush();
        self.next_start = 0.0;
        self.queue.clear()
    }

    pub fn next_start(&self) -> f64 {
        self.next_start
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn current_time(&self) -> f64 {
        self.sink.current_time()
    }

    pub fn sink_status(&self) -> StreamStatus {
        self.sink.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct SinkState {
        now: f64,
        samples: Vec<f32>,
        flushes: usize,
    }

    #[derive(Clone, Default)]
    struct ManualSink(Arc<Mutex<SinkState>>);

    impl ManualSink {
        fn set_time(&self, t: f64) {
            self.0.lock().unwrap().now = t;
        }
    }

    impl PlaybackSink for ManualSink {
        fn current_time(&self) -> f64 {
            self.0.lock().unwrap().now
        }

        fn enqueue(&mut self, samples: &[f32]) -> usize {
            self.0.lock().unwrap().samples.extend_from_slice(samples);
            samples.len()
        }

        fn flush(&mut self) {
            let mut s = self.0.lock().unwrap();
            s.samples.clear();
            s.flushes += 1;
        }
    }

    fn chunk_ms(ms: usize) -> AudioChunk {
        AudioChunk {
            samples: vec![0.1; 24 * ms],
            sample_rate: 24000,
            channels: 1,
        }
    }

    fn make_player() -> (Player, ManualSink) {
        let sink = ManualSink::default();
        (Player::new(Box::new(sink.clone())), sink)
    }

    #[test]
    fn test_first_chunk_starts_at_clock() {
        let (mut player, sink) = make_player();
        sink.set_time(1.5);
        let b = player.schedule(&chunk_ms(100));
        assert_eq!(b.start, 1.5);
        assert!((player.next_start() - 1.6).abs() < 1e-9);
    }

    #[test]
    fn test_chunks_chain_without_gaps() {
        let (mut player, sink) = make_player();
        sink.set_time(0.0);
        let durations = [100, 40, 250, 20];
        let mut prev: Option<ScheduledBuffer> = None;
        for (i, ms) in durations.iter().enumerate() {
            // Arrive while the previous chunk is still playing.
            sink.set_time(i as f64 * 0.01);
            let b = player.schedule(&chunk_ms(*ms));
            if let Some(p) = prev {
                assert!((b.start - p.end()).abs() < 1e-9, "gap between {:?} and {:?}", p, b);
            }
            prev = Some(b);
        }
        assert_eq!(player.queue().len(), 4);
    }

    #[test]
    fn test_late_chunk_starts_at_clock_not_stale_cursor() {
        let (mut player, sink) = make_player();
        player.schedule(&chunk_ms(100));
        sink.set_time(0.5);
        let b = player.schedule(&chunk_ms(100));
        assert_eq!(b.start, 0.5);
    }

    #[test]
    fn test_reap_reports_drain_once() {
        let (mut player, sink) = make_player();
        player.schedule(&chunk_ms(100));
        player.schedule(&chunk_ms(100));

        sink.set_time(0.15);
        assert!(!player.reap());
        assert_eq!(player.queue().len(), 1);

        sink.set_time(0.25);
        assert!(player.reap());
        assert!(player.is_idle());

        // Already empty: nothing drained by this call.
        assert!(!player.reap());
    }

    #[test]
    fn test_interrupt_clears_queue_and_resets_cursor() {
        let (mut player, sink) = make_player();
        player.schedule(&chunk_ms(100));
        player.schedule(&chunk_ms(100));
        player.schedule(&chunk_ms(100));

        sink.set_time(0.05);
        let cancelled = player.interrupt();
        assert_eq!(cancelled, 3);
        assert!(player.is_idle());
        assert_eq!(player.next_start(), 0.0);
        assert_eq!(sink.0.lock().unwrap().flushes, 1);
        assert!(sink.0.lock().unwrap().samples.is_empty());

        // Next chunk starts at the current clock, not at the old 0.3 cursor.
        let b = player.schedule(&chunk_ms(100));
        assert_eq!(b.start, 0.05);
    }

    #[test]
    fn test_samples_reach_sink_in_order() {
        let (mut player, sink) = make_player();
        let a = AudioChunk {
            samples: vec![0.1, 0.2],
            sample_rate: 24000,
            channels: 1,
        };
        let b = AudioChunk {
            samples: vec![0.3],
            sample_rate: 24000,
            channels: 1,
        };
        player.schedule(&a);
        player.schedule(&b);
        assert_eq!(sink.0.lock().unwrap().samples, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_queue_remove_finished_keeps_unfinished() {
        let mut q = PlaybackQueue::default();
        q.push(ScheduledBuffer { id: 0, start: 0.0, duration: 0.1 });
        q.push(ScheduledBuffer { id: 1, start: 0.1, duration: 0.1 });
        assert_eq!(q.remove_finished(0.1), 1);
        assert_eq!(q.iter().next().map(|b| b.id), Some(1));
    }
}
