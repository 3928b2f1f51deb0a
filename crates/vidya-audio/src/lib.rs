pub mod backend;
pub mod capture;
pub mod device;
pub mod output;
pub mod pcm;
pub mod player;

pub use backend::{AudioBackend, AudioStreams, CpalBackend, CpalSettings, ReleaseGuard};
pub use capture::{CaptureHandle, CaptureNode, FrameAccumulator, StreamStatus};
pub use device::DeviceManager;
pub use output::{OutputHandle, OutputNode, OutputSink};
pub use player::{PlaybackQueue, PlaybackSink, Player, ScheduledBuffer};

use ringbuf::traits::Split;
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Create a ring buffer split into producer and consumer halves.
pub fn create_ring_buffer(capacity: usize) -> (HeapProd<f32>, HeapCons<f32>) {
    HeapRb::<f32>::new(capacity).split()
}
