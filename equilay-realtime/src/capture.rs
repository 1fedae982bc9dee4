//! Outbound audio capture: microphone samples to queued realtime input.

use crate::audio::{AudioFormat, encode_bytes_to_text, encode_samples_to_pcm16};
use crate::device::FrameSink;
use crate::events::{MediaBlob, OutboundMessage};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Samples per outbound frame.
pub const DEFAULT_FRAME_SIZE: usize = 4096;

const DROP_WARN_INTERVAL: u64 = 50;

/// Accumulates captured samples into fixed-size frames.
///
/// Device callbacks deliver arbitrary block sizes; the framer keeps the
/// remainder buffered until the next push completes a frame.
#[derive(Debug, Clone)]
pub struct CaptureFramer {
    frame_size: usize,
    buffer: Vec<f32>,
}

impl CaptureFramer {
    /// Create a framer emitting frames of `frame_size` samples (minimum 1).
    pub fn new(frame_size: usize) -> Self {
        let frame_size = frame_size.max(1);
        Self { frame_size, buffer: Vec::with_capacity(frame_size * 2) }
    }

    /// Frame length in samples.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Samples waiting for a frame to complete.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Push new samples into the buffer.
    pub fn push(&mut self, samples: &[f32]) {
        self.buffer.extend_from_slice(samples);
    }

    /// Take the next complete frame, if one is buffered.
    pub fn next_frame(&mut self) -> Option<Vec<f32>> {
        if self.buffer.len() < self.frame_size {
            return None;
        }
        let rest = self.buffer.split_off(self.frame_size);
        Some(std::mem::replace(&mut self.buffer, rest))
    }
}

/// Counters shared between the capture callback and its owner.
#[derive(Debug, Default)]
pub struct CaptureStats {
    sent: AtomicU64,
    dropped: AtomicU64,
}

impl CaptureStats {
    /// Frames handed to the outbound queue.
    pub fn frames_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Frames discarded because the outbound queue was full.
    pub fn frames_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Turns microphone samples into `OutboundMessage::Audio` on a bounded queue.
///
/// The sink never blocks: when the queue is full the frame is discarded and
/// counted, and when the queue is closed the frame is discarded silently.
#[derive(Debug, Clone)]
pub struct CapturePipeline {
    frame_size: usize,
    mime_type: String,
    queue: mpsc::Sender<OutboundMessage>,
    stats: Arc<CaptureStats>,
}

impl CapturePipeline {
    /// Create a pipeline for mono PCM16 at `sample_rate`.
    pub fn new(queue: mpsc::Sender<OutboundMessage>, frame_size: usize, sample_rate: u32) -> Self {
        Self {
            frame_size,
            mime_type: AudioFormat::pcm16_mono(sample_rate).mime_type(),
            queue,
            stats: Arc::new(CaptureStats::default()),
        }
    }

    /// Shared counters for this pipeline.
    pub fn stats(&self) -> Arc<CaptureStats> {
        self.stats.clone()
    }

    /// Build the callback handed to [`CaptureContext::start`](crate::device::CaptureContext::start).
    pub fn sink(&self) -> FrameSink {
        let mut framer = CaptureFramer::new(self.frame_size);
        let pipeline = self.clone();
        Box::new(move |samples: &[f32]| {
            framer.push(samples);
            while let Some(frame) = framer.next_frame() {
                pipeline.forward(&frame);
            }
        })
    }

    fn forward(&self, frame: &[f32]) {
        let media = MediaBlob {
            data: encode_bytes_to_text(&encode_samples_to_pcm16(frame)),
            mime_type: self.mime_type.clone(),
        };
        match self.queue.try_send(OutboundMessage::Audio(media)) {
            Ok(()) => {
                self.stats.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % DROP_WARN_INTERVAL == 0 {
                    tracing::warn!(dropped, "outbound audio queue full, dropping capture frame");
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{decode_pcm_to_samples, decode_text_to_bytes};

    #[test]
    fn test_framer_emits_fixed_frames() {
        let mut framer = CaptureFramer::new(4);
        framer.push(&[0.1, 0.2, 0.3]);
        assert!(framer.next_frame().is_none());

        framer.push(&[0.4, 0.5, 0.6, 0.7, 0.8, 0.9]);
        assert_eq!(framer.next_frame().unwrap(), vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(framer.next_frame().unwrap(), vec![0.5, 0.6, 0.7, 0.8]);
        assert!(framer.next_frame().is_none());
        assert_eq!(framer.buffered(), 1);
    }

    #[test]
    fn test_framer_zero_size_is_one() {
        let mut framer = CaptureFramer::new(0);
        framer.push(&[0.5, 0.5]);
        assert_eq!(framer.frame_size(), 1);
        assert_eq!(framer.next_frame().unwrap().len(), 1);
    }

    #[test]
    fn test_sink_enqueues_encoded_frames() {
        let (tx, mut rx) = mpsc::channel(8);
        let pipeline = CapturePipeline::new(tx, 4, 16_000);
        let mut sink = pipeline.sink();

        sink(&[0.5, -0.5, 0.25]);
        assert!(rx.try_recv().is_err());
        sink(&[0.0, 0.1]);

        match rx.try_recv().unwrap() {
            OutboundMessage::Audio(media) => {
                assert_eq!(media.mime_type, "audio/pcm;rate=16000");
                let bytes = decode_text_to_bytes(&media.data).unwrap();
                let buffer = decode_pcm_to_samples(&bytes, 16_000, 1).unwrap();
                assert_eq!(buffer.channel(0).unwrap(), &[0.5, -0.5, 0.25, 0.0]);
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(pipeline.stats().frames_sent(), 1);
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let pipeline = CapturePipeline::new(tx, 2, 16_000);
        let mut sink = pipeline.sink();

        sink(&[0.1; 8]);
        let stats = pipeline.stats();
        assert_eq!(stats.frames_sent(), 1);
        assert_eq!(stats.frames_dropped(), 3);

        assert!(rx.try_recv().is_ok());
        sink(&[0.1; 2]);
        assert_eq!(stats.frames_sent(), 2);
    }

    #[test]
    fn test_closed_queue_is_silent() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let pipeline = CapturePipeline::new(tx, 2, 16_000);
        let mut sink = pipeline.sink();
        sink(&[0.1; 4]);
        assert_eq!(pipeline.stats().frames_sent(), 0);
        assert_eq!(pipeline.stats().frames_dropped(), 0);
    }
}
