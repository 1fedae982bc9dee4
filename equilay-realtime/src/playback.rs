//! Gapless scheduling of model speech with barge-in support.

use crate::audio::{SampleBuffer, decode_pcm_to_samples};
use crate::device::{PlaybackContext, SourceId};
use crate::error::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One scheduled speech segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackHandle {
    /// Id used by the playback context.
    pub id: SourceId,
    /// Start time on the playback clock, in seconds.
    pub start_at: f64,
    /// Segment length in seconds.
    pub duration: f64,
}

impl PlaybackHandle {
    /// Time at which the segment finishes.
    pub fn end_at(&self) -> f64 {
        self.start_at + self.duration
    }
}

/// Queues decoded segments back to back on a [`PlaybackContext`].
///
/// The scheduler is the single owner of the playback cursor and the set of
/// active handles. "Speaking" is derived from that set, so the two can never
/// disagree.
pub struct PlaybackScheduler {
    context: Arc<dyn PlaybackContext>,
    cursor: f64,
    active: BTreeMap<SourceId, PlaybackHandle>,
    next_id: SourceId,
}

impl PlaybackScheduler {
    /// Create a scheduler on top of an open playback context.
    pub fn new(context: Arc<dyn PlaybackContext>) -> Self {
        Self { context, cursor: 0.0, active: BTreeMap::new(), next_id: 1 }
    }

    /// Decode mono PCM16 at the context rate and schedule it.
    pub fn enqueue(&mut self, pcm: &[u8]) -> Result<PlaybackHandle> {
        let buffer = decode_pcm_to_samples(pcm, self.context.sample_rate(), 1)?;
        self.schedule_buffer(buffer)
    }

    /// Schedule an already decoded buffer right after the previous segment.
    pub fn schedule_buffer(&mut self, buffer: SampleBuffer) -> Result<PlaybackHandle> {
        let start_at = self.cursor.max(self.context.current_time());
        let duration = buffer.duration();
        let id = self.next_id;

        self.context.schedule(id, buffer, start_at)?;
        self.next_id += 1;
        self.cursor = start_at + duration;

        let handle = PlaybackHandle { id, start_at, duration };
        self.active.insert(id, handle);
        tracing::trace!(id, start_at, duration, "scheduled speech segment");
        Ok(handle)
    }

    /// A segment finished on its own. Returns `false` for unknown ids.
    pub fn on_ended(&mut self, id: SourceId) -> bool {
        self.active.remove(&id).is_some()
    }

    /// Drop all queued and playing speech and rewind the cursor.
    ///
    /// Returns the number of segments that were stopped.
    pub fn interrupt(&mut self) -> usize {
        let stopped = self.active.len();
        for id in self.active.keys() {
            self.context.stop(*id);
        }
        self.active.clear();
        self.cursor = 0.0;
        stopped
    }

    /// Stop everything; used on teardown.
    pub fn stop_all(&mut self) {
        self.interrupt();
    }

    /// Whether any segment is scheduled or playing.
    pub fn is_speaking(&self) -> bool {
        !self.active.is_empty()
    }

    /// Where the next segment will start, unless the clock has moved past it.
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Handles that have neither ended nor been stopped.
    pub fn active_handles(&self) -> impl Iterator<Item = &PlaybackHandle> {
        self.active.values()
    }

    /// Number of active handles.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Underlying playback context.
    pub fn context(&self) -> &Arc<dyn PlaybackContext> {
        &self.context
    }
}

impl std::fmt::Debug for PlaybackScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackScheduler")
            .field("cursor", &self.cursor)
            .field("active", &self.active.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encode_samples_to_pcm16;
    use crate::device::{AudioBackend, VirtualAudioBackend};
    use parking_lot::Mutex;

    fn setup() -> (VirtualAudioBackend, PlaybackScheduler, Arc<Mutex<Vec<SourceId>>>) {
        let backend = VirtualAudioBackend::new();
        let ended = Arc::new(Mutex::new(Vec::new()));
        let sink = ended.clone();
        let ctx = backend.open_playback(24_000, Arc::new(move |id| sink.lock().push(id))).unwrap();
        (backend, PlaybackScheduler::new(ctx), ended)
    }

    fn half_second() -> Vec<u8> {
        encode_samples_to_pcm16(&vec![0.1; 12_000])
    }

    #[test]
    fn test_segments_queue_back_to_back() {
        let (_backend, mut scheduler, _) = setup();
        let first = scheduler.enqueue(&half_second()).unwrap();
        let second = scheduler.enqueue(&half_second()).unwrap();

        assert_eq!(first.start_at, 0.0);
        assert!((second.start_at - 0.5).abs() < 1e-9);
        assert!((scheduler.cursor() - 1.0).abs() < 1e-9);
        assert!(scheduler.is_speaking());
    }

    #[test]
    fn test_start_never_before_clock() {
        let (backend, mut scheduler, ended) = setup();
        let first = scheduler.enqueue(&half_second()).unwrap();
        backend.advance(2.0);
        for id in ended.lock().drain(..) {
            scheduler.on_ended(id);
        }
        assert_eq!(first.id, 1);
        assert!(!scheduler.is_speaking());

        let late = scheduler.enqueue(&half_second()).unwrap();
        assert!((late.start_at - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_interrupt_clears_everything() {
        let (backend, mut scheduler, ended) = setup();
        for _ in 0..3 {
            scheduler.enqueue(&half_second()).unwrap();
        }
        assert_eq!(scheduler.interrupt(), 3);
        assert!(!scheduler.is_speaking());
        assert_eq!(scheduler.cursor(), 0.0);
        assert!(backend.scheduled().is_empty());

        backend.advance(5.0);
        assert!(ended.lock().is_empty());
    }

    #[test]
    fn test_unknown_end_is_ignored() {
        let (_backend, mut scheduler, _) = setup();
        scheduler.enqueue(&half_second()).unwrap();
        assert!(!scheduler.on_ended(99));
        assert!(scheduler.is_speaking());
        assert!(scheduler.on_ended(1));
        assert!(!scheduler.is_speaking());
    }

    #[test]
    fn test_schedule_failure_leaves_state_untouched() {
        let (_backend, mut scheduler, _) = setup();
        scheduler.context().close();
        assert!(scheduler.enqueue(&half_second()).is_err());
        assert!(!scheduler.is_speaking());
        assert_eq!(scheduler.cursor(), 0.0);
    }
}
