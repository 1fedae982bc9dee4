//! In-memory audio backend with a manually advanced clock.

use super::{AudioBackend, CaptureContext, EndedCallback, FrameSink, PlaybackContext, SourceId};
use crate::audio::SampleBuffer;
use crate::error::{RealtimeError, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Open/close counters, for asserting resource hygiene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Successful `open_capture` calls.
    pub captures_opened: usize,
    /// Capture contexts closed (first close only).
    pub captures_closed: usize,
    /// Successful `open_playback` calls.
    pub playbacks_opened: usize,
    /// Playback contexts closed (first close only).
    pub playbacks_closed: usize,
}

/// A segment currently scheduled on the virtual output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSegment {
    /// Segment id.
    pub id: SourceId,
    /// Start time on the playback clock.
    pub start_at: f64,
    /// Length in seconds.
    pub duration: f64,
}

#[derive(Default)]
struct Shared {
    deny_microphone: bool,
    stats: DeviceStats,
    capture: Option<Arc<Mutex<CaptureState>>>,
    playback: Option<Arc<VirtualPlayback>>,
}

/// Audio backend that never touches hardware.
///
/// Microphone input is injected with [`push_input`](Self::push_input) and the
/// output clock moves only when [`advance`](Self::advance) is called, which
/// makes playback scheduling fully deterministic.
#[derive(Clone, Default)]
pub struct VirtualAudioBackend {
    shared: Arc<Mutex<Shared>>,
}

impl VirtualAudioBackend {
    /// Create a backend with microphone access granted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `open_capture` calls fail as if permission was denied.
    pub fn deny_microphone(&self, deny: bool) {
        self.shared.lock().deny_microphone = deny;
    }

    /// Deliver microphone samples to the most recently opened capture context.
    ///
    /// Samples are dropped when capture has not been started or is closed.
    pub fn push_input(&self, samples: &[f32]) {
        let capture = self.shared.lock().capture.clone();
        if let Some(capture) = capture {
            let mut state = capture.lock();
            if state.closed {
                return;
            }
            if let Some(sink) = state.sink.as_mut() {
                sink(samples);
            }
        }
    }

    /// Move the playback clock forward, completing segments that end in time.
    pub fn advance(&self, seconds: f64) {
        let playback = self.shared.lock().playback.clone();
        if let Some(playback) = playback {
            playback.advance(seconds);
        }
    }

    /// Current playback clock, or zero when no playback context is open.
    pub fn current_time(&self) -> f64 {
        self.shared.lock().playback.as_ref().map_or(0.0, |p| p.current_time())
    }

    /// Segments that are scheduled and have not ended or been stopped.
    pub fn scheduled(&self) -> Vec<ScheduledSegment> {
        self.shared.lock().playback.as_ref().map(|p| p.segments()).unwrap_or_default()
    }

    /// Whether the most recent capture context has a sink attached.
    pub fn capture_started(&self) -> bool {
        self.shared
            .lock()
            .capture
            .as_ref()
            .is_some_and(|c| {
                let state = c.lock();
                state.sink.is_some() && !state.closed
            })
    }

    /// Open/close counters.
    pub fn stats(&self) -> DeviceStats {
        self.shared.lock().stats
    }
}

impl AudioBackend for VirtualAudioBackend {
    fn open_capture(&self, sample_rate: u32) -> Result<Box<dyn CaptureContext>> {
        let mut shared = self.shared.lock();
        if shared.deny_microphone {
            return Err(RealtimeError::device("microphone permission denied"));
        }
        let state = Arc::new(Mutex::new(CaptureState::default()));
        shared.capture = Some(state.clone());
        shared.stats.captures_opened += 1;
        Ok(Box::new(VirtualCapture { sample_rate, state, backend: self.shared.clone() }))
    }

    fn open_playback(
        &self,
        sample_rate: u32,
        on_ended: EndedCallback,
    ) -> Result<Arc<dyn PlaybackContext>> {
        let playback = Arc::new(VirtualPlayback {
            sample_rate,
            on_ended,
            backend: self.shared.clone(),
            state: Mutex::new(PlaybackState::default()),
        });
        let mut shared = self.shared.lock();
        shared.playback = Some(playback.clone());
        shared.stats.playbacks_opened += 1;
        Ok(playback)
    }
}

#[derive(Default)]
struct CaptureState {
    sink: Option<FrameSink>,
    closed: bool,
}

struct VirtualCapture {
    sample_rate: u32,
    state: Arc<Mutex<CaptureState>>,
    backend: Arc<Mutex<Shared>>,
}

impl CaptureContext for VirtualCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self, sink: FrameSink) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(RealtimeError::device("capture context is closed"));
        }
        state.sink = Some(sink);
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        state.sink = None;
        drop(state);
        self.backend.lock().stats.captures_closed += 1;
    }
}

#[derive(Default)]
struct PlaybackState {
    clock: f64,
    segments: Vec<ScheduledSegment>,
    closed: bool,
}

struct VirtualPlayback {
    sample_rate: u32,
    on_ended: EndedCallback,
    backend: Arc<Mutex<Shared>>,
    state: Mutex<PlaybackState>,
}

impl VirtualPlayback {
    fn advance(&self, seconds: f64) {
        let finished: Vec<SourceId> = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.clock += seconds;
            let clock = state.clock;
            let (done, pending): (Vec<_>, Vec<_>) = state
                .segments
                .drain(..)
                .partition(|s| s.start_at + s.duration <= clock + f64::EPSILON);
            state.segments = pending;
            done.into_iter().map(|s| s.id).collect()
        };
        for id in finished {
            (self.on_ended)(id);
        }
    }

    fn segments(&self) -> Vec<ScheduledSegment> {
        self.state.lock().segments.clone()
    }
}

impl PlaybackContext for VirtualPlayback {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.state.lock().clock
    }

    fn schedule(&self, id: SourceId, buffer: SampleBuffer, start_at: f64) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(RealtimeError::device("playback context is closed"));
        }
        state.segments.push(ScheduledSegment { id, start_at, duration: buffer.duration() });
        Ok(())
    }

    fn stop(&self, id: SourceId) {
        self.state.lock().segments.retain(|s| s.id != id);
    }

    fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        state.segments.clear();
        drop(state);
        self.backend.lock().stats.playbacks_closed += 1;
    }
}
