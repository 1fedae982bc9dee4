//! Audio platform seam.
//!
//! The voice manager only talks to these traits. [`VirtualAudioBackend`] runs
//! fully in memory; `CpalAudioBackend` (feature `desktop-audio`) drives the
//! default microphone and speakers.

use crate::audio::SampleBuffer;
use crate::error::Result;
use std::sync::Arc;
use tokio::runtime::RuntimeFlavor;

#[cfg(feature = "desktop-audio")]
mod cpal;
mod virtual_device;

#[cfg(feature = "desktop-audio")]
pub use self::cpal::CpalAudioBackend;
pub use virtual_device::{DeviceStats, ScheduledSegment, VirtualAudioBackend};

/// Identifier of one scheduled playback segment.
pub type SourceId = u64;

/// Receives mono microphone samples, normalized to `[-1, 1)`, at the capture rate.
pub type FrameSink = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Invoked once when a segment finishes playing on its own.
///
/// Not invoked for segments removed with [`PlaybackContext::stop`].
pub type EndedCallback = Arc<dyn Fn(SourceId) + Send + Sync + 'static>;

/// Run a device call that may block the calling thread.
///
/// On a multi-thread runtime the worker hands its other tasks off first.
/// Elsewhere the call runs in place.
pub(crate) fn blocking_device_call<T>(call: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(call)
        }
        _ => call(),
    }
}

/// Factory for capture and playback contexts.
///
/// Opening and closing may block while a hardware stream starts or stops.
pub trait AudioBackend: Send + Sync {
    /// Acquire the microphone. Fails when access is denied or no device exists.
    fn open_capture(&self, sample_rate: u32) -> Result<Box<dyn CaptureContext>>;

    /// Open an output graph running at `sample_rate`.
    fn open_playback(
        &self,
        sample_rate: u32,
        on_ended: EndedCallback,
    ) -> Result<Arc<dyn PlaybackContext>>;
}

/// A microphone input graph bound to one hardware stream.
pub trait CaptureContext: Send {
    /// Rate of the samples delivered to the sink.
    fn sample_rate(&self) -> u32;

    /// Begin delivering samples to `sink`.
    fn start(&mut self, sink: FrameSink) -> Result<()>;

    /// Release the device. Calling this more than once is a no-op.
    fn close(&mut self);
}

/// An output graph with its own clock.
pub trait PlaybackContext: Send + Sync {
    /// Rate of the output graph.
    fn sample_rate(&self) -> u32;

    /// Playback clock in seconds since the context was opened.
    fn current_time(&self) -> f64;

    /// Schedule `buffer` to start at `start_at` seconds on this context's clock.
    fn schedule(&self, id: SourceId, buffer: SampleBuffer, start_at: f64) -> Result<()>;

    /// Stop a segment immediately, whether it is playing or still pending.
    fn stop(&self, id: SourceId);

    /// Stop all output and release the device. Calling this more than once is a no-op.
    fn close(&self);
}
