//! Desktop audio through cpal.
//!
//! A cpal `Stream` is not `Send`, so each stream is built and owned by a
//! dedicated thread that parks until the context is closed.

use super::{AudioBackend, CaptureContext, EndedCallback, FrameSink, PlaybackContext, SourceId};
use crate::audio::SampleBuffer;
use crate::error::{RealtimeError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::JoinHandle;

/// Default host input/output devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalAudioBackend;

impl CpalAudioBackend {
    /// Create a backend bound to the default host.
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for CpalAudioBackend {
    fn open_capture(&self, sample_rate: u32) -> Result<Box<dyn CaptureContext>> {
        let sink: Arc<Mutex<Option<FrameSink>>> = Arc::new(Mutex::new(None));
        let stream_sink = sink.clone();
        let thread = StreamThread::spawn("equilay-capture", move || {
            build_capture_stream(sample_rate, stream_sink)
        })?;
        Ok(Box::new(CpalCapture { sample_rate, sink, thread: Some(thread) }))
    }

    fn open_playback(
        &self,
        sample_rate: u32,
        on_ended: EndedCallback,
    ) -> Result<Arc<dyn PlaybackContext>> {
        let mixer = Arc::new(Mutex::new(Mixer::default()));
        let stream_mixer = mixer.clone();
        let ended = on_ended.clone();
        let (thread, device_rate) = StreamThread::spawn_with("equilay-playback", move || {
            build_playback_stream(stream_mixer, ended)
        })?;
        Ok(Arc::new(CpalPlayback {
            sample_rate,
            device_rate,
            mixer,
            thread: Mutex::new(Some(thread)),
        }))
    }
}

/// Thread that owns a running stream until told to stop.
struct StreamThread {
    shutdown: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl StreamThread {
    fn spawn<F>(name: &str, build: F) -> Result<Self>
    where
        F: FnOnce() -> Result<cpal::Stream> + Send + 'static,
    {
        Self::spawn_with(name, move || build().map(|stream| (stream, ()))).map(|(t, ())| t)
    }

    fn spawn_with<F, T>(name: &str, build: F) -> Result<(Self, T)>
    where
        F: FnOnce() -> Result<(cpal::Stream, T)> + Send + 'static,
        T: Send + 'static,
    {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<T>>();
        let (shutdown, shutdown_rx) = mpsc::channel::<()>();

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || match build() {
                Ok((stream, value)) => {
                    if let Err(e) = stream.play() {
                        let _ = ready_tx.send(Err(RealtimeError::device(e.to_string())));
                        return;
                    }
                    let _ = ready_tx.send(Ok(value));
                    // Blocks until a shutdown signal arrives or the sender is dropped.
                    let _ = shutdown_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| RealtimeError::device(format!("failed to spawn audio thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(value)) => Ok((Self { shutdown, handle }, value)),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(RealtimeError::device("audio thread exited before the stream started"))
            }
        }
    }

    fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.join();
    }
}

fn build_capture_stream(
    target_rate: u32,
    sink: Arc<Mutex<Option<FrameSink>>>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| RealtimeError::device("no input device available"))?;
    let supported = device
        .default_input_config()
        .map_err(|e| RealtimeError::device(format!("microphone unavailable: {e}")))?;
    let format = supported.sample_format();
    let config: StreamConfig = supported.into();

    tracing::debug!(
        device_rate = config.sample_rate.0,
        channels = config.channels,
        target_rate,
        "opening capture stream"
    );

    match format {
        SampleFormat::F32 => input_stream::<f32>(&device, &config, target_rate, sink),
        SampleFormat::I16 => input_stream::<i16>(&device, &config, target_rate, sink),
        SampleFormat::U16 => input_stream::<u16>(&device, &config, target_rate, sink),
        other => Err(RealtimeError::device(format!("unsupported input sample format {other:?}"))),
    }
}

fn input_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    target_rate: u32,
    sink: Arc<Mutex<Option<FrameSink>>>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = usize::from(config.channels.max(1));
    let mut resampler = LinearResampler::new(config.sample_rate.0, target_rate);
    let mut mono = Vec::new();
    let mut resampled = Vec::new();

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                mono.clear();
                mono.extend(data.chunks(channels).map(|frame| {
                    frame.iter().map(|s| f32::from_sample(*s)).sum::<f32>() / frame.len() as f32
                }));
                resampled.clear();
                resampler.process(&mono, &mut resampled);
                if let Some(sink) = sink.lock().as_mut() {
                    sink(&resampled);
                }
            },
            |err| tracing::warn!(error = %err, "capture stream error"),
            None,
        )
        .map_err(|e| RealtimeError::device(format!("failed to build input stream: {e}")))
}

struct CpalCapture {
    sample_rate: u32,
    sink: Arc<Mutex<Option<FrameSink>>>,
    thread: Option<StreamThread>,
}

impl CaptureContext for CpalCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self, sink: FrameSink) -> Result<()> {
        if self.thread.is_none() {
            return Err(RealtimeError::device("capture context is closed"));
        }
        *self.sink.lock() = Some(sink);
        Ok(())
    }

    fn close(&mut self) {
        self.sink.lock().take();
        if let Some(thread) = self.thread.take() {
            thread.stop();
        }
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.close();
    }
}

struct MixVoice {
    id: SourceId,
    start_frame: u64,
    samples: Vec<f32>,
    source_rate: u32,
}

#[derive(Default)]
struct Mixer {
    frames_rendered: u64,
    voices: Vec<MixVoice>,
}

impl Mixer {
    /// Render one device buffer, returning the ids of voices that finished in it.
    fn render(&mut self, out: &mut [f32], channels: usize, device_rate: u32) -> Vec<SourceId> {
        let frames = out.len() / channels;
        for (offset, frame) in out.chunks_mut(channels).enumerate() {
            let t = self.frames_rendered + offset as u64;
            let mut acc = 0.0f32;
            for voice in &self.voices {
                if t < voice.start_frame {
                    continue;
                }
                let elapsed = (t - voice.start_frame) as f64;
                let idx = (elapsed * f64::from(voice.source_rate) / f64::from(device_rate)) as usize;
                if let Some(s) = voice.samples.get(idx) {
                    acc += *s;
                }
            }
            let value = acc.clamp(-1.0, 1.0);
            frame.iter_mut().for_each(|s| *s = value);
        }
        self.frames_rendered += frames as u64;

        let now = self.frames_rendered;
        let mut finished = Vec::new();
        self.voices.retain(|voice| {
            let played = now.saturating_sub(voice.start_frame) as f64 * f64::from(voice.source_rate)
                / f64::from(device_rate);
            let done = now > voice.start_frame && played >= voice.samples.len() as f64;
            if done {
                finished.push(voice.id);
            }
            !done
        });
        finished
    }
}

fn build_playback_stream(
    mixer: Arc<Mutex<Mixer>>,
    on_ended: EndedCallback,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| RealtimeError::device("no output device available"))?;
    let supported = device
        .default_output_config()
        .map_err(|e| RealtimeError::device(format!("speaker unavailable: {e}")))?;
    let format = supported.sample_format();
    let config: StreamConfig = supported.into();
    let device_rate = config.sample_rate.0;

    tracing::debug!(device_rate, channels = config.channels, "opening playback stream");

    let stream = match format {
        SampleFormat::F32 => output_stream::<f32>(&device, &config, mixer, on_ended),
        SampleFormat::I16 => output_stream::<i16>(&device, &config, mixer, on_ended),
        SampleFormat::U16 => output_stream::<u16>(&device, &config, mixer, on_ended),
        other => Err(RealtimeError::device(format!("unsupported output sample format {other:?}"))),
    }?;
    Ok((stream, device_rate))
}

fn output_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mixer: Arc<Mutex<Mixer>>,
    on_ended: EndedCallback,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels.max(1));
    let device_rate = config.sample_rate.0;
    let mut scratch = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.clear();
                scratch.resize(data.len(), 0.0f32);
                let finished = mixer.lock().render(&mut scratch, channels, device_rate);
                for (dst, src) in data.iter_mut().zip(&scratch) {
                    *dst = T::from_sample(*src);
                }
                for id in finished {
                    on_ended(id);
                }
            },
            |err| tracing::warn!(error = %err, "playback stream error"),
            None,
        )
        .map_err(|e| RealtimeError::device(format!("failed to build output stream: {e}")))
}

struct CpalPlayback {
    sample_rate: u32,
    device_rate: u32,
    mixer: Arc<Mutex<Mixer>>,
    thread: Mutex<Option<StreamThread>>,
}

impl PlaybackContext for CpalPlayback {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.mixer.lock().frames_rendered as f64 / f64::from(self.device_rate)
    }

    fn schedule(&self, id: SourceId, buffer: SampleBuffer, start_at: f64) -> Result<()> {
        if self.thread.lock().is_none() {
            return Err(RealtimeError::device("playback context is closed"));
        }
        let start_frame = (start_at.max(0.0) * f64::from(self.device_rate)).round() as u64;
        self.mixer.lock().voices.push(MixVoice {
            id,
            start_frame,
            source_rate: buffer.sample_rate(),
            samples: buffer.to_mono(),
        });
        Ok(())
    }

    fn stop(&self, id: SourceId) {
        self.mixer.lock().voices.retain(|v| v.id != id);
    }

    fn close(&self) {
        self.mixer.lock().voices.clear();
        if let Some(thread) = self.thread.lock().take() {
            thread.stop();
        }
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        self.close();
    }
}

/// Streaming linear-interpolation resampler.
struct LinearResampler {
    step: f64,
    position: f64,
    last: f32,
}

impl LinearResampler {
    fn new(from_rate: u32, to_rate: u32) -> Self {
        Self { step: f64::from(from_rate) / f64::from(to_rate.max(1)), position: 0.0, last: 0.0 }
    }

    fn process(&mut self, input: &[f32], out: &mut Vec<f32>) {
        if input.is_empty() {
            return;
        }
        if (self.step - 1.0).abs() < f64::EPSILON {
            out.extend_from_slice(input);
            return;
        }
        // Index -1 refers to the last sample of the previous buffer.
        let last = self.last;
        let at = |i: isize| if i < 0 { last } else { input[i as usize] };
        let end = (input.len() - 1) as f64;
        while self.position < end {
            let base = self.position.floor();
            let frac = (self.position - base) as f32;
            let i = base as isize;
            out.push(at(i) * (1.0 - frac) + at(i + 1) * frac);
            self.position += self.step;
        }
        self.position -= input.len() as f64;
        self.last = input[input.len() - 1];
    }
}
