//! Audio codec bridge: PCM16 ⇄ base64 wire text, PCM16 ⇄ normalized float samples.

use crate::error::{RealtimeError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Sample rate of microphone audio sent to the model.
pub const INPUT_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of model speech received from the server.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

const PCM16_SCALE: f32 = 32768.0;

/// Encode an arbitrary byte sequence as transport text (standard base64).
pub fn encode_bytes_to_text(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode transport text produced by [`encode_bytes_to_text`].
pub fn decode_text_to_bytes(text: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(text)
        .map_err(|e| RealtimeError::audio(format!("invalid base64 audio payload: {e}")))
}

/// Interpret `bytes` as interleaved signed 16-bit little-endian PCM and split it
/// into per-channel lanes normalized to `[-1, 1)`.
///
/// A trailing odd byte and a trailing partial frame are dropped.
pub fn decode_pcm_to_samples(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<SampleBuffer> {
    if channels == 0 {
        return Err(RealtimeError::config("channel count must be at least 1"));
    }
    if sample_rate == 0 {
        return Err(RealtimeError::config("sample rate must be non-zero"));
    }

    let channel_count = channels as usize;
    let total_samples = bytes.len() / 2;
    let frame_count = total_samples / channel_count;

    let mut lanes = vec![Vec::with_capacity(frame_count); channel_count];
    for (index, pair) in bytes.chunks_exact(2).take(frame_count * channel_count).enumerate() {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        lanes[index % channel_count].push(sample as f32 / PCM16_SCALE);
    }

    Ok(SampleBuffer { sample_rate, lanes })
}

/// Scale normalized float samples to 16-bit PCM and return little-endian bytes.
///
/// Values outside `[-1, 1)` saturate at the i16 limits; NaN maps to silence.
pub fn encode_samples_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        // float-to-int `as` truncates toward zero and saturates
        let value = (sample * PCM16_SCALE) as i16;
        data.extend_from_slice(&value.to_le_bytes());
    }
    data
}

/// Decoded audio, one lane of normalized samples per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    sample_rate: u32,
    lanes: Vec<Vec<f32>>,
}

impl SampleBuffer {
    /// Build a mono buffer from normalized samples.
    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self { sample_rate, lanes: vec![samples] }
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.lanes.len()
    }

    /// Samples of one channel.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.lanes.get(index).map(Vec::as_slice)
    }

    /// Frames per channel.
    pub fn frame_count(&self) -> usize {
        self.lanes.first().map_or(0, Vec::len)
    }

    /// Playback length in seconds.
    pub fn duration(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Average all channels into a single lane.
    pub fn to_mono(&self) -> Vec<f32> {
        match self.lanes.len() {
            0 => Vec::new(),
            1 => self.lanes[0].clone(),
            n => (0..self.frame_count())
                .map(|i| self.lanes.iter().map(|lane| lane[i]).sum::<f32>() / n as f32)
                .collect(),
        }
    }
}

/// Audio encoding formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoding {
    /// 16-bit little-endian PCM.
    #[serde(rename = "pcm16")]
    #[default]
    Pcm16,
}

impl std::fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pcm16 => write!(f, "pcm16"),
        }
    }
}

/// Complete audio format specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz (e.g., 24000, 16000).
    pub sample_rate: u32,
    /// Number of audio channels (1 = mono, 2 = stereo).
    pub channels: u16,
    /// Bits per sample.
    pub bits_per_sample: u8,
    /// Audio encoding format.
    pub encoding: AudioEncoding,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::pcm16_16khz()
    }
}

impl AudioFormat {
    /// PCM16 mono at 16kHz (microphone input).
    pub fn pcm16_16khz() -> Self {
        Self::pcm16_mono(INPUT_SAMPLE_RATE)
    }

    /// PCM16 mono at 24kHz (model speech output).
    pub fn pcm16_24khz() -> Self {
        Self::pcm16_mono(OUTPUT_SAMPLE_RATE)
    }

    /// PCM16 mono at an arbitrary rate.
    pub fn pcm16_mono(sample_rate: u32) -> Self {
        Self { sample_rate, channels: 1, bits_per_sample: 16, encoding: AudioEncoding::Pcm16 }
    }

    /// MIME type tag used on the wire, e.g. `audio/pcm;rate=16000`.
    pub fn mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_roundtrip() {
        let bytes = vec![0u8, 1, 2, 254, 255, 128];
        let text = encode_bytes_to_text(&bytes);
        assert_eq!(decode_text_to_bytes(&text).unwrap(), bytes);
    }

    #[test]
    fn test_decode_rejects_malformed_text() {
        let err = decode_text_to_bytes("not*base64!").unwrap_err();
        assert!(matches!(err, RealtimeError::AudioFormatError(_)));
    }

    #[test]
    fn test_decode_pcm_scales_by_32768() {
        let bytes = [0x00, 0x80, 0xff, 0x7f, 0x00, 0x00, 0x00, 0x40];
        let buffer = decode_pcm_to_samples(&bytes, OUTPUT_SAMPLE_RATE, 1).unwrap();
        assert_eq!(buffer.channel(0).unwrap(), &[-1.0, 32767.0 / 32768.0, 0.0, 0.5]);
    }

    #[test]
    fn test_decode_pcm_deinterleaves_and_drops_partial_frame() {
        // L=1, R=2, L=3, R=4, L=5 (partial frame), plus a stray byte
        let samples: [i16; 5] = [1, 2, 3, 4, 5];
        let mut bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        bytes.push(0xAA);

        let buffer = decode_pcm_to_samples(&bytes, 8000, 2).unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.channel(0).unwrap(), &[1.0 / 32768.0, 3.0 / 32768.0]);
        assert_eq!(buffer.channel(1).unwrap(), &[2.0 / 32768.0, 4.0 / 32768.0]);
    }

    #[test]
    fn test_decode_pcm_zero_channels_is_config_error() {
        assert!(matches!(
            decode_pcm_to_samples(&[0, 0], 16000, 0),
            Err(RealtimeError::ConfigError(_))
        ));
    }

    #[test]
    fn test_encode_saturates_out_of_range() {
        let bytes = encode_samples_to_pcm16(&[1.0, -1.0, 2.5, -3.0, f32::NAN]);
        let values: Vec<i16> =
            bytes.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect();
        assert_eq!(values, vec![i16::MAX, i16::MIN, i16::MAX, i16::MIN, 0]);
    }

    #[test]
    fn test_duration_of_one_second() {
        let buffer = SampleBuffer::mono(OUTPUT_SAMPLE_RATE, vec![0.0; 24_000]);
        assert!((buffer.duration() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_to_mono_averages_channels() {
        let samples: [i16; 4] = [16384, 0, -16384, 16384];
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let buffer = decode_pcm_to_samples(&bytes, 8000, 2).unwrap();
        assert_eq!(buffer.to_mono(), vec![0.25, 0.0]);
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(AudioFormat::pcm16_16khz().mime_type(), "audio/pcm;rate=16000");
        assert_eq!(AudioFormat::pcm16_24khz().mime_type(), "audio/pcm;rate=24000");
    }
}
