//! Property-based tests for the audio codec bridge.

use equilay_realtime::audio::{
    decode_pcm_to_samples, decode_text_to_bytes, encode_bytes_to_text, encode_samples_to_pcm16,
};
use proptest::prelude::*;

const QUANTUM: f32 = 1.0 / 32768.0;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// *For any* byte sequence, decoding the transport text yields the original bytes.
    #[test]
    fn prop_transport_text_round_trips(bytes in prop::collection::vec(any::<u8>(), 0..4096)) {
        let text = encode_bytes_to_text(&bytes);
        prop_assert_eq!(decode_text_to_bytes(&text).unwrap(), bytes);
    }

    /// *For any* samples in `[-1, 1)`, PCM16 encode then decode stays within one quantum.
    #[test]
    fn prop_pcm16_round_trip_within_quantum(
        samples in prop::collection::vec(-1.0f32..1.0f32, 0..2048)
    ) {
        let pcm = encode_samples_to_pcm16(&samples);
        prop_assert_eq!(pcm.len(), samples.len() * 2);

        let buffer = decode_pcm_to_samples(&pcm, 16_000, 1).unwrap();
        let decoded = buffer.channel(0).unwrap();
        prop_assert_eq!(decoded.len(), samples.len());
        for (original, restored) in samples.iter().zip(decoded) {
            prop_assert!(
                (original - restored).abs() <= QUANTUM,
                "{} decoded as {}",
                original,
                restored
            );
        }
    }

    /// *For any* float input, including out-of-range values, encoding saturates
    /// instead of wrapping around.
    #[test]
    fn prop_out_of_range_saturates(sample in -8.0f32..8.0f32) {
        let pcm = encode_samples_to_pcm16(&[sample]);
        let value = i16::from_le_bytes([pcm[0], pcm[1]]);
        if sample >= 1.0 {
            prop_assert_eq!(value, i16::MAX);
        } else if sample <= -1.0 {
            prop_assert_eq!(value, i16::MIN);
        } else {
            prop_assert_eq!(value.signum() as f32, if value == 0 { 0.0 } else { sample.signum() });
        }
    }

    /// *For any* interleaved stereo buffer, de-interleaving drops the trailing partial frame.
    #[test]
    fn prop_stereo_frame_count(bytes in prop::collection::vec(any::<u8>(), 0..1024)) {
        let buffer = decode_pcm_to_samples(&bytes, 24_000, 2).unwrap();
        prop_assert_eq!(buffer.frame_count(), bytes.len() / 4);
        prop_assert_eq!(buffer.channel_count(), 2);
    }
}

#[test]
fn test_malformed_transport_text_is_an_error() {
    assert!(decode_text_to_bytes("not*base64!").is_err());
}

#[test]
fn test_nan_encodes_as_silence() {
    assert_eq!(encode_samples_to_pcm16(&[f32::NAN]), vec![0, 0]);
}
