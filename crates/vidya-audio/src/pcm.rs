//! 16-bit PCM codec for the live session wire format.
//!
//! Outbound audio is float samples scaled by 32768 into signed little-endian
//! `i16`, then base64 encoded. Inbound audio is the reverse, normalized back
//! by dividing by 32768.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use byteorder::{ByteOrder, LittleEndian};
use vidya_core::{AudioChunk, CodecError, MediaBlob};

const PCM16_SCALE: f32 = 32768.0;

/// Sample rate of microphone audio sent upstream.
pub const CAPTURE_SAMPLE_RATE: u32 = 16000;

/// MIME descriptor for a PCM16 stream at `sample_rate`.
pub fn pcm_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={}", sample_rate)
}

/// Scale a float sample into `i16`.
///
/// Input is clamped to [-1.0, 1.0] first, so 1.0 maps to 32767 and -1.0 to
/// -32768. NaN maps to 0.
pub fn sample_to_i16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    let scaled = sample.clamp(-1.0, 1.0) * PCM16_SCALE;
    scaled.clamp(-32768.0, 32767.0) as i16
}

pub fn i16_to_sample(value: i16) -> f32 {
    value as f32 / PCM16_SCALE
}

/// Encode float samples as 16-bit signed little-endian PCM bytes.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let ints: Vec<i16> = samples.iter().map(|&s| sample_to_i16(s)).collect();
    let mut bytes = vec![0u8; ints.len() * 2];
    LittleEndian::write_i16_into(&ints, &mut bytes);
    bytes
}

/// Decode 16-bit signed little-endian PCM bytes into float samples.
pub fn decode_pcm16(bytes: &[u8]) -> Result<Vec<f32>, CodecError> {
    if bytes.len() % 2 != 0 {
        return Err(CodecError::OddLength(bytes.len()));
    }
    let mut ints = vec![0i16; bytes.len() / 2];
    LittleEndian::read_i16_into(bytes, &mut ints);
    Ok(ints.into_iter().map(i16_to_sample).collect())
}

/// Encode captured samples into the JSON media blob sent per frame.
pub fn encode_blob(samples: &[f32], sample_rate: u32) -> MediaBlob {
    MediaBlob {
        mime_type: pcm_mime_type(sample_rate),
        data: STANDARD.encode(encode_pcm16(samples)),
    }
}

/// Decode a base64 PCM16 payload into a playable chunk.
///
/// Trailing samples that do not fill a whole frame are discarded.
pub fn decode_base64_chunk(
    data: &str,
    sample_rate: u32,
    channels: u16,
) -> Result<AudioChunk, CodecError> {
    let bytes = STANDARD
        .decode(data)
        .map_err(|e| CodecError::InvalidBase64(e.to_string()))?;
    let mut samples = decode_pcm16(&bytes)?;
    let channels = channels.max(1);
    let whole = samples.len() - samples.len() % channels as usize;
    samples.truncate(whole);
    Ok(AudioChunk {
        samples,
        sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_for_capture_rate() {
        assert_eq!(pcm_mime_type(CAPTURE_SAMPLE_RATE), "audio/pcm;rate=16000");
    }

    #[test]
    fn test_encode_known_values_little_endian() {
        let bytes = encode_pcm16(&[0.0, 0.5, -0.5, -1.0]);
        // 0 -> 0x0000, 16384 -> 0x4000, -16384 -> 0xC000, -32768 -> 0x8000
        assert_eq!(bytes, vec![0x00, 0x00, 0x00, 0x40, 0x00, 0xC0, 0x00, 0x80]);
    }

    #[test]
    fn test_encode_clamps_out_of_range() {
        assert_eq!(sample_to_i16(1.0), 32767);
        assert_eq!(sample_to_i16(1.5), 32767);
        assert_eq!(sample_to_i16(-3.0), -32768);
        assert_eq!(sample_to_i16(f32::NAN), 0);
    }

    #[test]
    fn test_decode_known_values() {
        let samples = decode_pcm16(&[0x00, 0x40, 0x00, 0x80, 0xFF, 0x7F]).unwrap();
        assert_eq!(samples[0], 0.5);
        assert_eq!(samples[1], -1.0);
        assert!((samples[2] - 32767.0 / 32768.0).abs() < 1e-7);
    }

    #[test]
    fn test_decode_odd_length_fails() {
        assert_eq!(decode_pcm16(&[0x00, 0x40, 0x01]), Err(CodecError::OddLength(3)));
    }

    #[test]
    fn test_round_trip_within_quantization_error() {
        let input: Vec<f32> = (0..2000)
            .map(|i| ((i as f32) * 0.013).sin() * 0.9)
            .collect();
        let output = decode_pcm16(&encode_pcm16(&input)).unwrap();
        assert_eq!(output.len(), input.len());
        for (a, b) in input.iter().zip(output.iter()) {
            assert!((a - b).abs() <= 1.0 / 32768.0, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_encode_blob_shape() {
        let blob = encode_blob(&[0.0, 0.5], 16000);
        assert_eq!(blob.mime_type, "audio/pcm;rate=16000");
        assert_eq!(blob.data, STANDARD.encode([0x00, 0x00, 0x00, 0x40]));
    }

    #[test]
    fn test_decode_base64_chunk() {
        let blob = encode_blob(&[0.25, -0.25, 0.5], 24000);
        let chunk = decode_base64_chunk(&blob.data, 24000, 1).unwrap();
        assert_eq!(chunk.sample_rate, 24000);
        assert_eq!(chunk.channels, 1);
        assert_eq!(chunk.samples, vec![0.25, -0.25, 0.5]);
    }

    #[test]
    fn test_decode_base64_chunk_truncates_partial_frame() {
        let blob = encode_blob(&[0.25, -0.25, 0.5], 24000);
        let chunk = decode_base64_chunk(&blob.data, 24000, 2).unwrap();
        assert_eq!(chunk.samples, vec![0.25, -0.25]);
        assert_eq!(chunk.frames(), 1);
    }

    #[test]
    fn test_decode_base64_chunk_rejects_garbage() {
        let result = decode_base64_chunk("not base64!!", 24000, 1);
        assert!(matches!(result, Err(CodecError::InvalidBase64(_))));
    }

    #[test]
    fn test_decode_base64_chunk_rejects_odd_payload() {
        let data = STANDARD.encode([0x01, 0x02, 0x03]);
        let result = decode_base64_chunk(&data, 24000, 1);
        assert_eq!(result, Err(CodecError::OddLength(3)));
    }
}
