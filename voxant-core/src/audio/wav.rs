//! WAV encode/decode via `hound`.
//!
//! The Whisper HTTP transcription endpoint takes a WAV upload, so
//! captured f32 buffers are encoded to 16-bit PCM on the way out.

use super::types::AudioChunk;
use crate::error::VoiceError;

/// Convert f32 samples (-1.0..1.0) to i16 samples.
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

/// Convert i16 samples to f32 samples (-1.0..1.0).
pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / i16::MAX as f32).collect()
}

/// Encode an AudioChunk to 16-bit PCM WAV bytes.
pub fn encode_wav(chunk: &AudioChunk) -> Result<Vec<u8>, VoiceError> {
    let spec = hound::WavSpec {
        channels: chunk.channels,
        sample_rate: chunk.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(|e| {
            VoiceError::UnsupportedFormat {
                format: format!("WAV write error: {e}"),
            }
        })?;
        for sample in f32_to_i16(&chunk.samples) {
            writer
                .write_sample(sample)
                .map_err(|e| VoiceError::UnsupportedFormat {
                    format: format!("WAV sample write error: {e}"),
                })?;
        }
        writer
            .finalize()
            .map_err(|e| VoiceError::UnsupportedFormat {
                format: format!("WAV finalize error: {e}"),
            })?;
    }
    Ok(cursor.into_inner())
}

/// Decode WAV bytes to an AudioChunk.
pub fn decode_wav(data: &[u8]) -> Result<AudioChunk, VoiceError> {
    let cursor = std::io::Cursor::new(data);
    let mut reader =
        hound::WavReader::new(cursor).map_err(|e| VoiceError::UnsupportedFormat {
            format: format!("WAV read error: {e}"),
        })?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            // 1i32 << 31 would wrap negative for 32-bit samples.
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| VoiceError::UnsupportedFormat {
                    format: format!("WAV sample read error: {e}"),
                })?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| VoiceError::UnsupportedFormat {
                format: format!("WAV float sample read error: {e}"),
            })?,
    };

    Ok(AudioChunk::new(samples, spec.sample_rate, spec.channels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_i16_conversion() {
        let i16s = f32_to_i16(&[0.0, 1.0, -1.0, 0.5, -0.5]);
        assert_eq!(i16s[0], 0);
        assert_eq!(i16s[1], i16::MAX);
        assert_eq!(i16s[2], -i16::MAX);
        assert!(i16s[3] > 0 && i16s[4] < 0);

        let f32s = i16_to_f32(&[0, i16::MAX, -i16::MAX]);
        assert!((f32s[0]).abs() < 0.001);
        assert!((f32s[1] - 1.0).abs() < 0.001);
        assert!((f32s[2] + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_wav_roundtrip() {
        let original = AudioChunk::new(vec![0.0, 0.25, 0.5, 0.75, 1.0, 0.75, 0.5, 0.25], 16000, 1);
        let wav_bytes = encode_wav(&original).unwrap();
        assert_eq!(&wav_bytes[0..4], b"RIFF");

        let decoded = decode_wav(&wav_bytes).unwrap();
        assert_eq!(decoded.sample_rate, 16000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.samples.len(), original.samples.len());
        for (a, b) in original.samples.iter().zip(decoded.samples.iter()) {
            assert!((a - b).abs() < 0.001, "expected {a}, got {b}");
        }
    }

    #[test]
    fn test_decode_32_bit_int_preserves_sign() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            writer.write_sample(i32::MAX / 2).unwrap();
            writer.write_sample(i32::MIN / 2).unwrap();
            writer.finalize().unwrap();
        }

        let decoded = decode_wav(&cursor.into_inner()).unwrap();
        assert!((decoded.samples[0] - 0.5).abs() < 0.001, "got {}", decoded.samples[0]);
        assert!((decoded.samples[1] + 0.5).abs() < 0.001, "got {}", decoded.samples[1]);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = decode_wav(b"not a wav file").unwrap_err();
        assert!(matches!(err, VoiceError::UnsupportedFormat { .. }));
    }
}
