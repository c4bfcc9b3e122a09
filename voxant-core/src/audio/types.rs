//! Core audio data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VoiceError;

/// A chunk of audio data. Internal representation is always f32 samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioChunk {
    /// Audio samples in f32 format (-1.0 to 1.0).
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g., 16000, 44100).
    pub sample_rate: u32,
    /// Number of audio channels (1 = mono, 2 = stereo).
    pub channels: u16,
    /// Optional timestamp for when this chunk was captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl AudioChunk {
    /// Create a new audio chunk from samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
            timestamp: None,
        }
    }

    /// Create a silent audio chunk with the given parameters.
    pub fn silence(sample_rate: u32, channels: u16, num_samples: usize) -> Self {
        Self::new(vec![0.0; num_samples], sample_rate, channels)
    }

    /// Duration of this chunk in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / (self.sample_rate as f32 * self.channels as f32)
    }

    /// Root mean square energy of the audio.
    pub fn rms_energy(&self) -> f32 {
        super::level::rms(&self.samples)
    }

    /// Whether this chunk contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Append another chunk's samples. Fails if sample rate or channel
    /// count differ.
    pub fn append(&mut self, other: &AudioChunk) -> Result<(), VoiceError> {
        if self.sample_rate != other.sample_rate || self.channels != other.channels {
            return Err(VoiceError::UnsupportedFormat {
                format: format!(
                    "cannot append {} Hz/{} ch onto {} Hz/{} ch",
                    other.sample_rate, other.channels, self.sample_rate, self.channels
                ),
            });
        }
        self.samples.extend_from_slice(&other.samples);
        Ok(())
    }

    /// Iterate over consecutive windows of `window_ms` milliseconds.
    /// The last window may be shorter.
    pub fn windows_ms(&self, window_ms: u64) -> impl Iterator<Item = &[f32]> {
        let per_window = ((self.sample_rate as u64 * window_ms / 1000) as usize
            * self.channels as usize)
            .max(1);
        self.samples.chunks(per_window)
    }
}

/// Result of a speech-to-text transcription.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// The full transcribed text.
    pub text: String,
    /// Detected language code (e.g., "en").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Duration of the transcribed audio in seconds.
    #[serde(default)]
    pub duration_secs: f32,
}

impl TranscriptionResult {
    /// Create a result carrying only text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Result of a text-to-speech synthesis.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    /// The synthesized audio.
    pub audio: AudioChunk,
    /// Duration of the output audio in seconds.
    pub duration_secs: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_chunk() {
        let chunk = AudioChunk::silence(16000, 1, 480);
        assert_eq!(chunk.samples.len(), 480);
        assert!(!chunk.is_empty());
        assert!((chunk.rms_energy() - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_duration() {
        // 16000 samples at 16kHz mono = 1 second
        let chunk = AudioChunk::silence(16000, 1, 16000);
        assert!((chunk.duration_secs() - 1.0).abs() < 0.001);

        // 32000 samples at 16kHz stereo = 1 second
        let stereo = AudioChunk::silence(16000, 2, 32000);
        assert!((stereo.duration_secs() - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_append() {
        let mut a = AudioChunk::new(vec![0.1, 0.2], 16000, 1);
        let b = AudioChunk::new(vec![0.3, 0.4], 16000, 1);
        a.append(&b).unwrap();
        assert_eq!(a.samples, vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_append_format_mismatch() {
        let mut a = AudioChunk::new(vec![0.1], 16000, 1);
        let resampled = AudioChunk::new(vec![0.2], 44100, 1);
        let err = a.append(&resampled).unwrap_err();
        assert!(matches!(err, VoiceError::UnsupportedFormat { .. }));

        let stereo = AudioChunk::new(vec![0.2, 0.2], 16000, 2);
        assert!(a.append(&stereo).is_err());
        // The receiving chunk is untouched on failure.
        assert_eq!(a.samples, vec![0.1]);
    }

    #[test]
    fn test_windows_ms() {
        // 100ms windows at 16kHz mono = 1600 samples per window
        let chunk = AudioChunk::silence(16000, 1, 4000);
        let windows: Vec<&[f32]> = chunk.windows_ms(100).collect();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].len(), 1600);
        assert_eq!(windows[2].len(), 800);
    }

    #[test]
    fn test_transcription_result_text() {
        let result = TranscriptionResult::text("hello");
        assert_eq!(result.text, "hello");
        assert!(result.language.is_none());
    }
}
