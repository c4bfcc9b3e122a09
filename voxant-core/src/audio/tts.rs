//! Text-to-speech provider trait and implementations.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::types::{AudioChunk, SynthesisResult};
use crate::config::VoiceConfig;
use crate::error::VoiceError;

/// Trait for text-to-speech providers. Rate, pitch, and voice are fixed
/// provider configuration, not runtime-varying.
#[async_trait]
pub trait TtsProvider: Send + Sync {
    /// Synthesize speech for a piece of text.
    async fn synthesize(&self, text: &str) -> Result<SynthesisResult, VoiceError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// A mock TTS provider for testing. Generates a 440 Hz sine wave whose
/// length scales with the text.
pub struct MockTtsProvider {
    call_count: AtomicUsize,
    secs_per_char: f32,
}

impl MockTtsProvider {
    /// Create a new mock TTS provider.
    pub fn new() -> Self {
        Self {
            call_count: AtomicUsize::new(0),
            secs_per_char: 0.05,
        }
    }

    /// Create a mock producing very short utterances, for fast tests.
    pub fn brief() -> Self {
        Self {
            call_count: AtomicUsize::new(0),
            secs_per_char: 0.001,
        }
    }

    /// Number of times `synthesize` was called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

impl Default for MockTtsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TtsProvider for MockTtsProvider {
    async fn synthesize(&self, text: &str) -> Result<SynthesisResult, VoiceError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);

        let sample_rate = 16000u32;
        let duration_secs = (text.len() as f32 * self.secs_per_char).max(0.01);
        let num_samples = (sample_rate as f32 * duration_secs) as usize;

        let samples: Vec<f32> = (0..num_samples)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5
            })
            .collect();

        Ok(SynthesisResult {
            audio: AudioChunk::new(samples, sample_rate, 1),
            duration_secs,
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// OpenAI TTS provider (HTTP, no native deps).
pub struct OpenAiTtsProvider {
    api_key: String,
    model: String,
    voice: String,
    speed: f32,
    base_url: String,
}

impl OpenAiTtsProvider {
    /// Create a new OpenAI TTS provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            speed: 1.0,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    /// Build a provider from the voice configuration section.
    pub fn from_config(config: &VoiceConfig, api_key: impl Into<String>) -> Self {
        Self::new(api_key)
            .with_model(config.tts_model.clone())
            .with_voice(config.tts_voice.clone())
            .with_speed(config.tts_speed)
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the voice.
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    /// Set the speech speed multiplier.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl TtsProvider for OpenAiTtsProvider {
    async fn synthesize(&self, text: &str) -> Result<SynthesisResult, VoiceError> {
        let url = format!("{}/audio/speech", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
            "speed": self.speed,
            "response_format": "wav",
        });

        let client = reqwest::Client::new();
        let response = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::SynthesisFailed {
                message: format!("HTTP request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::SynthesisFailed {
                message: format!("API returned {status}: {body}"),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VoiceError::SynthesisFailed {
                message: format!("failed to read response: {e}"),
            })?;

        let audio = super::wav::decode_wav(&bytes)?;
        let duration_secs = audio.duration_secs();

        Ok(SynthesisResult {
            audio,
            duration_secs,
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}
