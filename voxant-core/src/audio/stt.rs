//! Speech-to-text provider trait and implementations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::types::{AudioChunk, TranscriptionResult};
use crate::config::VoiceConfig;
use crate::error::VoiceError;

/// Trait for speech-to-text providers.
#[async_trait]
pub trait SttProvider: Send + Sync {
    /// Transcribe an audio chunk to text.
    async fn transcribe(&self, audio: &AudioChunk) -> Result<TranscriptionResult, VoiceError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// A mock STT provider for testing. Returns queued responses in order;
/// once the queue is exhausted the last response is repeated, matching a
/// recognizer whose best full-utterance guess stabilizes.
pub struct MockSttProvider {
    responses: Mutex<Vec<TranscriptionResult>>,
    last: Mutex<Option<TranscriptionResult>>,
    call_count: AtomicUsize,
}

impl MockSttProvider {
    /// Create a mock that always transcribes to empty text.
    pub fn new() -> Self {
        Self::with_responses(Vec::new())
    }

    /// Create a mock with pre-configured responses.
    pub fn with_responses(responses: Vec<TranscriptionResult>) -> Self {
        Self {
            responses: Mutex::new(responses),
            last: Mutex::new(None),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Create a mock that always returns the given text.
    pub fn fixed(text: &str) -> Self {
        Self::with_responses(vec![TranscriptionResult::text(text)])
    }

    /// Number of times `transcribe` was called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

impl Default for MockSttProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SttProvider for MockSttProvider {
    async fn transcribe(&self, _audio: &AudioChunk) -> Result<TranscriptionResult, VoiceError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if !responses.is_empty() {
            *last = Some(responses.remove(0));
        }
        Ok(last.clone().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// OpenAI Whisper API-based STT provider (HTTP, no native deps).
pub struct OpenAiSttProvider {
    api_key: String,
    model: String,
    language: String,
    base_url: String,
}

impl OpenAiSttProvider {
    /// Create a new Whisper HTTP provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "whisper-1".to_string(),
            language: "en".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    /// Build a provider from the voice configuration section.
    pub fn from_config(config: &VoiceConfig, api_key: impl Into<String>) -> Self {
        Self::new(api_key)
            .with_model(config.stt_model.clone())
            .with_language(config.stt_language.clone())
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the language hint.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl SttProvider for OpenAiSttProvider {
    async fn transcribe(&self, audio: &AudioChunk) -> Result<TranscriptionResult, VoiceError> {
        if audio.is_empty() {
            return Ok(TranscriptionResult::default());
        }

        let wav_bytes = super::wav::encode_wav(audio)?;

        let part = reqwest::multipart::Part::bytes(wav_bytes)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| VoiceError::TranscriptionFailed {
                message: format!("MIME error: {e}"),
            })?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", self.language.clone())
            .text("response_format", "json".to_string());

        let url = format!("{}/audio/transcriptions", self.base_url);

        let client = reqwest::Client::new();
        let response = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| VoiceError::TranscriptionFailed {
                message: format!("HTTP request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::TranscriptionFailed {
                message: format!("API returned {status}: {body}"),
            });
        }

        let body: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| VoiceError::TranscriptionFailed {
                    message: format!("invalid JSON: {e}"),
                })?;

        let text = body
            .get("text")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(TranscriptionResult {
            text,
            language: Some(self.language.clone()),
            duration_secs: audio.duration_secs(),
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}
