//! Configuration system for Voxant.
//!
//! Uses `figment` for layered configuration: defaults -> config file ->
//! environment. The config file lives at `~/.config/voxant/config.toml`;
//! environment variables are prefixed `VOXANT_` with `__` as the section
//! separator (e.g. `VOXANT_LLM__MODEL=gpt-4o`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::history::DEFAULT_MAX_HISTORY;

/// Top-level configuration for the assistant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub voice: VoiceConfig,
    pub memory: MemoryConfig,
}

/// Configuration for the chat-completion client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name sent in the request body.
    pub model: String,
    /// Base URL of the OpenAI-compatible endpoint.
    pub base_url: String,
    /// Maximum tokens requested per reply.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Hard deadline on the whole request.
    pub request_timeout_secs: u64,
    /// Fixed system prompt prepended to every request.
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            max_tokens: 150,
            temperature: 0.7,
            request_timeout_secs: 30,
            system_prompt: "You are a helpful voice assistant. Answer concisely and \
                            naturally, as in conversation. Use simple language."
                .to_string(),
        }
    }
}

/// Configuration for the speech capture and output pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// STT model name (e.g. "whisper-1").
    pub stt_model: String,
    /// Language hint for STT (e.g. "en").
    pub stt_language: String,
    /// TTS model name (e.g. "tts-1").
    pub tts_model: String,
    /// TTS voice name.
    pub tts_voice: String,
    /// TTS speech speed multiplier.
    pub tts_speed: f32,
    /// How often the accumulated utterance is re-transcribed to produce
    /// a partial transcript, in milliseconds.
    pub partial_interval_ms: u64,
    /// Grace interval after stop, allowing a trailing final transcript
    /// to arrive, in milliseconds.
    pub stop_grace_ms: u64,
    /// Length of one playback progress window, in milliseconds.
    pub playback_window_ms: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            stt_model: "whisper-1".to_string(),
            stt_language: "en".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
            partial_interval_ms: 1000,
            stop_grace_ms: 500,
            playback_window_ms: 100,
        }
    }
}

/// Configuration for the conversation store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum number of turns kept in the conversation window.
    pub max_history_length: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_history_length: DEFAULT_MAX_HISTORY,
        }
    }
}

/// Path to the user-level config file, if a home directory exists.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "voxant")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration with layering: defaults -> user config file ->
/// optional explicit file -> `VOXANT_` environment variables.
pub fn load_config(config_file: Option<&Path>) -> Result<AppConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("VOXANT_").split("__"));

    figment.extract().map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.llm.model, "gpt-4");
        assert_eq!(config.llm.max_tokens, 150);
        assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.llm.request_timeout_secs, 30);
        assert_eq!(config.memory.max_history_length, 10);
        assert_eq!(config.voice.stop_grace_ms, 500);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[llm]\nmodel = \"gpt-4o-mini\"\nmax_tokens = 64\n\n[memory]\nmax_history_length = 4"
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.max_tokens, 64);
        assert_eq!(config.memory.max_history_length, 4);
        // Untouched sections keep defaults.
        assert_eq!(config.voice.tts_voice, "alloy");
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.llm.model, config.llm.model);
        assert_eq!(parsed.voice.partial_interval_ms, config.voice.partial_interval_ms);
    }
}
