//! Error types for the Voxant engine.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering the LLM client, the speech pipeline, credentials, and
//! configuration domains.

use std::path::PathBuf;

/// Top-level error type for the Voxant core library.
#[derive(Debug, thiserror::Error)]
pub enum VoxantError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Voice error: {0}")]
    Voice(#[from] VoiceError),

    #[error("Credential error: {0}")]
    Credential(#[from] crate::credentials::CredentialError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the chat-completion client.
///
/// Every variant is terminal for the current turn only: the controller
/// returns to idle and surfaces the message as assistant-facing text.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// No API key is configured. Raised before any network I/O.
    #[error("No API key configured; set one with `voxant key set`")]
    MissingCredential,

    /// The request could not complete (connection refused, DNS, reset).
    #[error("Network request failed: {message}")]
    Transport { message: String },

    /// The request exceeded the configured deadline.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The endpoint answered with a non-success status.
    #[error("API returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The response body did not match the expected shape.
    #[error("API response parse error: {message}")]
    ResponseParse { message: String },
}

impl LlmError {
    /// Short text suitable for speaking back to the user.
    pub fn user_facing(&self) -> String {
        match self {
            LlmError::MissingCredential => {
                "Please configure an API key in settings.".to_string()
            }
            LlmError::Transport { .. } | LlmError::Timeout { .. } => {
                "I couldn't reach the server. Please try again.".to_string()
            }
            LlmError::HttpStatus { .. } | LlmError::ResponseParse { .. } => {
                "I got an unexpected answer from the server. Please try again.".to_string()
            }
        }
    }
}

/// Errors from speech capture, transcription, synthesis, and playback.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("Transcription failed: {message}")]
    TranscriptionFailed { message: String },

    #[error("Speech synthesis failed: {message}")]
    SynthesisFailed { message: String },

    #[error("Audio capture failed: {message}")]
    CaptureFailed { message: String },

    #[error("Audio playback failed: {message}")]
    PlaybackFailed { message: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `VoxantError`.
pub type Result<T> = std::result::Result<T, VoxantError>;
