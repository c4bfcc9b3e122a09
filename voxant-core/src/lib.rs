//! # Voxant Core
//!
//! Engine for a push-to-talk voice assistant: bounded conversation
//! history, a chat-completion client, the speech capture/output
//! pipeline, the turn-taking state machine, and the avatar frame math.

pub mod audio;
pub mod avatar;
pub mod client;
pub mod config;
pub mod controller;
pub mod credentials;
pub mod error;
pub mod history;
pub mod types;

// Re-export commonly used types at the crate root.
pub use avatar::{AvatarFrame, AvatarPresenter};
pub use client::{ChatClient, CompletionClient, MockCompletionClient};
pub use config::{load_config, AppConfig, LlmConfig, MemoryConfig, VoiceConfig};
pub use controller::{ControllerCells, SourceFactory, TurnController};
pub use credentials::{
    CredentialStore, InMemoryCredentialStore, KeyringCredentialStore, API_KEY_ACCOUNT,
};
pub use error::{LlmError, Result, VoiceError, VoxantError};
pub use history::ConversationHistory;
pub use types::{InteractionState, Role, Turn};
