//! Chat-completion client.
//!
//! Stateless mapping of (system prompt, history, new user message) to an
//! assistant reply over a single HTTP round-trip against any endpoint
//! following the OpenAI chat completions format. History mutation is the
//! caller's responsibility; a failed call must not produce an assistant
//! turn.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::LlmConfig;
use crate::credentials::{CredentialStore, API_KEY_ACCOUNT};
use crate::error::LlmError;
use crate::types::Turn;

/// Anything that can turn (history, new user message) into a reply.
/// Implemented by [`ChatClient`] over HTTP and by [`MockCompletionClient`]
/// in tests.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Complete one turn. `history` is the window before the new user
    /// message.
    async fn complete(&self, history: &[Turn], user_message: &str) -> Result<String, LlmError>;
}

/// Client for the chat-completion endpoint.
///
/// The credential is resolved from the injected store on every call and
/// never cached beyond call scope.
pub struct ChatClient {
    http: Client,
    config: LlmConfig,
    credentials: Arc<dyn CredentialStore>,
}

impl ChatClient {
    /// Create a new client. The HTTP client carries an explicit request
    /// timeout so a hung call cannot strand the controller in thinking.
    pub fn new(
        config: LlmConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, LlmError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LlmError::Transport {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            config,
            credentials,
        })
    }

    /// Complete one turn: `[system, ...history, user]` in, reply text out.
    ///
    /// `history` is the window *before* the new user message; the user
    /// message is appended to the payload here so it appears exactly once.
    /// Short-circuits with `MissingCredential` before any network I/O if
    /// no (non-blank) key is stored.
    pub async fn complete(
        &self,
        history: &[Turn],
        user_message: &str,
    ) -> Result<String, LlmError> {
        let api_key = match self.credentials.get_key(API_KEY_ACCOUNT) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => return Err(LlmError::MissingCredential),
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        let body = self.build_body(history, user_message);

        debug!(url = %url, model = %self.config.model, "Sending completion request");

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        timeout_secs: self.config.request_timeout_secs,
                    }
                } else {
                    LlmError::Transport {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let response_body = response.text().await.map_err(|e| LlmError::Transport {
            message: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(LlmError::HttpStatus {
                status: status.as_u16(),
                body: response_body,
            });
        }

        let parsed: Value =
            serde_json::from_str(&response_body).map_err(|e| LlmError::ResponseParse {
                message: format!("invalid JSON: {e}"),
            })?;

        Self::parse_reply(&parsed)
    }

    /// Build the request payload: fixed system prompt, the history
    /// window, then the new user message.
    fn build_body(&self, history: &[Turn], user_message: &str) -> Value {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(json!({
            "role": "system",
            "content": self.config.system_prompt,
        }));
        for turn in history {
            messages.push(json!({
                "role": turn.role.to_string(),
                "content": turn.content,
            }));
        }
        messages.push(json!({
            "role": "user",
            "content": user_message,
        }));

        json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        })
    }

    /// Extract the first choice's message content, trimmed.
    pub(crate) fn parse_reply(body: &Value) -> Result<String, LlmError> {
        let content = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .ok_or_else(|| LlmError::ResponseParse {
                message: "no choices[0].message.content in response".to_string(),
            })?;
        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl CompletionClient for ChatClient {
    async fn complete(&self, history: &[Turn], user_message: &str) -> Result<String, LlmError> {
        ChatClient::complete(self, history, user_message).await
    }
}

/// A scripted completion client for tests: returns queued results in
/// order and records every call.
pub struct MockCompletionClient {
    responses: std::sync::Mutex<Vec<Result<String, LlmError>>>,
    calls: std::sync::Mutex<Vec<(Vec<Turn>, String)>>,
}

impl MockCompletionClient {
    /// Create a mock with pre-queued results.
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// A mock that always replies with the given text.
    pub fn always(reply: &str) -> Self {
        Self::new(vec![Ok(reply.to_string())])
    }

    /// Number of completions issued.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// The recorded (history, user message) pairs.
    pub fn calls(&self) -> Vec<(Vec<Turn>, String)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, history: &[Turn], user_message: &str) -> Result<String, LlmError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((history.to_vec(), user_message.to_string()));
        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        if responses.is_empty() {
            Ok(String::new())
        } else if responses.len() == 1 {
            // Keep replaying the last scripted result.
            match &responses[0] {
                Ok(text) => Ok(text.clone()),
                Err(_) => responses.remove(0),
            }
        } else {
            responses.remove(0)
        }
    }
}
