//! Chat model gateway
//!
//! Streams chat completions token-by-token from an OpenAI-compatible
//! endpoint. The server-sent-event framing is parsed incrementally so
//! tokens surface as soon as the wire delivers them.

use crate::config::ChatConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// One prior conversation turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// Stream of completion tokens
pub type TokenStream = BoxStream<'static, Result<String>>;

/// Trait for the chat model collaborator
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Stream a completion for the given system instruction and turns
    async fn stream_chat(&self, system: &str, turns: &[ChatTurn]) -> Result<TokenStream>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn>,
    stream: bool,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Drain complete SSE events out of an accumulation buffer, leaving
/// any partial trailing event in place. Returns the `data:` payloads.
fn drain_sse_events(buffer: &mut String) -> Vec<String> {
    let mut events = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let event: String = buffer.drain(..pos + 2).collect();
        for line in event.lines() {
            if let Some(data) = line.strip_prefix("data:") {
                events.push(data.trim_start().to_string());
            }
        }
    }

    events
}

/// Extract the token from one streamed completion chunk
fn extract_delta(data: &str) -> Option<String> {
    let chunk: StreamChunk = serde_json::from_str(data).ok()?;
    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|s| !s.is_empty())
}

/// OpenAI-compatible chat completion client
pub struct OpenAIChatClient {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAIChatClient {
    pub fn new(config: &ChatConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

struct SseState {
    inner: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: String,
    pending: VecDeque<String>,
    done: bool,
}

#[async_trait]
impl ChatModel for OpenAIChatClient {
    async fn stream_chat(&self, system: &str, turns: &[ChatTurn]) -> Result<TokenStream> {
        let url = format!("{}/chat/completions", self.api_base);

        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(ChatTurn {
            role: "system".to_string(),
            content: system.to_string(),
        });
        messages.extend(turns.iter().cloned());

        let request = CompletionRequest {
            model: &self.model,
            messages,
            stream: true,
        };

        let mut req = self.client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = req.send().await.map_err(|e| AppError::ChatModelError {
            message: format!("Request failed: {}", e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ChatModelError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let state = SseState {
            inner: response.bytes_stream().map(|r| r.map(|b| b.to_vec())).boxed(),
            buffer: String::new(),
            pending: VecDeque::new(),
            done: false,
        };

        let stream = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(token) = state.pending.pop_front() {
                    return Some((Ok(token), state));
                }

                if state.done {
                    return None;
                }

                match state.inner.next().await {
                    Some(Ok(bytes)) => {
                        state.buffer.push_str(&String::from_utf8_lossy(&bytes));
                        for data in drain_sse_events(&mut state.buffer) {
                            if data == "[DONE]" {
                                state.done = true;
                                break;
                            }
                            if let Some(token) = extract_delta(&data) {
                                state.pending.push_back(token);
                            }
                        }
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((
                            Err(AppError::ChatModelError {
                                message: format!("Stream error: {}", e),
                            }),
                            state,
                        ));
                    }
                    None => return None,
                }
            }
        });

        Ok(stream.boxed())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Mock chat model for testing: replays a scripted token sequence
pub struct MockChatModel {
    tokens: Vec<String>,
}

impl MockChatModel {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn stream_chat(&self, _system: &str, _turns: &[ChatTurn]) -> Result<TokenStream> {
        let tokens = self.tokens.clone();
        Ok(futures::stream::iter(tokens.into_iter().map(Ok)).boxed())
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_complete_events() {
        let mut buffer = "data: {\"a\":1}\n\ndata: [DONE]\n\n".to_string();
        let events = drain_sse_events(&mut buffer);
        assert_eq!(events, vec!["{\"a\":1}".to_string(), "[DONE]".to_string()]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_keeps_partial_event() {
        let mut buffer = "data: {\"a\":1}\n\ndata: {\"b\"".to_string();
        let events = drain_sse_events(&mut buffer);
        assert_eq!(events.len(), 1);
        assert_eq!(buffer, "data: {\"b\"");
    }

    #[test]
    fn test_extract_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hello"}}]}"#;
        assert_eq!(extract_delta(data), Some("Hello".to_string()));

        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(extract_delta(role_only), None);

        assert_eq!(extract_delta("not json"), None);
    }

    #[tokio::test]
    async fn test_mock_chat_model_streams_script() {
        let model = MockChatModel::new(vec!["Hel".to_string(), "lo".to_string()]);
        let stream = model.stream_chat("system", &[]).await.unwrap();
        let tokens: Vec<String> = stream.map(|t| t.unwrap()).collect().await;
        assert_eq!(tokens.join(""), "Hello");
    }
}
