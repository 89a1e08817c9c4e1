//! Speech-to-text gateway
//!
//! Fallback transcript acquisition: used only when the catalog has no
//! ready-made transcript for an episode. Transcription of long audio
//! can take tens of minutes, so the client timeout comes from its own
//! config section rather than any request-scoped budget.

use crate::config::TranscriptionConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One diarized utterance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub speaker_label: Option<String>,
}

/// Transcription result: flat text plus timed utterances when the
/// service diarized the audio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    #[serde(default)]
    pub utterances: Vec<Utterance>,
}

#[derive(Serialize)]
struct TranscribeRequest<'a> {
    url: &'a str,
    model: &'a str,
}

/// Trait for the speech-to-text collaborator
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe audio fetched from a URL
    async fn transcribe(&self, audio_url: &str) -> Result<Transcription>;
}

/// HTTP client for the speech-to-text API
pub struct TranscriptionClient {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    max_retries: u32,
}

impl TranscriptionClient {
    pub fn new(config: &TranscriptionConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_secs(1),
            max_elapsed_time: Some(Duration::from_secs(
                30 * u64::from(self.max_retries.max(1)),
            )),
            ..ExponentialBackoff::default()
        }
    }
}

#[async_trait]
impl SpeechToText for TranscriptionClient {
    async fn transcribe(&self, audio_url: &str) -> Result<Transcription> {
        let url = format!("{}/listen", self.api_base);

        let op = || async {
            let mut req = self.client.post(&url).json(&TranscribeRequest {
                url: audio_url,
                model: &self.model,
            });
            if let Some(ref key) = self.api_key {
                req = req.header("Authorization", format!("Token {}", key));
            }

            let response = req.send().await.map_err(|e| {
                backoff::Error::transient(AppError::TranscriptionError {
                    message: format!("Request failed: {}", e),
                })
            })?;

            let status = response.status();
            if status.is_server_error() {
                return Err(backoff::Error::transient(AppError::TranscriptionError {
                    message: format!("API error {}", status),
                }));
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(backoff::Error::permanent(AppError::TranscriptionError {
                    message: format!("API error {}: {}", status, body),
                }));
            }

            response.json::<Transcription>().await.map_err(|e| {
                backoff::Error::permanent(AppError::TranscriptionError {
                    message: format!("Failed to parse response: {}", e),
                })
            })
        };

        let transcription = backoff::future::retry(self.backoff(), op).await?;

        if transcription.text.is_empty() {
            return Err(AppError::TranscriptionError {
                message: "Service returned an empty transcript".to_string(),
            });
        }

        Ok(transcription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transcription_response() {
        let json = r#"{
            "text": "Hello there. General Kenobi.",
            "utterances": [
                {"text": "Hello there.", "start_time": 0.0, "end_time": 1.2, "speaker_label": "S1"},
                {"text": "General Kenobi.", "start_time": 1.4, "end_time": 2.9, "speaker_label": "S2"}
            ]
        }"#;

        let transcription: Transcription = serde_json::from_str(json).unwrap();
        assert_eq!(transcription.utterances.len(), 2);
        assert_eq!(transcription.utterances[1].speaker_label.as_deref(), Some("S2"));
    }

    #[test]
    fn test_parse_flat_transcription() {
        // No diarization: utterances default to empty
        let json = r#"{"text": "Just words."}"#;
        let transcription: Transcription = serde_json::from_str(json).unwrap();
        assert!(transcription.utterances.is_empty());
    }
}
