//! Podcast catalog gateway
//!
//! Wraps the third-party podcast metadata/search API behind a narrow
//! trait: search, podcast/episode metadata, and ready-made transcripts
//! when the catalog has them.

use crate::config::CatalogConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Normalized podcast record from the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPodcast {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub total_episode_count: i32,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Normalized episode record from the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEpisode {
    pub uuid: String,
    pub name: String,
    pub audio_url: String,
    #[serde(default)]
    pub duration_seconds: Option<i32>,
    #[serde(default)]
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub episode_number: Option<i32>,
    #[serde(default)]
    pub season_number: Option<i32>,
}

/// A timed transcript segment as provided by the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSegment {
    pub text: String,
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub speaker: Option<String>,
}

/// Ready-made transcript from the catalog, possibly still being
/// generated on their side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogTranscript {
    pub status: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub segments: Vec<CatalogSegment>,
}

impl CatalogTranscript {
    /// Usable only when the catalog marks it complete and it carries text
    pub fn is_complete(&self) -> bool {
        self.status.eq_ignore_ascii_case("completed")
            && self.text.as_deref().is_some_and(|t| !t.is_empty())
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    podcasts: Vec<CatalogPodcast>,
}

#[derive(Deserialize)]
struct EpisodesResponse {
    #[serde(default)]
    episodes: Vec<CatalogEpisode>,
}

/// Trait for the catalog collaborator
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Full-text podcast search
    async fn search_podcasts(&self, query: &str) -> Result<Vec<CatalogPodcast>>;

    /// Fetch one podcast by catalog identity
    async fn fetch_podcast(&self, catalog_uuid: &str) -> Result<Option<CatalogPodcast>>;

    /// List a podcast's episodes
    async fn fetch_episodes(&self, podcast_uuid: &str) -> Result<Vec<CatalogEpisode>>;

    /// Fetch a ready-made transcript for an episode, if the catalog
    /// has one
    async fn fetch_transcript(&self, episode_uuid: &str) -> Result<Option<CatalogTranscript>>;
}

/// HTTP client for the catalog API
pub struct CatalogClient {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(250),
            max_elapsed_time: Some(Duration::from_secs(
                5 * u64::from(self.max_retries.max(1)),
            )),
            ..ExponentialBackoff::default()
        }
    }

    /// GET a JSON resource with exponential backoff on transient
    /// failures. A 404 resolves to None; other 4xx are permanent.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<Option<T>> {
        let op = || async {
            let mut req = self.client.get(&url);
            if let Some(ref key) = self.api_key {
                req = req.header("X-API-KEY", key);
            }

            let response = req.send().await.map_err(|e| {
                backoff::Error::transient(AppError::CatalogError {
                    message: format!("Request failed: {}", e),
                })
            })?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }

            if status.is_server_error() {
                return Err(backoff::Error::transient(AppError::CatalogError {
                    message: format!("API error {}", status),
                }));
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(backoff::Error::permanent(AppError::CatalogError {
                    message: format!("API error {}: {}", status, body),
                }));
            }

            let parsed = response.json::<T>().await.map_err(|e| {
                backoff::Error::permanent(AppError::CatalogError {
                    message: format!("Failed to parse response: {}", e),
                })
            })?;

            Ok(Some(parsed))
        };

        backoff::future::retry(self.backoff(), op).await
    }
}

#[async_trait]
impl CatalogApi for CatalogClient {
    async fn search_podcasts(&self, query: &str) -> Result<Vec<CatalogPodcast>> {
        let url = format!(
            "{}/search/podcasts?q={}",
            self.api_base,
            urlencode(query)
        );

        let response: Option<SearchResponse> = self.get_json(url).await?;
        Ok(response.map(|r| r.podcasts).unwrap_or_default())
    }

    async fn fetch_podcast(&self, catalog_uuid: &str) -> Result<Option<CatalogPodcast>> {
        let url = format!("{}/podcasts/{}", self.api_base, catalog_uuid);
        self.get_json(url).await
    }

    async fn fetch_episodes(&self, podcast_uuid: &str) -> Result<Vec<CatalogEpisode>> {
        let url = format!("{}/podcasts/{}/episodes", self.api_base, podcast_uuid);
        let response: Option<EpisodesResponse> = self.get_json(url).await?;
        Ok(response.map(|r| r.episodes).unwrap_or_default())
    }

    async fn fetch_transcript(&self, episode_uuid: &str) -> Result<Option<CatalogTranscript>> {
        let url = format!("{}/episodes/{}/transcript", self.api_base, episode_uuid);
        self.get_json(url).await
    }
}

/// Minimal percent-encoding for query strings
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urlencode() {
        assert_eq!(urlencode("hello world"), "hello+world");
        assert_eq!(urlencode("a&b=c"), "a%26b%3Dc");
        assert_eq!(urlencode("plain-text_1.0~x"), "plain-text_1.0~x");
    }

    #[test]
    fn test_transcript_completeness() {
        let complete = CatalogTranscript {
            status: "COMPLETED".to_string(),
            text: Some("hello".to_string()),
            segments: vec![],
        };
        assert!(complete.is_complete());

        let pending = CatalogTranscript {
            status: "PROCESSING".to_string(),
            text: None,
            segments: vec![],
        };
        assert!(!pending.is_complete());

        let empty = CatalogTranscript {
            status: "completed".to_string(),
            text: Some(String::new()),
            segments: vec![],
        };
        assert!(!empty.is_complete());
    }

    #[test]
    fn test_parse_transcript_response() {
        let json = r#"{
            "status": "COMPLETED",
            "text": "Welcome to the show.",
            "segments": [
                {"text": "Welcome to the show.", "start_time": 0.0, "end_time": 2.5, "speaker": "Host"}
            ]
        }"#;

        let transcript: CatalogTranscript = serde_json::from_str(json).unwrap();
        assert!(transcript.is_complete());
        assert_eq!(transcript.segments.len(), 1);
        assert_eq!(transcript.segments[0].speaker.as_deref(), Some("Host"));
    }

    #[test]
    fn test_parse_episode_defaults() {
        let json = r#"{"uuid": "ep-1", "name": "Pilot", "audio_url": "https://cdn.example/a.mp3"}"#;
        let episode: CatalogEpisode = serde_json::from_str(json).unwrap();
        assert_eq!(episode.uuid, "ep-1");
        assert!(episode.duration_seconds.is_none());
        assert!(episode.published_at.is_none());
    }
}
