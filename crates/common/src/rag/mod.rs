//! Retrieval-augmented generation helpers
//!
//! Scope resolution, retrieval, prompt construction, and the citation
//! contract shared by the chat path.

use crate::db::models::ContextScope;
use crate::db::{ChunkHit, Repository};
use crate::embeddings::Embedder;
use crate::errors::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Characters of chunk content carried on a citation
const EXCERPT_CHARS: usize = 240;

/// A structured citation attached to an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub episode_id: Uuid,
    pub episode_name: String,
    /// Start of the cited chunk in the audio, seconds
    pub timestamp: Option<f64>,
    pub excerpt: String,
}

impl Citation {
    pub fn from_hit(hit: &ChunkHit) -> Self {
        Self {
            episode_id: hit.episode_id,
            episode_name: hit.episode_name.clone(),
            timestamp: hit.start_time,
            excerpt: hit.content.chars().take(EXCERPT_CHARS).collect(),
        }
    }

    /// The textual citation form the model is instructed to emit
    pub fn label(&self) -> String {
        citation_label(&self.episode_name, self.timestamp)
    }
}

/// Format seconds as MM:SS. Minutes are unbounded, so long episodes
/// render as e.g. 75:10.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Build the `[Episode Name @ MM:SS]` citation label; falls back to
/// `[Episode Name]` when the chunk carries no timing
pub fn citation_label(episode_name: &str, timestamp: Option<f64>) -> String {
    match timestamp {
        Some(ts) => format!("[{} @ {}]", episode_name, format_timestamp(ts)),
        None => format!("[{}]", episode_name),
    }
}

/// All retrieved chunks become candidate citations
pub fn citations_from_hits(hits: &[ChunkHit]) -> Vec<Citation> {
    hits.iter().map(Citation::from_hit).collect()
}

/// Build the single system instruction embedding the retrieved
/// passages plus enough metadata for the model to cite them
pub fn build_system_prompt(hits: &[ChunkHit]) -> String {
    let mut prompt = String::from(
        "You are Borrowed Brain, an assistant that answers questions using only \
         the podcast transcript passages below. Cite every claim inline using \
         the exact form [Episode Name @ MM:SS] matching the passage you drew it \
         from. If the passages do not contain the answer, say you don't know \
         rather than guessing.\n\nPassages:\n",
    );

    for (i, hit) in hits.iter().enumerate() {
        let label = citation_label(&hit.episode_name, hit.start_time);
        prompt.push_str(&format!("\n--- Passage {} ---\n", i + 1));
        prompt.push_str(&format!("Podcast: {}\n", hit.podcast_name));
        prompt.push_str(&format!("Citation: {}\n", label));
        if let Some(ref speaker) = hit.speaker {
            prompt.push_str(&format!("Speaker: {}\n", speaker));
        }
        prompt.push_str(&hit.content);
        prompt.push('\n');
    }

    prompt
}

/// Resolve a session's context scope to a concrete episode-id set.
/// Podcast ids expand to their episodes; an empty scope falls back to
/// every episode the calling user has synced.
pub async fn resolve_scope(
    repo: &Repository,
    user_id: Uuid,
    scope: &ContextScope,
) -> Result<Vec<Uuid>> {
    if scope.is_empty() {
        return repo.synced_episode_ids(user_id).await;
    }

    let mut episode_ids = scope.episode_ids.clone();
    let expanded = repo.episode_ids_for_podcasts(&scope.podcast_ids).await?;
    episode_ids.extend(expanded);
    episode_ids.sort();
    episode_ids.dedup();

    Ok(episode_ids)
}

/// Embed a question and retrieve the top-K chunks within scope. Uses
/// the same embedder the sync pipeline wrote with.
pub async fn retrieve(
    repo: &Repository,
    embedder: &dyn Embedder,
    episode_scope: &[Uuid],
    question: &str,
    top_k: usize,
) -> Result<Vec<ChunkHit>> {
    if episode_scope.is_empty() {
        return Ok(Vec::new());
    }

    let embedding = embedder.embed(question).await?;
    repo.vector_search(&embedding, top_k, episode_scope).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(episode_name: &str, start: Option<f64>, content: &str) -> ChunkHit {
        ChunkHit {
            episode_id: Uuid::new_v4(),
            episode_name: episode_name.to_string(),
            podcast_name: "Test Pod".to_string(),
            chunk_index: 0,
            content: content.to_string(),
            start_time: start,
            end_time: start.map(|s| s + 30.0),
            speaker: None,
            score: 0.9,
        }
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(59.9), "00:59");
        assert_eq!(format_timestamp(754.2), "12:34");
        // Minutes unbounded past the hour
        assert_eq!(format_timestamp(4510.0), "75:10");
        // Negative clamps to zero
        assert_eq!(format_timestamp(-3.0), "00:00");
    }

    #[test]
    fn test_citation_label() {
        assert_eq!(
            citation_label("Deep Dive", Some(125.0)),
            "[Deep Dive @ 02:05]"
        );
        assert_eq!(citation_label("Deep Dive", None), "[Deep Dive]");
    }

    #[test]
    fn test_citation_excerpt_truncation() {
        let long = "x".repeat(1000);
        let citation = Citation::from_hit(&hit("Ep", Some(0.0), &long));
        assert_eq!(citation.excerpt.chars().count(), EXCERPT_CHARS);
    }

    #[test]
    fn test_system_prompt_carries_metadata() {
        let hits = vec![
            hit("Episode One", Some(65.0), "First passage."),
            hit("Episode Two", None, "Second passage."),
        ];
        let prompt = build_system_prompt(&hits);

        assert!(prompt.contains("[Episode One @ 01:05]"));
        assert!(prompt.contains("[Episode Two]"));
        assert!(prompt.contains("Test Pod"));
        assert!(prompt.contains("First passage."));
        assert!(prompt.contains("Second passage."));
    }

    #[test]
    fn test_citations_from_hits_keeps_order() {
        let hits = vec![hit("A", Some(1.0), "a"), hit("B", Some(2.0), "b")];
        let citations = citations_from_hits(&hits);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].episode_name, "A");
        assert_eq!(citations[1].episode_name, "B");
    }
}
