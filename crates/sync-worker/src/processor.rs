//! Sync processor
//!
//! The asynchronous unit of work: re-check the dedup anchor, acquire a
//! transcript (catalog first, speech-to-text fallback), chunk, embed,
//! upsert into the vector store, flip statuses, and link the
//! triggering user. Delivery is at-least-once, so every step is
//! idempotent: the re-check short-circuits completed work and the
//! chunk upsert overwrites rather than duplicates.

use crate::chunker::{chunk_transcript, ChunkingConfig, TimedSegment};
use crate::errors::SyncError;
use borrowedbrain_common::db::{ChunkUpsert, DbPool, Repository};
use borrowedbrain_common::embeddings::Embedder;
use borrowedbrain_common::gateways::{CatalogApi, SpeechToText};
use borrowedbrain_common::metrics;
use borrowedbrain_common::queue::SyncJobMessage;
use borrowedbrain_common::sync::{TranscriptSource, TranscriptStatus};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Vector-store collection reference recorded on synced transcripts
const CHUNK_COLLECTION: &str = "transcript_chunks";

/// A transcript in hand, with where it came from
struct AcquiredTranscript {
    source: TranscriptSource,
    text: String,
    segments: Vec<TimedSegment>,
}

/// Sync pipeline processor
pub struct SyncProcessor {
    repository: Repository,
    catalog: Arc<dyn CatalogApi>,
    transcription: Arc<dyn SpeechToText>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
}

impl SyncProcessor {
    pub fn new(
        db_pool: DbPool,
        catalog: Arc<dyn CatalogApi>,
        transcription: Arc<dyn SpeechToText>,
        embedder: Arc<dyn Embedder>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            repository: Repository::new(db_pool),
            catalog,
            transcription,
            embedder,
            chunking,
        }
    }

    /// Process one sync job message
    #[instrument(skip(self, message), fields(job_id = %message.job_id, episode_id = %message.episode_id))]
    pub async fn process_job(&self, message: SyncJobMessage) -> Result<(), SyncError> {
        let start = Instant::now();

        self.repository
            .mark_sync_job_processing(message.job_id)
            .await?;

        let episode = self
            .repository
            .find_episode_by_id(message.episode_id)
            .await?
            .ok_or_else(|| SyncError::MissingEpisode(message.episode_id.to_string()))?;

        // Re-check the dedup anchor: another run may have finished while
        // this message waited in the queue. Abort cleanly and just link.
        if let Some(transcript) = self
            .repository
            .find_transcript_by_episode(episode.id)
            .await?
        {
            match transcript.transcript_status() {
                TranscriptStatus::Synced => {
                    info!("Transcript already synced by another run, linking user");
                    self.repository
                        .link_synced_episode(message.user_id, episode.id)
                        .await?;
                    self.repository
                        .mark_sync_job_completed(message.job_id)
                        .await?;
                    return Ok(());
                }
                TranscriptStatus::Failed => {
                    // Queue redelivery after a failure: re-enter the
                    // pipeline through `queued` to keep transitions legal
                    self.repository.try_claim_transcript(episode.id).await?;
                }
                _ => {}
            }
        }

        self.repository.mark_transcript_syncing(episode.id).await?;

        let acquired = match self.acquire_transcript(&episode.catalog_uuid, &episode.audio_url).await {
            Ok(acquired) => acquired,
            Err(e) => return self.fail(message.job_id, episode.id, e).await,
        };

        info!(
            source = acquired.source.as_str(),
            text_len = acquired.text.len(),
            segments = acquired.segments.len(),
            "Transcript acquired"
        );

        let chunks = chunk_transcript(&acquired.text, &acquired.segments, &self.chunking);
        if chunks.is_empty() {
            return self.fail(message.job_id, episode.id, SyncError::EmptyTranscript).await;
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = match self.embedder.embed_batch(&texts).await {
            Ok(embeddings) => embeddings,
            Err(e) => {
                return self
                    .fail(message.job_id, episode.id, SyncError::Embedding(e.to_string()))
                    .await
            }
        };

        let records: Vec<ChunkUpsert> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| ChunkUpsert {
                index: chunk.index,
                content: chunk.content.clone(),
                embedding,
                start_time: chunk.start_time,
                end_time: chunk.end_time,
                speaker: chunk.speaker.clone(),
            })
            .collect();

        if let Err(e) = self.persist(&message, episode.id, &acquired, &records).await {
            return self.fail(message.job_id, episode.id, e).await;
        }

        metrics::record_sync_run(
            start.elapsed().as_secs_f64(),
            records.len(),
            acquired.source.as_str(),
            true,
        );

        info!(
            chunk_count = records.len(),
            elapsed_secs = start.elapsed().as_secs(),
            "Sync completed"
        );

        Ok(())
    }

    /// Catalog-first acquisition with speech-to-text fallback. A
    /// catalog failure degrades to the fallback; a fallback failure is
    /// the recoverable failure of the whole unit of work.
    async fn acquire_transcript(
        &self,
        episode_catalog_uuid: &str,
        audio_url: &str,
    ) -> Result<AcquiredTranscript, SyncError> {
        match self.catalog.fetch_transcript(episode_catalog_uuid).await {
            Ok(Some(transcript)) if transcript.is_complete() => {
                let segments = transcript
                    .segments
                    .iter()
                    .map(|s| TimedSegment {
                        text: s.text.clone(),
                        start_time: s.start_time,
                        end_time: s.end_time,
                        speaker: s.speaker.clone(),
                    })
                    .collect();

                return Ok(AcquiredTranscript {
                    source: TranscriptSource::Catalog,
                    text: transcript.text.unwrap_or_default(),
                    segments,
                });
            }
            Ok(_) => {
                info!("No complete catalog transcript, falling back to speech-to-text");
            }
            Err(e) => {
                warn!(error = %e, "Catalog transcript fetch failed, falling back to speech-to-text");
            }
        }

        let transcription = self
            .transcription
            .transcribe(audio_url)
            .await
            .map_err(|e| SyncError::Acquisition(e.to_string()))?;

        let segments = transcription
            .utterances
            .iter()
            .map(|u| TimedSegment {
                text: u.text.clone(),
                start_time: u.start_time,
                end_time: u.end_time,
                speaker: u.speaker_label.clone(),
            })
            .collect();

        Ok(AcquiredTranscript {
            source: TranscriptSource::SpeechToText,
            text: transcription.text,
            segments,
        })
    }

    /// Upsert chunks, prune any stale tail, flip the transcript and
    /// job to their terminal success states, and link the user
    async fn persist(
        &self,
        message: &SyncJobMessage,
        episode_id: Uuid,
        acquired: &AcquiredTranscript,
        records: &[ChunkUpsert],
    ) -> Result<(), SyncError> {
        self.repository
            .upsert_chunks(episode_id, records, self.embedder.model_name())
            .await?;

        let pruned = self
            .repository
            .prune_chunks(episode_id, records.len() as i32)
            .await?;
        if pruned > 0 {
            info!(pruned, "Removed stale chunks from a previous run");
        }

        self.repository
            .mark_transcript_synced(
                episode_id,
                &acquired.text,
                records.len() as i32,
                acquired.source,
                CHUNK_COLLECTION,
            )
            .await?;

        self.repository
            .mark_sync_job_completed(message.job_id)
            .await?;

        self.repository
            .link_synced_episode(message.user_id, episode_id)
            .await?;

        Ok(())
    }

    /// Record a recoverable failure on both the transcript and the
    /// job, then surface the error so the message stays on the queue
    /// for the redrive policy to retry
    async fn fail(
        &self,
        job_id: Uuid,
        episode_id: Uuid,
        error: SyncError,
    ) -> Result<(), SyncError> {
        let message = error.to_string();

        tracing::error!(
            job_id = %job_id,
            episode_id = %episode_id,
            error = %message,
            "Sync failed"
        );

        if let Err(e) = self.repository.mark_transcript_failed(episode_id, &message).await {
            tracing::error!(error = %e, "Failed to record transcript failure");
        }
        if let Err(e) = self.repository.mark_sync_job_failed(job_id, &message).await {
            tracing::error!(error = %e, "Failed to record job failure");
        }

        metrics::record_sync_run(0.0, 0, "", false);

        Err(error)
    }
}
