//! Sync trigger and status handlers
//!
//! The trigger path guarantees that transcription work for an episode
//! happens at most once system-wide: an already-synced transcript
//! short-circuits to a user link, an in-flight one is surfaced rather
//! than re-triggered, and a fresh trigger claims the transcript with a
//! single conditional update before any job is enqueued.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;
use borrowedbrain_common::{
    auth::AuthContext,
    db::Repository,
    errors::{AppError, Result},
    metrics,
    queue::SyncJobMessage,
    sync::{SyncDisposition, SyncOutcome},
};

/// Response for a sync request
#[derive(Serialize)]
pub struct SyncResponse {
    #[serde(flatten)]
    pub outcome: SyncOutcome,
    pub transcript_status: String,
}

/// Sync job status response
#[derive(Serialize)]
pub struct SyncJobResponse {
    pub job_id: Uuid,
    pub episode_id: Uuid,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

/// Transcript status response
#[derive(Serialize)]
pub struct TranscriptStatusResponse {
    pub episode_id: Uuid,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub chunk_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Trigger a sync for an episode on behalf of the caller
pub async fn trigger_sync(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(episode_id): Path<Uuid>,
) -> Result<(StatusCode, Json<SyncResponse>)> {
    let repo = Repository::new(state.db.clone());

    let episode = repo
        .find_episode_by_id(episode_id)
        .await?
        .ok_or_else(|| AppError::EpisodeNotFound {
            id: episode_id.to_string(),
        })?;

    let transcript = repo.find_transcript_by_episode(episode.id).await?;
    let observed_status = transcript.as_ref().map(|t| t.transcript_status());

    match SyncDisposition::for_status(observed_status) {
        SyncDisposition::LinkInstantly => {
            // Dedup short-circuit: the shared transcript already exists,
            // link this user and do no work.
            repo.link_synced_episode(auth.user_id, episode.id).await?;
            metrics::record_sync_trigger(true);

            tracing::info!(
                user_id = %auth.user_id,
                episode_id = %episode.id,
                "Episode already synced, linked instantly"
            );

            Ok((
                StatusCode::OK,
                Json(SyncResponse {
                    outcome: SyncOutcome::LinkedInstantly,
                    transcript_status: "synced".to_string(),
                }),
            ))
        }

        SyncDisposition::AwaitInFlight => {
            await_in_flight(&repo, auth.user_id, episode.id).await
        }

        SyncDisposition::Trigger => {
            let queue = state.queue.as_ref().ok_or_else(|| AppError::ServiceUnavailable {
                message: "Sync queue not configured".to_string(),
            })?;

            // Consume quota before touching shared state
            let period = chrono::Utc::now().format("%Y-%m").to_string();
            let quota = state.config.sync.monthly_quota;
            if !repo.increment_and_check_usage(auth.user_id, &period, quota).await? {
                return Err(AppError::QuotaExceeded { quota });
            }

            // Atomic claim closes the check-then-act window: losing the
            // race degrades to the in-flight path.
            if !repo.try_claim_transcript(episode.id).await? {
                return await_in_flight(&repo, auth.user_id, episode.id).await;
            }

            let job = match repo.create_sync_job(auth.user_id, episode.id).await {
                Ok(job) => job,
                Err(e) => {
                    // The claim must not leak a permanently-queued
                    // transcript; record the failure so retry can re-claim.
                    repo.mark_transcript_failed(episode.id, "Failed to create sync job")
                        .await?;
                    return Err(e);
                }
            };

            let message = SyncJobMessage {
                job_id: job.id,
                user_id: auth.user_id,
                episode_id: episode.id,
            };

            let run_id = match queue.send(&message).await {
                Ok(run_id) => run_id,
                Err(e) => {
                    let message = format!("Failed to enqueue sync job: {}", e);
                    repo.mark_transcript_failed(episode.id, &message).await?;
                    repo.mark_sync_job_failed(job.id, &message).await?;
                    return Err(e);
                }
            };

            repo.set_sync_job_run_id(job.id, &run_id).await?;
            metrics::record_sync_trigger(false);

            tracing::info!(
                user_id = %auth.user_id,
                episode_id = %episode.id,
                job_id = %job.id,
                run_id = %run_id,
                "Sync job triggered"
            );

            Ok((
                StatusCode::ACCEPTED,
                Json(SyncResponse {
                    outcome: SyncOutcome::JobTriggered { job_id: job.id },
                    transcript_status: "queued".to_string(),
                }),
            ))
        }
    }
}

/// A sync is already queued or running for this episode: link the user
/// optimistically so the content appears once the in-flight job lands,
/// and surface the existing job when it is discoverable.
async fn await_in_flight(
    repo: &Repository,
    user_id: Uuid,
    episode_id: Uuid,
) -> Result<(StatusCode, Json<SyncResponse>)> {
    repo.link_synced_episode(user_id, episode_id).await?;
    metrics::record_sync_trigger(true);

    let transcript_status = repo
        .find_transcript_by_episode(episode_id)
        .await?
        .map(|t| t.status)
        .unwrap_or_else(|| "queued".to_string());

    match repo.find_active_sync_job_for_episode(episode_id).await? {
        Some(job) => {
            tracing::info!(
                user_id = %user_id,
                episode_id = %episode_id,
                job_id = %job.id,
                "Sync already in flight, surfacing existing job"
            );

            Ok((
                StatusCode::ACCEPTED,
                Json(SyncResponse {
                    outcome: SyncOutcome::JobTriggered { job_id: job.id },
                    transcript_status,
                }),
            ))
        }
        None => Ok((
            StatusCode::CONFLICT,
            Json(SyncResponse {
                outcome: SyncOutcome::Rejected {
                    reason: "sync already in progress".to_string(),
                },
                transcript_status,
            }),
        )),
    }
}

/// Get sync job status
pub async fn get_sync_job(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(job_id): Path<Uuid>,
) -> Result<Json<SyncJobResponse>> {
    let repo = Repository::new(state.db.clone());

    let job = repo
        .find_sync_job_by_id(job_id)
        .await?
        .ok_or_else(|| AppError::JobNotFound {
            id: job_id.to_string(),
        })?;

    // Row-level ownership: a job is visible only to the user who
    // triggered it.
    if job.user_id != auth.user_id {
        return Err(AppError::JobNotFound {
            id: job_id.to_string(),
        });
    }

    Ok(Json(SyncJobResponse {
        job_id: job.id,
        episode_id: job.episode_id,
        status: job.status.clone(),
        run_id: job.run_id,
        error_message: job.error_message,
        created_at: job.created_at.to_rfc3339(),
        started_at: job.started_at.map(|dt| dt.to_rfc3339()),
        completed_at: job.completed_at.map(|dt| dt.to_rfc3339()),
    }))
}

/// Get the transcript status surface for an episode
pub async fn get_transcript_status(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(episode_id): Path<Uuid>,
) -> Result<Json<TranscriptStatusResponse>> {
    let repo = Repository::new(state.db.clone());

    let episode = repo
        .find_episode_by_id(episode_id)
        .await?
        .ok_or_else(|| AppError::EpisodeNotFound {
            id: episode_id.to_string(),
        })?;

    let transcript = repo.find_transcript_by_episode(episode.id).await?;

    Ok(Json(match transcript {
        Some(t) => TranscriptStatusResponse {
            episode_id: episode.id,
            status: t.status,
            source: t.source,
            chunk_count: t.chunk_count,
            error_message: t.error_message,
        },
        None => TranscriptStatusResponse {
            episode_id: episode.id,
            status: "not_synced".to_string(),
            source: None,
            chunk_count: 0,
            error_message: None,
        },
    }))
}
