//! User library handlers
//!
//! Library entries are user-owned; the podcast rows they point at are
//! shared across users and survive removal.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use borrowedbrain_common::{
    auth::AuthContext,
    db::Repository,
    errors::{AppError, Result},
};

/// Request to add a podcast to the library
#[derive(Debug, Deserialize, Validate)]
pub struct AddToLibraryRequest {
    /// Catalog identity of the podcast
    #[validate(length(min = 1, max = 128))]
    pub catalog_uuid: String,
}

/// A podcast as it appears in the library
#[derive(Serialize)]
pub struct LibraryPodcast {
    pub id: Uuid,
    pub catalog_uuid: String,
    pub name: String,
    pub author: Option<String>,
    pub artwork_url: Option<String>,
    pub episode_count: i32,
    pub genres: serde_json::Value,
}

impl From<borrowedbrain_common::db::models::Podcast> for LibraryPodcast {
    fn from(podcast: borrowedbrain_common::db::models::Podcast) -> Self {
        Self {
            id: podcast.id,
            catalog_uuid: podcast.catalog_uuid,
            name: podcast.name,
            author: podcast.author,
            artwork_url: podcast.artwork_url,
            episode_count: podcast.episode_count,
            genres: podcast.genres,
        }
    }
}

#[derive(Serialize)]
pub struct LibraryResponse {
    pub podcasts: Vec<LibraryPodcast>,
}

/// Add a podcast to the caller's library, creating the shared podcast
/// row on first reference by any user.
pub async fn add_to_library(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<AddToLibraryRequest>,
) -> Result<(StatusCode, Json<LibraryPodcast>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("catalog_uuid".to_string()),
    })?;

    let catalog_podcast = state
        .catalog
        .fetch_podcast(&request.catalog_uuid)
        .await?
        .ok_or_else(|| AppError::PodcastNotFound {
            id: request.catalog_uuid.clone(),
        })?;

    let repo = Repository::new(state.db.clone());

    let podcast = repo
        .upsert_podcast(
            &catalog_podcast.uuid,
            &catalog_podcast.name,
            catalog_podcast.author.clone(),
            catalog_podcast.artwork_url.clone(),
            catalog_podcast.total_episode_count,
            serde_json::json!(catalog_podcast.genres),
        )
        .await?;

    repo.add_library_entry(auth.user_id, podcast.id).await?;

    tracing::info!(
        user_id = %auth.user_id,
        podcast_id = %podcast.id,
        catalog_uuid = %podcast.catalog_uuid,
        "Podcast added to library"
    );

    Ok((StatusCode::CREATED, Json(podcast.into())))
}

/// List the caller's library
pub async fn list_library(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<LibraryResponse>> {
    let repo = Repository::new(state.db.clone());

    let podcasts = repo.list_library(auth.user_id).await?;

    Ok(Json(LibraryResponse {
        podcasts: podcasts.into_iter().map(Into::into).collect(),
    }))
}

/// Remove a podcast from the caller's library. The shared podcast,
/// episode, and transcript rows stay behind for other users.
pub async fn remove_from_library(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(podcast_id): Path<Uuid>,
) -> Result<StatusCode> {
    let repo = Repository::new(state.db.clone());

    let removed = repo.remove_library_entry(auth.user_id, podcast_id).await?;

    if !removed {
        return Err(AppError::PodcastNotFound {
            id: podcast_id.to_string(),
        });
    }

    tracing::info!(
        user_id = %auth.user_id,
        podcast_id = %podcast_id,
        "Podcast removed from library"
    );

    Ok(StatusCode::NO_CONTENT)
}
