//! Podcast search and episode listing handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use borrowedbrain_common::{
    auth::AuthContext,
    cache::keys,
    db::Repository,
    errors::{AppError, Result},
    gateways::{CatalogEpisode, CatalogPodcast},
    metrics,
};

/// Podcast search query
#[derive(Debug, Deserialize, Validate)]
pub struct SearchParams {
    #[validate(length(min = 1, max = 200))]
    pub q: String,
}

/// Search response
#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<CatalogPodcast>,
}

/// Episode list response
#[derive(Serialize)]
pub struct EpisodeListResponse {
    pub podcast_id: Uuid,
    pub episodes: Vec<EpisodeItem>,
}

#[derive(Serialize)]
pub struct EpisodeItem {
    pub id: Uuid,
    pub name: String,
    pub duration_seconds: Option<i32>,
    pub published_at: Option<String>,
    pub episode_number: Option<i32>,
    pub season_number: Option<i32>,
}

/// Search the podcast catalog. Results are cached; the catalog is the
/// source of truth and nothing is persisted here.
pub async fn search_podcasts(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    params.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("q".to_string()),
    })?;

    let cache_key = keys::podcast_search(&params.q);

    if let Some(ref cache) = state.cache {
        if let Some(cached) = cache.get::<Vec<CatalogPodcast>>(&cache_key).await.unwrap_or(None) {
            metrics::record_cache(true, "podcast_search");
            return Ok(Json(SearchResponse {
                query: params.q,
                results: cached,
            }));
        }
        metrics::record_cache(false, "podcast_search");
    }

    let results = state.catalog.search_podcasts(&params.q).await?;

    if let Some(ref cache) = state.cache {
        if let Err(e) = cache.set(&cache_key, &results).await {
            tracing::warn!(error = %e, "Failed to cache search results");
        }
    }

    tracing::info!(
        query = %params.q,
        results = results.len(),
        "Catalog search completed"
    );

    Ok(Json(SearchResponse {
        query: params.q,
        results,
    }))
}

/// List a podcast's episodes, lazily creating episode rows from the
/// catalog listing so sync and chat can reference them by id.
pub async fn list_episodes(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(podcast_id): Path<Uuid>,
) -> Result<Json<EpisodeListResponse>> {
    let repo = Repository::new(state.db.clone());

    let podcast = repo
        .find_podcast_by_id(podcast_id)
        .await?
        .ok_or_else(|| AppError::PodcastNotFound {
            id: podcast_id.to_string(),
        })?;

    let cache_key = keys::podcast_episodes(podcast_id);

    let listing: Vec<CatalogEpisode> = match state.cache {
        Some(ref cache) => {
            match cache.get::<Vec<CatalogEpisode>>(&cache_key).await.unwrap_or(None) {
                Some(cached) => {
                    metrics::record_cache(true, "podcast_episodes");
                    cached
                }
                None => {
                    metrics::record_cache(false, "podcast_episodes");
                    let listing = state.catalog.fetch_episodes(&podcast.catalog_uuid).await?;
                    if let Err(e) = cache.set(&cache_key, &listing).await {
                        tracing::warn!(error = %e, "Failed to cache episode listing");
                    }
                    listing
                }
            }
        }
        None => state.catalog.fetch_episodes(&podcast.catalog_uuid).await?,
    };

    let mut episodes = Vec::with_capacity(listing.len());
    for item in &listing {
        let episode = repo
            .upsert_episode(
                podcast.id,
                &item.uuid,
                &item.name,
                &item.audio_url,
                item.duration_seconds,
                item.published_at,
                item.episode_number,
                item.season_number,
            )
            .await?;

        episodes.push(EpisodeItem {
            id: episode.id,
            name: episode.name,
            duration_seconds: episode.duration_seconds,
            published_at: episode.published_at.map(|dt| dt.to_rfc3339()),
            episode_number: episode.episode_number,
            season_number: episode.season_number,
        });
    }

    Ok(Json(EpisodeListResponse {
        podcast_id: podcast.id,
        episodes,
    }))
}
