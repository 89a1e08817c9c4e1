//! Chat session handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use borrowedbrain_common::{
    auth::AuthContext,
    db::models::{ChatSession, ContextScope},
    db::Repository,
    errors::{AppError, Result},
};

/// Create session request
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub title: Option<String>,

    /// Context scope bounding retrieval for every message in the
    /// session; empty means "everything I have synced"
    #[serde(default)]
    pub scope: ContextScope,
}

/// Session response
#[derive(Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub title: Option<String>,
    pub scope: ContextScope,
    pub created_at: String,
}

impl From<ChatSession> for SessionResponse {
    fn from(session: ChatSession) -> Self {
        let scope = session.context_scope();
        Self {
            session_id: session.id,
            title: session.title,
            scope,
            created_at: session.created_at.to_rfc3339(),
        }
    }
}

/// Message list response
#[derive(Serialize)]
pub struct MessageListResponse {
    pub session_id: Uuid,
    pub messages: Vec<MessageItem>,
}

#[derive(Serialize)]
pub struct MessageItem {
    pub id: Uuid,
    pub role: String,
    pub content: String,
    pub citations: serde_json::Value,
    pub created_at: String,
}

/// Create a new chat session
pub async fn create_session(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let repo = Repository::new(state.db.clone());

    // Scoped podcasts must exist; episodes are validated lazily at
    // retrieval time through the scope filter.
    for podcast_id in &request.scope.podcast_ids {
        if repo.find_podcast_by_id(*podcast_id).await?.is_none() {
            return Err(AppError::PodcastNotFound {
                id: podcast_id.to_string(),
            });
        }
    }

    let session = repo
        .create_chat_session(auth.user_id, request.title, &request.scope)
        .await?;

    tracing::info!(
        session_id = %session.id,
        user_id = %auth.user_id,
        "Chat session created"
    );

    Ok((StatusCode::CREATED, Json(session.into())))
}

/// Look up a session and verify the caller owns it
pub(crate) async fn load_owned_session(
    repo: &Repository,
    session_id: Uuid,
    user_id: Uuid,
) -> Result<ChatSession> {
    let session = repo
        .find_chat_session(session_id)
        .await?
        .ok_or_else(|| AppError::SessionNotFound {
            id: session_id.to_string(),
        })?;

    // Row-level ownership: sessions are invisible to other users
    if session.user_id != user_id {
        return Err(AppError::SessionNotFound {
            id: session_id.to_string(),
        });
    }

    Ok(session)
}

/// Get a session
pub async fn get_session(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>> {
    let repo = Repository::new(state.db.clone());
    let session = load_owned_session(&repo, session_id, auth.user_id).await?;

    Ok(Json(session.into()))
}

/// List a session's messages
pub async fn list_messages(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(session_id): Path<Uuid>,
) -> Result<Json<MessageListResponse>> {
    let repo = Repository::new(state.db.clone());
    let session = load_owned_session(&repo, session_id, auth.user_id).await?;

    let messages = repo.list_chat_messages(session.id).await?;

    Ok(Json(MessageListResponse {
        session_id: session.id,
        messages: messages
            .into_iter()
            .map(|m| MessageItem {
                id: m.id,
                role: m.role,
                content: m.content,
                citations: m.citations,
                created_at: m.created_at.to_rfc3339(),
            })
            .collect(),
    }))
}
