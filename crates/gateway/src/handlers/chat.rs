//! Chat message handler: the RAG query path
//!
//! Persists the user message, retrieves scoped transcript chunks,
//! streams the model's answer as server-sent events, and persists the
//! assistant message with candidate citations once the stream
//! completes. An aborted stream persists nothing (remove-on-abort).

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Instant;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::sessions::load_owned_session;
use crate::AppState;
use borrowedbrain_common::{
    auth::AuthContext,
    db::models::MessageRole,
    db::Repository,
    errors::{AppError, Result},
    gateways::ChatTurn,
    metrics, rag,
};

/// Conversation turns carried back to the model per message
const HISTORY_LIMIT: usize = 20;

/// Post message request
#[derive(Debug, Deserialize, Validate)]
pub struct PostMessageRequest {
    #[validate(length(min = 1, max = 8000))]
    pub content: String,
}

/// Answer a user message with a streamed, cited completion
pub async fn post_message(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(session_id): Path<Uuid>,
    axum::Json(request): axum::Json<PostMessageRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("content".to_string()),
    })?;

    let repo = Repository::new(state.db.clone());
    let session = load_owned_session(&repo, session_id, auth.user_id).await?;

    // The user message is durable before any retrieval or generation,
    // so history survives a failed answer.
    repo.insert_chat_message(
        session.id,
        MessageRole::User,
        &request.content,
        serde_json::json!([]),
    )
    .await?;

    // Resolve the session scope to concrete episode ids and retrieve
    // with the same embedding model the sync pipeline wrote with.
    let scope = rag::resolve_scope(&repo, auth.user_id, &session.context_scope()).await?;

    let retrieval_start = Instant::now();
    let hits = rag::retrieve(
        &repo,
        state.embedder.as_ref(),
        &scope,
        &request.content,
        state.config.sync.top_k,
    )
    .await?;
    metrics::record_retrieval(retrieval_start.elapsed().as_secs_f64(), hits.len());

    tracing::info!(
        session_id = %session.id,
        scope_episodes = scope.len(),
        retrieved = hits.len(),
        "Retrieval completed"
    );

    let system_prompt = rag::build_system_prompt(&hits);
    let citations = rag::citations_from_hits(&hits);

    // Conversation history, including the message just persisted
    let turns: Vec<ChatTurn> = repo
        .list_chat_messages(session.id)
        .await?
        .into_iter()
        .map(|m| ChatTurn {
            role: m.role,
            content: m.content,
        })
        .collect();
    let turns = if turns.len() > HISTORY_LIMIT {
        turns[turns.len() - HISTORY_LIMIT..].to_vec()
    } else {
        turns
    };

    // Upstream refusal before any token surfaces as a failed request
    let mut token_stream = state.chat_model.stream_chat(&system_prompt, &turns).await?;

    let (tx, rx) = tokio::sync::mpsc::channel::<Event>(32);
    let task_repo = repo.clone();
    let task_session_id = session.id;

    tokio::spawn(async move {
        let mut answer = String::new();
        let mut aborted = false;

        while let Some(item) = token_stream.next().await {
            match item {
                Ok(token) => {
                    answer.push_str(&token);
                    if tx.send(Event::default().event("token").data(token)).await.is_err() {
                        // Client went away; nothing is persisted
                        aborted = true;
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        session_id = %task_session_id,
                        error = %e,
                        "Chat stream failed"
                    );
                    let _ = tx.send(Event::default().event("error").data(e.to_string())).await;
                    aborted = true;
                    break;
                }
            }
        }

        if aborted {
            return;
        }

        // Persist the assistant message with all retrieved chunks as
        // candidate citations, then close the stream.
        let citations_json =
            serde_json::to_value(&citations).unwrap_or_else(|_| serde_json::json!([]));

        match task_repo
            .insert_chat_message(
                task_session_id,
                MessageRole::Assistant,
                &answer,
                citations_json.clone(),
            )
            .await
        {
            Ok(message) => {
                let _ = tx
                    .send(Event::default().event("citations").data(citations_json.to_string()))
                    .await;
                let _ = tx
                    .send(Event::default().event("done").data(message.id.to_string()))
                    .await;
            }
            Err(e) => {
                tracing::error!(
                    session_id = %task_session_id,
                    error = %e,
                    "Failed to persist assistant message"
                );
                let _ = tx.send(Event::default().event("error").data(e.to_string())).await;
            }
        }
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (Ok(event), rx))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
