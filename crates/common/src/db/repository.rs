//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations. Status
//! transitions on shared rows (transcripts, usage ledger) are single
//! conditional statements so concurrent writers converge instead of
//! racing a read-then-write pair.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::sync::TranscriptSource;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    QueryFilter, QueryOrder, Set, Statement,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A chunk retrieved by vector search, with enough metadata to build
/// a citation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkHit {
    pub episode_id: Uuid,
    pub episode_name: String,
    pub podcast_name: String,
    pub chunk_index: i32,
    pub content: String,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub speaker: Option<String>,
    pub score: f64,
}

/// Chunk data for idempotent upsert into the vector store
#[derive(Debug, Clone)]
pub struct ChunkUpsert {
    pub index: i32,
    pub content: String,
    pub embedding: Vec<f32>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub speaker: Option<String>,
}

/// Deterministic chunk document id: the same (episode, index) pair
/// always maps to the same id, so a retried sync overwrites rather
/// than duplicates.
pub fn chunk_document_id(episode_id: Uuid, chunk_index: i32) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(episode_id.as_bytes());
    hasher.update(b"\x00");
    hasher.update(chunk_index.to_be_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

/// Convert an embedding to the pgvector text format "[1.0,2.0,...]"
fn embedding_to_pgvector(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Podcast Operations
    // ========================================================================

    /// Insert or refresh a podcast by catalog identity. Shared across
    /// users; metadata is refreshed on every upsert.
    pub async fn upsert_podcast(
        &self,
        catalog_uuid: &str,
        name: &str,
        author: Option<String>,
        artwork_url: Option<String>,
        episode_count: i32,
        genres: serde_json::Value,
    ) -> Result<Podcast> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO podcasts (
                id, catalog_uuid, name, author, artwork_url,
                episode_count, genres, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
            ON CONFLICT (catalog_uuid) DO UPDATE SET
                name = EXCLUDED.name,
                author = EXCLUDED.author,
                artwork_url = EXCLUDED.artwork_url,
                episode_count = EXCLUDED.episode_count,
                genres = EXCLUDED.genres,
                updated_at = NOW()
            RETURNING *
            "#,
            vec![
                Uuid::new_v4().into(),
                catalog_uuid.into(),
                name.into(),
                author.into(),
                artwork_url.into(),
                episode_count.into(),
                genres.into(),
            ],
        );

        PodcastEntity::find()
            .from_raw_sql(stmt)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::Internal {
                message: "Podcast upsert returned no row".to_string(),
            })
    }

    /// Find podcast by ID
    pub async fn find_podcast_by_id(&self, id: Uuid) -> Result<Option<Podcast>> {
        PodcastEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find podcast by catalog identity
    pub async fn find_podcast_by_catalog_uuid(&self, catalog_uuid: &str) -> Result<Option<Podcast>> {
        PodcastEntity::find()
            .filter(PodcastColumn::CatalogUuid.eq(catalog_uuid))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Library Operations
    // ========================================================================

    /// Add a podcast to a user's library (idempotent)
    pub async fn add_library_entry(&self, user_id: Uuid, podcast_id: Uuid) -> Result<LibraryEntry> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO user_library_entries (id, user_id, podcast_id, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id, podcast_id) DO NOTHING
            "#,
            vec![Uuid::new_v4().into(), user_id.into(), podcast_id.into()],
        );

        self.write_conn().execute(stmt).await?;

        LibraryEntryEntity::find()
            .filter(LibraryEntryColumn::UserId.eq(user_id))
            .filter(LibraryEntryColumn::PodcastId.eq(podcast_id))
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::Internal {
                message: "Library entry upsert returned no row".to_string(),
            })
    }

    /// List the podcasts in a user's library
    pub async fn list_library(&self, user_id: Uuid) -> Result<Vec<Podcast>> {
        let entries = LibraryEntryEntity::find()
            .filter(LibraryEntryColumn::UserId.eq(user_id))
            .order_by_desc(LibraryEntryColumn::CreatedAt)
            .all(self.read_conn())
            .await?;

        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let podcast_ids: Vec<Uuid> = entries.iter().map(|e| e.podcast_id).collect();

        PodcastEntity::find()
            .filter(PodcastColumn::Id.is_in(podcast_ids))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Check whether a user's library contains a podcast
    pub async fn has_library_entry(&self, user_id: Uuid, podcast_id: Uuid) -> Result<bool> {
        let entry = LibraryEntryEntity::find()
            .filter(LibraryEntryColumn::UserId.eq(user_id))
            .filter(LibraryEntryColumn::PodcastId.eq(podcast_id))
            .one(self.read_conn())
            .await?;
        Ok(entry.is_some())
    }

    /// Remove a podcast from a user's library. The shared podcast,
    /// episode, and transcript rows are untouched.
    pub async fn remove_library_entry(&self, user_id: Uuid, podcast_id: Uuid) -> Result<bool> {
        let result = LibraryEntryEntity::delete_many()
            .filter(LibraryEntryColumn::UserId.eq(user_id))
            .filter(LibraryEntryColumn::PodcastId.eq(podcast_id))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Episode Operations
    // ========================================================================

    /// Insert or refresh an episode by catalog identity
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_episode(
        &self,
        podcast_id: Uuid,
        catalog_uuid: &str,
        name: &str,
        audio_url: &str,
        duration_seconds: Option<i32>,
        published_at: Option<chrono::DateTime<chrono::Utc>>,
        episode_number: Option<i32>,
        season_number: Option<i32>,
    ) -> Result<Episode> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO episodes (
                id, podcast_id, catalog_uuid, name, audio_url, duration_seconds,
                published_at, episode_number, season_number, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            ON CONFLICT (catalog_uuid) DO UPDATE SET
                name = EXCLUDED.name,
                audio_url = EXCLUDED.audio_url,
                duration_seconds = EXCLUDED.duration_seconds,
                published_at = EXCLUDED.published_at,
                episode_number = EXCLUDED.episode_number,
                season_number = EXCLUDED.season_number
            RETURNING *
            "#,
            vec![
                Uuid::new_v4().into(),
                podcast_id.into(),
                catalog_uuid.into(),
                name.into(),
                audio_url.into(),
                duration_seconds.into(),
                published_at.into(),
                episode_number.into(),
                season_number.into(),
            ],
        );

        EpisodeEntity::find()
            .from_raw_sql(stmt)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::Internal {
                message: "Episode upsert returned no row".to_string(),
            })
    }

    /// Find episode by ID
    pub async fn find_episode_by_id(&self, id: Uuid) -> Result<Option<Episode>> {
        EpisodeEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List episodes for a podcast, newest first
    pub async fn list_episodes_by_podcast(&self, podcast_id: Uuid) -> Result<Vec<Episode>> {
        EpisodeEntity::find()
            .filter(EpisodeColumn::PodcastId.eq(podcast_id))
            .order_by_desc(EpisodeColumn::PublishedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Expand a set of podcasts to their episode ids
    pub async fn episode_ids_for_podcasts(&self, podcast_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        if podcast_ids.is_empty() {
            return Ok(Vec::new());
        }

        let episodes = EpisodeEntity::find()
            .filter(EpisodeColumn::PodcastId.is_in(podcast_ids.to_vec()))
            .all(self.read_conn())
            .await?;

        Ok(episodes.into_iter().map(|e| e.id).collect())
    }

    // ========================================================================
    // Transcript Operations
    // ========================================================================

    /// Find the transcript row for an episode
    pub async fn find_transcript_by_episode(&self, episode_id: Uuid) -> Result<Option<Transcript>> {
        TranscriptEntity::find()
            .filter(TranscriptColumn::EpisodeId.eq(episode_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Atomically claim an episode's transcript for syncing: transition
    /// to `queued` only from `not_synced`/`failed` (or absence). Returns
    /// false when another caller holds the transcript (queued, syncing,
    /// or already synced), which closes the check-then-act window.
    pub async fn try_claim_transcript(&self, episode_id: Uuid) -> Result<bool> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO transcripts (id, episode_id, status, chunk_count, created_at, updated_at)
            VALUES ($1, $2, 'queued', 0, NOW(), NOW())
            ON CONFLICT (episode_id) DO UPDATE SET
                status = 'queued',
                error_message = NULL,
                updated_at = NOW()
                WHERE transcripts.status IN ('not_synced', 'failed')
            RETURNING id
            "#,
            vec![Uuid::new_v4().into(), episode_id.into()],
        );

        let claimed = self.write_conn().query_one(stmt).await?;
        Ok(claimed.is_some())
    }

    /// Transition `queued -> syncing`. Returns false if the transcript
    /// was not in `queued` (e.g. another run already finished it).
    pub async fn mark_transcript_syncing(&self, episode_id: Uuid) -> Result<bool> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE transcripts
            SET status = 'syncing', updated_at = NOW()
            WHERE episode_id = $1 AND status = 'queued'
            "#,
            vec![episode_id.into()],
        );

        let result = self.write_conn().execute(stmt).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a completed sync. Only an in-flight transcript can reach
    /// `synced`; a concurrent run that already finished is left alone.
    pub async fn mark_transcript_synced(
        &self,
        episode_id: Uuid,
        full_text: &str,
        chunk_count: i32,
        source: TranscriptSource,
        collection: &str,
    ) -> Result<bool> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE transcripts
            SET status = 'synced',
                full_text = $2,
                chunk_count = $3,
                source = $4,
                collection = $5,
                error_message = NULL,
                updated_at = NOW()
            WHERE episode_id = $1 AND status IN ('queued', 'syncing')
            "#,
            vec![
                episode_id.into(),
                full_text.into(),
                chunk_count.into(),
                source.as_str().into(),
                collection.into(),
            ],
        );

        let result = self.write_conn().execute(stmt).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a failed sync with a human-readable message. Never
    /// regresses a transcript that already reached `synced`.
    pub async fn mark_transcript_failed(&self, episode_id: Uuid, error: &str) -> Result<bool> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE transcripts
            SET status = 'failed', error_message = $2, updated_at = NOW()
            WHERE episode_id = $1 AND status IN ('queued', 'syncing')
            "#,
            vec![episode_id.into(), error.into()],
        );

        let result = self.write_conn().execute(stmt).await?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Synced Episode Operations
    // ========================================================================

    /// Link a user to an episode's transcript (idempotent)
    pub async fn link_synced_episode(&self, user_id: Uuid, episode_id: Uuid) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO user_synced_episodes (id, user_id, episode_id, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id, episode_id) DO NOTHING
            "#,
            vec![Uuid::new_v4().into(), user_id.into(), episode_id.into()],
        );

        self.write_conn().execute(stmt).await?;
        Ok(())
    }

    /// All episode ids a user has synced
    pub async fn synced_episode_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let rows = SyncedEpisodeEntity::find()
            .filter(SyncedEpisodeColumn::UserId.eq(user_id))
            .all(self.read_conn())
            .await?;

        Ok(rows.into_iter().map(|r| r.episode_id).collect())
    }

    // ========================================================================
    // Sync Job Operations
    // ========================================================================

    /// Create a sync job in `queued`
    pub async fn create_sync_job(&self, user_id: Uuid, episode_id: Uuid) -> Result<SyncJob> {
        let now = chrono::Utc::now();

        let job = SyncJobActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            episode_id: Set(episode_id),
            run_id: Set(None),
            status: Set("queued".to_string()),
            error_message: Set(None),
            created_at: Set(now.into()),
            started_at: Set(None),
            completed_at: Set(None),
        };

        job.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find sync job by ID
    pub async fn find_sync_job_by_id(&self, id: Uuid) -> Result<Option<SyncJob>> {
        SyncJobEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// The most recent non-terminal sync job for an episode, if any
    pub async fn find_active_sync_job_for_episode(&self, episode_id: Uuid) -> Result<Option<SyncJob>> {
        SyncJobEntity::find()
            .filter(SyncJobColumn::EpisodeId.eq(episode_id))
            .filter(SyncJobColumn::Status.is_in(["queued", "processing"]))
            .order_by_desc(SyncJobColumn::CreatedAt)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Record the external run identifier on a job
    pub async fn set_sync_job_run_id(&self, job_id: Uuid, run_id: &str) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE sync_jobs SET run_id = $2 WHERE id = $1",
            vec![job_id.into(), run_id.into()],
        );

        self.write_conn().execute(stmt).await?;
        Ok(())
    }

    /// Transition a job to `processing`, stamping `started_at` once
    pub async fn mark_sync_job_processing(&self, job_id: Uuid) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE sync_jobs
            SET status = 'processing',
                started_at = COALESCE(started_at, NOW())
            WHERE id = $1 AND status IN ('queued', 'failed')
            "#,
            vec![job_id.into()],
        );

        self.write_conn().execute(stmt).await?;
        Ok(())
    }

    /// Transition a job to `completed`
    pub async fn mark_sync_job_completed(&self, job_id: Uuid) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE sync_jobs
            SET status = 'completed', error_message = NULL, completed_at = NOW()
            WHERE id = $1
            "#,
            vec![job_id.into()],
        );

        self.write_conn().execute(stmt).await?;
        Ok(())
    }

    /// Transition a job to `failed` with a human-readable message
    pub async fn mark_sync_job_failed(&self, job_id: Uuid, error: &str) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE sync_jobs
            SET status = 'failed', error_message = $2, completed_at = NOW()
            WHERE id = $1
            "#,
            vec![job_id.into(), error.into()],
        );

        self.write_conn().execute(stmt).await?;
        Ok(())
    }

    // ========================================================================
    // Chunk Operations (the vector store)
    // ========================================================================

    /// Idempotently upsert chunks for an episode. Keyed by
    /// (episode_id, chunk_index); a retried run overwrites in place.
    pub async fn upsert_chunks(
        &self,
        episode_id: Uuid,
        chunks: &[ChunkUpsert],
        embedding_model: &str,
    ) -> Result<()> {
        for chunk in chunks {
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"
                INSERT INTO transcript_chunks (
                    id, episode_id, chunk_index, content, embedding,
                    embedding_model, start_time, end_time, speaker, created_at
                )
                VALUES ($1, $2, $3, $4, $5::vector, $6, $7, $8, $9, NOW())
                ON CONFLICT (episode_id, chunk_index) DO UPDATE SET
                    content = EXCLUDED.content,
                    embedding = EXCLUDED.embedding,
                    embedding_model = EXCLUDED.embedding_model,
                    start_time = EXCLUDED.start_time,
                    end_time = EXCLUDED.end_time,
                    speaker = EXCLUDED.speaker
                "#,
                vec![
                    chunk_document_id(episode_id, chunk.index).into(),
                    episode_id.into(),
                    chunk.index.into(),
                    chunk.content.clone().into(),
                    embedding_to_pgvector(&chunk.embedding).into(),
                    embedding_model.into(),
                    chunk.start_time.into(),
                    chunk.end_time.into(),
                    chunk.speaker.clone().into(),
                ],
            );

            self.write_conn().execute(stmt).await?;
        }

        Ok(())
    }

    /// Delete chunks at or beyond `keep_count`, so a re-run that
    /// produced fewer chunks leaves no stale tail behind
    pub async fn prune_chunks(&self, episode_id: Uuid, keep_count: i32) -> Result<u64> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "DELETE FROM transcript_chunks WHERE episode_id = $1 AND chunk_index >= $2",
            vec![episode_id.into(), keep_count.into()],
        );

        let result = self.write_conn().execute(stmt).await?;
        Ok(result.rows_affected())
    }

    /// Count persisted chunks for an episode
    pub async fn count_chunks(&self, episode_id: Uuid) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        ChunkEntity::find()
            .filter(ChunkColumn::EpisodeId.eq(episode_id))
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Vector similarity search restricted to an episode scope. An
    /// empty scope yields no results rather than an unfiltered query.
    pub async fn vector_search(
        &self,
        embedding: &[f32],
        top_k: usize,
        episode_scope: &[Uuid],
    ) -> Result<Vec<ChunkHit>> {
        if episode_scope.is_empty() {
            return Ok(Vec::new());
        }

        let embedding_str = embedding_to_pgvector(embedding);

        // UUIDs render from typed values, so direct interpolation of the
        // scope filter is safe here.
        let scope_list = episode_scope
            .iter()
            .map(|id| format!("'{}'", id))
            .collect::<Vec<_>>()
            .join(",");

        let sql = format!(
            r#"
            SELECT
                c.episode_id,
                e.name AS episode_name,
                p.name AS podcast_name,
                c.chunk_index,
                c.content,
                c.start_time,
                c.end_time,
                c.speaker,
                1 - (c.embedding <=> $1::vector) AS score
            FROM transcript_chunks c
            JOIN episodes e ON c.episode_id = e.id
            JOIN podcasts p ON e.podcast_id = p.id
            WHERE c.embedding IS NOT NULL
              AND c.episode_id IN ({})
            ORDER BY c.embedding <=> $1::vector
            LIMIT $2
            "#,
            scope_list
        );

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            &sql,
            vec![embedding_str.into(), (top_k as i32).into()],
        );

        let results = self
            .read_conn()
            .query_all(stmt)
            .await?
            .into_iter()
            .filter_map(|row| {
                Some(ChunkHit {
                    episode_id: row.try_get_by_index::<Uuid>(0).ok()?,
                    episode_name: row.try_get_by_index::<String>(1).ok()?,
                    podcast_name: row.try_get_by_index::<String>(2).ok()?,
                    chunk_index: row.try_get_by_index::<i32>(3).ok()?,
                    content: row.try_get_by_index::<String>(4).ok()?,
                    start_time: row.try_get_by_index::<Option<f64>>(5).ok()?,
                    end_time: row.try_get_by_index::<Option<f64>>(6).ok()?,
                    speaker: row.try_get_by_index::<Option<String>>(7).ok()?,
                    score: row.try_get_by_index::<f64>(8).ok()?,
                })
            })
            .collect();

        Ok(results)
    }

    // ========================================================================
    // Chat Operations
    // ========================================================================

    /// Create a chat session with a context scope
    pub async fn create_chat_session(
        &self,
        user_id: Uuid,
        title: Option<String>,
        scope: &ContextScope,
    ) -> Result<ChatSession> {
        let now = chrono::Utc::now();

        let session = ChatSessionActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            title: Set(title),
            scope: Set(serde_json::to_value(scope)?),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        session.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find chat session by ID
    pub async fn find_chat_session(&self, session_id: Uuid) -> Result<Option<ChatSession>> {
        ChatSessionEntity::find_by_id(session_id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List a session's messages in chronological order
    pub async fn list_chat_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>> {
        ChatMessageEntity::find()
            .filter(ChatMessageColumn::SessionId.eq(session_id))
            .order_by_asc(ChatMessageColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Append a message to a session
    pub async fn insert_chat_message(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
        citations: serde_json::Value,
    ) -> Result<ChatMessage> {
        let now = chrono::Utc::now();

        let message = ChatMessageActiveModel {
            id: Set(Uuid::new_v4()),
            session_id: Set(session_id),
            role: Set(role.as_str().to_string()),
            content: Set(content.to_string()),
            citations: Set(citations),
            created_at: Set(now.into()),
        };

        message.insert(self.write_conn()).await.map_err(Into::into)
    }

    // ========================================================================
    // Usage Ledger Operations
    // ========================================================================

    /// Atomically consume one unit of a user's monthly sync quota.
    /// Returns false when the quota is exhausted. A non-positive quota
    /// disables enforcement but still counts.
    pub async fn increment_and_check_usage(
        &self,
        user_id: Uuid,
        period: &str,
        quota: i32,
    ) -> Result<bool> {
        let (sql, values): (&str, Vec<sea_orm::Value>) = if quota > 0 {
            (
                r#"
                INSERT INTO usage_ledger (user_id, period, sync_count)
                VALUES ($1, $2, 1)
                ON CONFLICT (user_id, period) DO UPDATE SET
                    sync_count = usage_ledger.sync_count + 1
                    WHERE usage_ledger.sync_count < $3
                RETURNING sync_count
                "#,
                vec![user_id.into(), period.into(), quota.into()],
            )
        } else {
            (
                r#"
                INSERT INTO usage_ledger (user_id, period, sync_count)
                VALUES ($1, $2, 1)
                ON CONFLICT (user_id, period) DO UPDATE SET
                    sync_count = usage_ledger.sync_count + 1
                RETURNING sync_count
                "#,
                vec![user_id.into(), period.into()],
            )
        };

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, values);

        let admitted = self.write_conn().query_one(stmt).await?;
        Ok(admitted.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_document_id_is_deterministic() {
        let episode = Uuid::new_v4();
        assert_eq!(chunk_document_id(episode, 3), chunk_document_id(episode, 3));
        assert_ne!(chunk_document_id(episode, 3), chunk_document_id(episode, 4));

        let other = Uuid::new_v4();
        assert_ne!(chunk_document_id(episode, 0), chunk_document_id(other, 0));
    }

    #[test]
    fn test_embedding_to_pgvector_format() {
        let s = embedding_to_pgvector(&[1.0, -0.5, 0.25]);
        assert_eq!(s, "[1,-0.5,0.25]");
        assert_eq!(embedding_to_pgvector(&[]), "[]");
    }
}
