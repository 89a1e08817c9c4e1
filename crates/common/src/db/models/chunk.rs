//! Transcript chunk entity
//!
//! The unit stored in the vector store. Identity is deterministic per
//! (episode_id, chunk_index) so a retried sync overwrites rather than
//! duplicates; a uniqueness constraint on that pair backs the upsert.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transcript_chunks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub episode_id: Uuid,

    pub chunk_index: i32,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// pgvector embedding stored as text for SeaORM compatibility.
    /// Actual vector operations done via raw SQL.
    #[sea_orm(column_type = "Text", nullable)]
    pub embedding: Option<String>,

    /// Embedding model identifier, recorded so retrieval can detect
    /// model drift
    #[sea_orm(column_type = "Text")]
    pub embedding_model: String,

    /// Start of the chunk in the audio, seconds; null for flat text
    pub start_time: Option<f64>,

    /// End of the chunk in the audio, seconds; null for flat text
    pub end_time: Option<f64>,

    /// Dominant speaker label from source segmentation, if any
    #[sea_orm(column_type = "Text", nullable)]
    pub speaker: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::episode::Entity",
        from = "Column::EpisodeId",
        to = "super::episode::Column::Id",
        on_delete = "Cascade"
    )]
    Episode,
}

impl Related<super::episode::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Episode.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parse embedding from stored text format to Vec<f32>
    pub fn parse_embedding(&self) -> Option<Vec<f32>> {
        self.embedding.as_ref().and_then(|s| {
            // Format: "[1.0,2.0,3.0,...]"
            let inner = s.trim_start_matches('[').trim_end_matches(']');
            inner
                .split(',')
                .map(|v| v.trim().parse::<f32>().ok())
                .collect()
        })
    }
}
