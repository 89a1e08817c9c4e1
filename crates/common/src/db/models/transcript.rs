//! Transcript entity
//!
//! The global deduplication anchor: at most one row per episode
//! (uniqueness constraint on `episode_id`), shared by every user who
//! syncs that episode.

use crate::sync::{TranscriptSource, TranscriptStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transcripts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub episode_id: Uuid,

    /// catalog | speech_to_text, null until a source has been chosen
    #[sea_orm(column_type = "Text", nullable)]
    pub source: Option<String>,

    /// not_synced | queued | syncing | synced | failed
    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub full_text: Option<String>,

    pub chunk_count: i32,

    /// Vector store collection reference
    #[sea_orm(column_type = "Text", nullable)]
    pub collection: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the status as an enum
    pub fn transcript_status(&self) -> TranscriptStatus {
        TranscriptStatus::from(self.status.clone())
    }

    /// Get the source as an enum, if recorded
    pub fn transcript_source(&self) -> Option<TranscriptSource> {
        self.source.clone().map(TranscriptSource::from)
    }

    /// The dedup short-circuit applies to this transcript
    pub fn is_synced(&self) -> bool {
        self.transcript_status() == TranscriptStatus::Synced
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::episode::Entity",
        from = "Column::EpisodeId",
        to = "super::episode::Column::Id"
    )]
    Episode,
}

impl Related<super::episode::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Episode.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
