//! Episode entity
//!
//! Global/shared row, created lazily when first listed or synced.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "episodes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning podcast, immutable after creation
    pub podcast_id: Uuid,

    /// Catalog identity, unique across the table
    #[sea_orm(column_type = "Text", unique)]
    pub catalog_uuid: String,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text")]
    pub audio_url: String,

    pub duration_seconds: Option<i32>,

    pub published_at: Option<DateTimeWithTimeZone>,

    pub episode_number: Option<i32>,

    pub season_number: Option<i32>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::podcast::Entity",
        from = "Column::PodcastId",
        to = "super::podcast::Column::Id"
    )]
    Podcast,

    #[sea_orm(has_one = "super::transcript::Entity")]
    Transcript,

    #[sea_orm(has_many = "super::chunk::Entity")]
    Chunks,
}

impl Related<super::podcast::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Podcast.def()
    }
}

impl Related<super::transcript::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transcript.def()
    }
}

impl Related<super::chunk::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Chunks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
