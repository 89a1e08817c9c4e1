//! Podcast entity
//!
//! Global/shared row: created on first reference by any user, never
//! owned by one.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "podcasts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Catalog identity, unique across the table
    #[sea_orm(column_type = "Text", unique)]
    pub catalog_uuid: String,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub author: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub artwork_url: Option<String>,

    pub episode_count: i32,

    /// Genre tags as JSONB
    #[sea_orm(column_type = "JsonBinary")]
    pub genres: serde_json::Value,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::episode::Entity")]
    Episodes,

    #[sea_orm(has_many = "super::library_entry::Entity")]
    LibraryEntries,
}

impl Related<super::episode::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Episodes.def()
    }
}

impl Related<super::library_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LibraryEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
