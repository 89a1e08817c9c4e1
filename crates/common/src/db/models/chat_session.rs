//! Chat session entity
//!
//! Carries the context scope bounding retrieval for every message in
//! the session.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid as UuidT;

/// Context scope: sets of podcast and/or episode identifiers. Order
/// is irrelevant; podcasts expand to their episodes at query time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextScope {
    #[serde(default)]
    pub podcast_ids: Vec<UuidT>,
    #[serde(default)]
    pub episode_ids: Vec<UuidT>,
}

impl ContextScope {
    pub fn is_empty(&self) -> bool {
        self.podcast_ids.is_empty() && self.episode_ids.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chat_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    #[sea_orm(column_type = "Text", nullable)]
    pub title: Option<String>,

    /// Context scope as JSONB
    #[sea_orm(column_type = "JsonBinary")]
    pub scope: serde_json::Value,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Deserialize the scope column
    pub fn context_scope(&self) -> ContextScope {
        serde_json::from_value(self.scope.clone()).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::chat_message::Entity")]
    Messages,
}

impl Related<super::chat_message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
