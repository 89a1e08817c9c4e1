//! Usage ledger entity
//!
//! Monthly sync counter per user. Mutated only through an atomic
//! increment-and-check statement, never read-modify-write.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "usage_ledger")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,

    /// Billing period, "YYYY-MM"
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub period: String,

    pub sync_count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
