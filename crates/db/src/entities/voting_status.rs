//! Single-row switch gating vote submission.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// ID of the only row in the table.
pub const VOTING_STATUS_ID: i32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "voting_status")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,

    pub is_open: bool,

    /// Bumped on every toggle.
    pub version: i64,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
