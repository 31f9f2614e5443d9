//! Candidate standing in one category.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "candidate")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    #[sea_orm(indexed)]
    pub category_id: i32,

    #[sea_orm(nullable)]
    pub photo_url: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::voting_category::Entity",
        from = "Column::CategoryId",
        to = "super::voting_category::Column::Id",
        on_delete = "Cascade"
    )]
    VotingCategory,
}

impl Related<super::voting_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VotingCategory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
