//! Vote entity. At most one row per (student, category), enforced by a
//! unique index.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vote")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub student_id: String,

    #[sea_orm(indexed)]
    pub candidate_id: i32,

    pub category_id: i32,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::student::Entity",
        from = "Column::StudentId",
        to = "super::student::Column::StudentId",
        on_delete = "Cascade"
    )]
    Student,

    #[sea_orm(
        belongs_to = "super::candidate::Entity",
        from = "Column::CandidateId",
        to = "super::candidate::Column::Id",
        on_delete = "Cascade"
    )]
    Candidate,

    #[sea_orm(
        belongs_to = "super::voting_category::Entity",
        from = "Column::CategoryId",
        to = "super::voting_category::Column::Id",
        on_delete = "Cascade"
    )]
    VotingCategory,
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::candidate::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Candidate.def()
    }
}

impl Related<super::voting_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VotingCategory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
