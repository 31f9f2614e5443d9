//! Student entity. Rows are seeded before the election opens.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "student")]
pub struct Model {
    /// Student ID, stored trimmed and lower-cased.
    #[sea_orm(primary_key, auto_increment = false)]
    pub student_id: String,

    #[sea_orm(nullable)]
    pub name: Option<String>,

    #[sea_orm(nullable)]
    pub phone: Option<String>,

    #[sea_orm(nullable)]
    pub programme: Option<String>,

    #[sea_orm(nullable)]
    pub level: Option<i32>,

    /// Flips false to true once, when the ballot is complete.
    #[sea_orm(default_value = false)]
    pub has_voted: bool,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether every field required to start verification is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        filled(&self.name) && filled(&self.phone) && filled(&self.programme) && self.level.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::student_details::Entity")]
    StudentDetails,

    #[sea_orm(has_many = "super::sms_otp::Entity")]
    SmsOtp,

    #[sea_orm(has_many = "super::vote::Entity")]
    Vote,
}

impl Related<super::student_details::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StudentDetails.def()
    }
}

impl Related<super::sms_otp::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SmsOtp.def()
    }
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
