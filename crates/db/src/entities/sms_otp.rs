//! SMS one-time code entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sms_otp")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub student_id: String,

    /// Phone number the code was sent to, as stored at issuance.
    pub phone: String,

    /// Six-digit code.
    #[serde(skip_serializing)]
    pub otp_code: String,

    #[sea_orm(indexed)]
    pub created_at: DateTimeWithTimeZone,

    pub expires_at: DateTimeWithTimeZone,

    /// Set on successful verification, supersession or failed delivery.
    #[sea_orm(default_value = false)]
    pub used: bool,
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
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
