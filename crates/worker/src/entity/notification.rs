use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;

/// Reminder rows; (user_id, host_id, due) carries a unique index so inserts
/// for the same due instant collapse into one row.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: String,
    pub host_id: i32,
    pub kind: i16,
    pub body: String,
    pub due: OffsetDateTime,
    pub delivered_at: Option<OffsetDateTime>,
    pub attempts: i32,
    pub deleted_after: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
