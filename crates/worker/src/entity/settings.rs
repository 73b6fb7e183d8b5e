use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Per-user notification settings; `remind_before` is the lead time before
/// expiry, in seconds.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    pub webhook_url: Option<String>,
    pub remind_before: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
