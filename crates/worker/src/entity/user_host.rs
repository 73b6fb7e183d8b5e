use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Many-to-many ownership relation between users and hosts.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "user_hosts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub host_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
