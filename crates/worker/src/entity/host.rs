use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "hosts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub hostname: String,
    pub dns_names: String,
    pub ip_address: String,
    pub issued_by: String,
    pub status: i16,
    pub expires_at: Option<OffsetDateTime>,
    pub checked_at: OffsetDateTime,
    pub latency_ms: i32,
    pub signature: String,
    pub error_message: Option<String>,
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
