use sea_orm::entity::prelude::*;
use serde::{Serialize, Deserialize};

/// Row layout of the credential table, shared by both backends. Timestamps
/// are stored as `YYYY-MM-DDTHH:MM:SS` text in UTC.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "api_keys")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key_id: String,
    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub never_expire: bool,
    pub expiration_date: String,
    pub latest_query_date: Option<String>,
    pub total_queries: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
