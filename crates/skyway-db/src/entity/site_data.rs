//! site-data entity: per-member configuration produced by application
//! deployment.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// site-data database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "site_data")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub member_id: i64,
    pub application_id: i64,
    /// concatenated yaml configuration for the member site.
    #[sea_orm(column_type = "Text")]
    pub data: String,
    /// content hash of `data`.
    pub hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::member_site::Entity",
        from = "Column::MemberId",
        to = "super::member_site::Column::Id"
    )]
    Member,
    #[sea_orm(
        belongs_to = "super::application::Entity",
        from = "Column::ApplicationId",
        to = "super::application::Column::Id"
    )]
    Application,
}

impl ActiveModelBehavior for ActiveModel {}
